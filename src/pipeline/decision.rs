//! Branch tables for the three gated decisions.
//!
//! Each gate is a pure function of (automated decision, reviewer agreement).
//! Nothing here performs side effects; the pipeline acts on the result.

use serde::{Deserialize, Serialize};

use crate::prompts::TemplateKey;

/// Meeting-request labels that count as "yes".
pub const TRUTHY_LABELS: [&str; 3] = ["yes", "true", "1"];

/// Automated needs-response decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NeedsResponse {
    Respond,
    NoResponseNeeded,
}

impl NeedsResponse {
    /// Parse a model label. Case, spaces and hyphens are normalized.
    pub fn from_label(label: &str) -> Option<Self> {
        let normalized = label.trim().to_lowercase().replace([' ', '-'], "_");
        match normalized.as_str() {
            "respond" => Some(Self::Respond),
            "no_response_needed" => Some(Self::NoResponseNeeded),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Respond => "respond",
            Self::NoResponseNeeded => "no_response_needed",
        }
    }
}

/// Outcome of the needs-response gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    /// Continue to categorization.
    Proceed { overridden: bool },
    /// Archive the email and stop.
    Archive { overridden: bool },
}

/// Needs-response branch table.
pub fn needs_response_gate(decision: NeedsResponse, agrees: bool) -> Gate {
    match (decision, agrees) {
        (NeedsResponse::Respond, true) => Gate::Proceed { overridden: false },
        (NeedsResponse::Respond, false) => Gate::Archive { overridden: true },
        (NeedsResponse::NoResponseNeeded, true) => Gate::Archive { overridden: false },
        (NeedsResponse::NoResponseNeeded, false) => Gate::Proceed { overridden: true },
    }
}

/// Email category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Decline,
    MoveForward,
}

impl Category {
    /// `decline` (trimmed, any case) is a decline; every other label moves forward.
    pub fn from_label(label: &str) -> Self {
        if label.trim().eq_ignore_ascii_case("decline") {
            Self::Decline
        } else {
            Self::MoveForward
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Decline => "decline",
            Self::MoveForward => "move_forward",
        }
    }
}

/// Outcome of the category gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryRoute {
    /// Write a decline; the meeting gate is skipped.
    WriteDecline { overridden: bool },
    /// Go on to the meeting-request gate.
    CheckMeeting { overridden: bool },
}

impl CategoryRoute {
    /// Category after the reviewer's verdict.
    pub fn category(self) -> Category {
        match self {
            Self::WriteDecline { .. } => Category::Decline,
            Self::CheckMeeting { .. } => Category::MoveForward,
        }
    }

    pub fn overridden(self) -> bool {
        match self {
            Self::WriteDecline { overridden } | Self::CheckMeeting { overridden } => overridden,
        }
    }
}

/// Category branch table. Disagreement flips the category.
pub fn category_gate(category: Category, agrees: bool) -> CategoryRoute {
    match (category, agrees) {
        (Category::Decline, true) => CategoryRoute::WriteDecline { overridden: false },
        (Category::Decline, false) => CategoryRoute::CheckMeeting { overridden: true },
        (Category::MoveForward, true) => CategoryRoute::CheckMeeting { overridden: false },
        (Category::MoveForward, false) => CategoryRoute::WriteDecline { overridden: true },
    }
}

/// Whether a meeting-request label means "yes". Exact match only.
pub fn is_truthy(label: &str) -> bool {
    TRUTHY_LABELS.contains(&label)
}

/// Label used when the reviewer rejects a meeting decision.
///
/// Truthy labels become `"no"`, everything else becomes `"yes"`. This is not
/// a symmetric toggle: `"1"` inverts to `"no"`, and `"no"` inverts to
/// `"yes"`, never back to `"1"`.
pub fn invert_meeting_label(label: &str) -> &'static str {
    if is_truthy(label) { "no" } else { "yes" }
}

/// Resolved meeting-request decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeetingDecision {
    pub label: String,
    pub overridden: bool,
}

impl MeetingDecision {
    pub fn is_meeting(&self) -> bool {
        is_truthy(&self.label)
    }

    /// Writer for this decision.
    pub fn writer(&self) -> WriterKind {
        if self.is_meeting() {
            WriterKind::Schedule
        } else {
            WriterKind::General
        }
    }
}

/// Meeting-request branch table. Disagreement inverts the label exactly once.
pub fn meeting_gate(label: &str, agrees: bool) -> MeetingDecision {
    if agrees {
        MeetingDecision {
            label: label.to_string(),
            overridden: false,
        }
    } else {
        MeetingDecision {
            label: invert_meeting_label(label).to_string(),
            overridden: true,
        }
    }
}

/// The three mutually exclusive response writers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriterKind {
    Decline,
    Schedule,
    General,
}

impl WriterKind {
    pub fn template(self) -> TemplateKey {
        match self {
            Self::Decline => TemplateKey::DeclineWriter,
            Self::Schedule => TemplateKey::ScheduleWriter,
            Self::General => TemplateKey::GeneralWriter,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Decline => "decline",
            Self::Schedule => "schedule",
            Self::General => "general",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "decline" => Some(Self::Decline),
            "schedule" => Some(Self::Schedule),
            "general" => Some(Self::General),
            _ => None,
        }
    }
}
