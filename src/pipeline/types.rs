//! Shared types for the triage pipeline.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::checkpoint::Verdict;
use crate::classify::{EditAnalysis, TokenUsage};
use crate::pipeline::decision::WriterKind;

// ── Inbound record ──────────────────────────────────────────────────

/// Structured payload of one email, serialized to JSON for classifier input.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmailContent {
    pub from: String,
    #[serde(default)]
    pub to: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cc: Vec<String>,
    pub subject: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
    /// `Message-ID` header.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message_id: String,
    /// Body with quoted text stripped.
    pub body: String,
}

/// One parsed email in a thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailRecord {
    /// Mailbox identifier used for archiving.
    pub message_id: Option<String>,
    /// Thread this email belongs to.
    pub thread_id: String,
    /// Position in the thread; 1 is the most recent message.
    pub order: u32,
    pub content: EmailContent,
    /// Human-revised final reply, when one already exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_email: Option<String>,
}

impl EmailRecord {
    /// Whether this is the most recent message of its thread.
    pub fn is_most_recent(&self) -> bool {
        self.order == 1
    }

    /// Edited text, if present and not blank.
    pub fn edited_text(&self) -> Option<&str> {
        self.edited_email
            .as_deref()
            .filter(|text| !text.trim().is_empty())
    }
}

// ── Decision trail ──────────────────────────────────────────────────

/// Which checkpoint a trail step records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointKind {
    NeedsResponse,
    Category,
    MeetingRequest,
    EditBeforeSending,
}

/// One automated decision and the reviewer's verdict on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrailStep {
    pub checkpoint: CheckpointKind,
    /// Label the classifier produced (empty for the edit prompt).
    pub automated: String,
    pub verdict: Verdict,
    /// Label in effect after the verdict.
    pub resolved: String,
}

/// Ordered record of every checkpoint an email passed through.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecisionTrail {
    pub steps: Vec<TrailStep>,
}

impl DecisionTrail {
    pub fn record(
        &mut self,
        checkpoint: CheckpointKind,
        automated: impl Into<String>,
        verdict: Verdict,
        resolved: impl Into<String>,
    ) {
        self.steps.push(TrailStep {
            checkpoint,
            automated: automated.into(),
            verdict,
            resolved: resolved.into(),
        });
    }

    pub fn step(&self, checkpoint: CheckpointKind) -> Option<&TrailStep> {
        self.steps.iter().find(|s| s.checkpoint == checkpoint)
    }

    pub fn checkpoints(&self) -> Vec<CheckpointKind> {
        self.steps.iter().map(|s| s.checkpoint).collect()
    }
}

// ── Outcomes ────────────────────────────────────────────────────────

/// Why an email was archived without a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchiveReason {
    /// Classifier said no response; reviewer agreed.
    NoResponseNeeded,
    /// Classifier said respond; reviewer overrode.
    ReviewerOverride,
}

/// A finalized response for one email.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseOutcome {
    pub message_id: Option<String>,
    pub writer: WriterKind,
    /// Text the writer produced.
    pub draft: String,
    /// Text to send: the human edit when there is one, otherwise the draft.
    pub final_response: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub editor_analysis: Option<EditAnalysis>,
    pub trail: DecisionTrail,
}

impl ResponseOutcome {
    pub fn was_edited(&self) -> bool {
        self.editor_analysis.is_some()
    }
}

/// Terminal state of one email.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EmailOutcome {
    Archived {
        message_id: Option<String>,
        reason: ArchiveReason,
        /// Whether the archiver confirmed the move.
        archived: bool,
        trail: DecisionTrail,
    },
    Responded(ResponseOutcome),
}

impl EmailOutcome {
    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Archived { .. } => "archived",
            Self::Responded(_) => "responded",
        }
    }

    pub fn message_id(&self) -> Option<&str> {
        match self {
            Self::Archived { message_id, .. } => message_id.as_deref(),
            Self::Responded(response) => response.message_id.as_deref(),
        }
    }

    pub fn trail(&self) -> &DecisionTrail {
        match self {
            Self::Archived { trail, .. } => trail,
            Self::Responded(response) => &response.trail,
        }
    }
}

/// An email the batch gave up on (continue policy only).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedEmail {
    pub message_id: Option<String>,
    pub error: String,
}

/// Summary of one batch run.
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub run_id: Uuid,
    /// Response outcomes in input order. Archived emails are not included.
    pub responses: Vec<ResponseOutcome>,
    pub archived: usize,
    pub failed: Vec<FailedEmail>,
    pub usage: TokenUsage,
    pub estimated_cost: Decimal,
}

impl BatchReport {
    pub fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            responses: Vec::new(),
            archived: 0,
            failed: Vec::new(),
            usage: TokenUsage::default(),
            estimated_cost: Decimal::ZERO,
        }
    }
}

/// Result of a batch run.
#[derive(Debug, Clone)]
pub enum BatchOutcome {
    /// No most-recent-in-thread emails were found.
    NoEmails,
    Completed(BatchReport),
}
