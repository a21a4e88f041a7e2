//! Human checkpoint: a reviewer confirms or overrides each automated decision.
//!
//! The pipeline depends only on the [`Reviewer`] port. Production uses the
//! console reviewer over stdin/stdout; tests and dry runs use a scripted one.
//! A reviewer call is the only point where a run waits on a person, and a
//! single reviewer instance never presents two checkpoints at once.

pub mod console;
pub mod scripted;

pub use console::ConsoleReviewer;
pub use scripted::ScriptedReviewer;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CheckpointError;

/// What the reviewer is asked to confirm.
#[derive(Debug, Clone, Copy)]
pub struct CheckpointRequest<'a> {
    pub prompt: &'a str,
    pub decision: Option<&'a str>,
    pub context: Option<&'a str>,
}

impl<'a> CheckpointRequest<'a> {
    pub fn new(prompt: &'a str) -> Self {
        Self {
            prompt,
            decision: None,
            context: None,
        }
    }

    pub fn with_decision(mut self, decision: &'a str) -> Self {
        self.decision = Some(decision);
        self
    }

    pub fn with_context(mut self, context: &'a str) -> Self {
        self.context = Some(context);
        self
    }
}

/// The reviewer's answer to one checkpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub agrees: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correction: Option<String>,
}

impl Verdict {
    pub fn agree() -> Self {
        Self {
            agrees: true,
            correction: None,
        }
    }

    pub fn disagree() -> Self {
        Self {
            agrees: false,
            correction: None,
        }
    }

    pub fn with_correction(mut self, text: impl Into<String>) -> Self {
        self.correction = Some(text.into());
        self
    }
}

/// Port through which the pipeline consults a human.
#[async_trait]
pub trait Reviewer: Send + Sync {
    /// Ask the reviewer to confirm a decision. Blocks until answered.
    ///
    /// Implementations re-prompt on malformed answers and only fail when
    /// the reviewer can no longer answer at all.
    async fn confirm(&self, request: &CheckpointRequest<'_>) -> Result<Verdict, CheckpointError>;

    /// Ask for a replacement of `draft`. `None` keeps the draft.
    async fn revise(&self, draft: &str) -> Result<Option<String>, CheckpointError>;
}

const AGREE_WORDS: &[&str] = &["yes", "y", "approve", "ok", "true"];
const DISAGREE_WORDS: &[&str] = &["no", "n", "deny", "reject", "false"];

/// Parse one answer line: a yes/no word, optionally followed by a correction.
///
/// `"no: this is a decline"` → disagree with correction `"this is a decline"`.
pub fn parse_answer(line: &str) -> Result<Verdict, CheckpointError> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Err(CheckpointError::InvalidInput("empty answer".into()));
    }

    let split = trimmed
        .find(|c: char| !c.is_alphanumeric())
        .unwrap_or(trimmed.len());
    let (word, rest) = trimmed.split_at(split);
    let word = word.to_lowercase();

    let agrees = if AGREE_WORDS.contains(&word.as_str()) {
        true
    } else if DISAGREE_WORDS.contains(&word.as_str()) {
        false
    } else {
        return Err(CheckpointError::InvalidInput(format!(
            "expected yes or no, got '{trimmed}'"
        )));
    };

    let correction = rest
        .trim_start_matches(|c: char| {
            c.is_whitespace() || matches!(c, ',' | ':' | ';' | '-' | '.' | '!')
        })
        .trim();

    Ok(Verdict {
        agrees,
        correction: (!correction.is_empty()).then(|| correction.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_yes_and_no() {
        assert_eq!(parse_answer("yes").unwrap(), Verdict::agree());
        assert_eq!(parse_answer("Y").unwrap(), Verdict::agree());
        assert_eq!(parse_answer("  no \n").unwrap(), Verdict::disagree());
        assert_eq!(parse_answer("reject").unwrap(), Verdict::disagree());
    }

    #[test]
    fn parses_correction_text() {
        let verdict = parse_answer("no: they want a call, not a decline").unwrap();
        assert!(!verdict.agrees);
        assert_eq!(
            verdict.correction.as_deref(),
            Some("they want a call, not a decline")
        );

        let verdict = parse_answer("yes, looks right").unwrap();
        assert!(verdict.agrees);
        assert_eq!(verdict.correction.as_deref(), Some("looks right"));
    }

    #[test]
    fn trailing_punctuation_is_not_a_correction() {
        assert_eq!(parse_answer("yes.").unwrap(), Verdict::agree());
        assert_eq!(parse_answer("No!").unwrap(), Verdict::disagree());
        let verdict = parse_answer("no. It asks for a meeting").unwrap();
        assert_eq!(verdict.correction.as_deref(), Some("It asks for a meeting"));
    }

    #[test]
    fn rejects_malformed_answers() {
        assert!(matches!(
            parse_answer(""),
            Err(CheckpointError::InvalidInput(_))
        ));
        assert!(matches!(
            parse_answer("maybe"),
            Err(CheckpointError::InvalidInput(_))
        ));
        assert!(matches!(
            parse_answer("yesterday"),
            Err(CheckpointError::InvalidInput(_))
        ));
    }

    #[test]
    fn request_builder() {
        let request = CheckpointRequest::new("Is this decision correct?")
            .with_decision("respond")
            .with_context("summary");
        assert_eq!(request.decision, Some("respond"));
        assert_eq!(request.context, Some("summary"));
    }
}
