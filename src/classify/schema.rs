//! Output schemas for the schema-bound templates.

use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize};

use crate::pipeline::decision::NeedsResponse;

/// A structured output the classifier can parse and repair.
pub trait StructuredOutput: DeserializeOwned + Send {
    /// JSON shape shown to the model when asking it to repair output.
    const SHAPE: &'static str;

    /// Semantic checks beyond field types.
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

/// Summarizer output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailSummary {
    pub summary: String,
    #[serde(default)]
    pub key_points: Vec<String>,
    #[serde(default)]
    pub action_items: Vec<String>,
}

impl StructuredOutput for EmailSummary {
    const SHAPE: &'static str =
        r#"{"summary": "<string>", "key_points": ["<string>"], "action_items": ["<string>"]}"#;
}

/// Needs-response gate output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeedsResponseOutput {
    pub needs_response: String,
    #[serde(default)]
    pub reason: String,
}

impl StructuredOutput for NeedsResponseOutput {
    const SHAPE: &'static str =
        r#"{"needs_response": "respond" | "no_response_needed", "reason": "<string>"}"#;

    fn validate(&self) -> Result<(), String> {
        NeedsResponse::from_label(&self.needs_response)
            .map(|_| ())
            .ok_or_else(|| format!("unknown needs_response label '{}'", self.needs_response))
    }
}

/// Categorizer output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryOutput {
    pub decision: String,
    #[serde(default)]
    pub reason: String,
}

impl StructuredOutput for CategoryOutput {
    const SHAPE: &'static str = r#"{"decision": "decline" | "move_forward", "reason": "<string>"}"#;
}

/// Meeting-request decider output.
///
/// The label stays a raw string: several truthy spellings are accepted downstream.
/// Models sometimes answer with a bare `true` or `1`; those keep their JSON text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeetingRequestOutput {
    #[serde(deserialize_with = "scalar_label")]
    pub decision: String,
    #[serde(default)]
    pub reason: String,
}

impl StructuredOutput for MeetingRequestOutput {
    const SHAPE: &'static str = r#"{"decision": "yes" | "no", "reason": "<string>"}"#;
}

/// Accept a string, boolean or number as a label.
fn scalar_label<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(label) => Ok(label),
        value @ (serde_json::Value::Bool(_) | serde_json::Value::Number(_)) => Ok(value.to_string()),
        other => Err(D::Error::custom(format!(
            "expected a string, boolean or number label, got {other}"
        ))),
    }
}

/// One change the editor found between draft and edited text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditChange {
    pub kind: String,
    #[serde(default)]
    pub original: String,
    #[serde(default)]
    pub edited: String,
    #[serde(default)]
    pub rationale: String,
}

/// Editor analysis of a human edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditAnalysis {
    pub summary: String,
    #[serde(default)]
    pub changes: Vec<EditChange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tone_shift: Option<String>,
    #[serde(default)]
    pub learnings: Vec<String>,
}

impl StructuredOutput for EditAnalysis {
    const SHAPE: &'static str = r#"{"summary": "<string>", "changes": [{"kind": "<string>", "original": "<string>", "edited": "<string>", "rationale": "<string>"}], "tone_shift": "<string or null>", "learnings": ["<string>"]}"#;
}
