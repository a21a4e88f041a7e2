//! Classifier: one text-generation call per pipeline step.
//!
//! Schema-bound templates go through [`Classifier::classify`], which parses
//! the output into a typed schema and, on failure, asks the same model once
//! to repair it. Writer templates go through [`Classifier::generate`] and
//! return raw text.

pub mod extract;
pub mod schema;

pub use schema::{
    CategoryOutput, EditAnalysis, EditChange, EmailSummary, MeetingRequestOutput,
    NeedsResponseOutput, StructuredOutput,
};

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::error::TriageError;
use crate::llm::costs;
use crate::llm::provider::{ChatMessage, CompletionRequest, LlmProvider};
use crate::prompts::{PromptLibrary, TemplateInputs, TemplateKey};

use self::extract::extract_json_object;

/// Generation settings, fixed for the life of the process.
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            max_tokens: 1024,
        }
    }
}

/// Token usage accumulated across calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub calls: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }

    /// Usage accrued since `earlier`.
    pub fn since(&self, earlier: TokenUsage) -> TokenUsage {
        TokenUsage {
            calls: self.calls.saturating_sub(earlier.calls),
            input_tokens: self.input_tokens.saturating_sub(earlier.input_tokens),
            output_tokens: self.output_tokens.saturating_sub(earlier.output_tokens),
        }
    }
}

/// Why structured parsing failed.
#[derive(Debug)]
enum ParseFailure {
    /// Output held no parseable JSON.
    NotJson(String),
    /// JSON parsed but did not fit the schema.
    Schema(String),
}

impl ParseFailure {
    fn message(&self) -> &str {
        match self {
            Self::NotJson(m) | Self::Schema(m) => m,
        }
    }
}

/// Wraps the generation backend and the template set.
pub struct Classifier {
    llm: Arc<dyn LlmProvider>,
    prompts: Arc<PromptLibrary>,
    config: ClassifierConfig,
    calls: AtomicU64,
    input_tokens: AtomicU64,
    output_tokens: AtomicU64,
}

impl Classifier {
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        prompts: Arc<PromptLibrary>,
        config: ClassifierConfig,
    ) -> Self {
        Self {
            llm,
            prompts,
            config,
            calls: AtomicU64::new(0),
            input_tokens: AtomicU64::new(0),
            output_tokens: AtomicU64::new(0),
        }
    }

    /// Run a schema-bound template and parse its output.
    pub async fn classify<T: StructuredOutput>(
        &self,
        key: TemplateKey,
        inputs: &TemplateInputs,
    ) -> Result<T, TriageError> {
        debug_assert!(key.is_schema_bound(), "{key} has no output schema");
        let prompt = self.prompts.render(key, inputs)?;
        let raw = self.call(key, vec![ChatMessage::user(prompt)]).await?;

        let failure = match parse_structured::<T>(&raw) {
            Ok(value) => return Ok(value),
            Err(failure) => failure,
        };

        warn!(
            template = key.name(),
            error = failure.message(),
            "Structured output failed to parse, attempting repair"
        );
        let repaired = self
            .call(
                key,
                vec![ChatMessage::user(build_repair_prompt(
                    T::SHAPE,
                    &raw,
                    failure.message(),
                ))],
            )
            .await?;

        parse_structured::<T>(&repaired).map_err(|failure| match failure {
            ParseFailure::NotJson(reason) => TriageError::Generation {
                template: key.name(),
                reason: format!("output unparseable after repair: {reason}"),
            },
            ParseFailure::Schema(reason) => TriageError::SchemaViolation {
                template: key.name(),
                reason,
            },
        })
    }

    /// Run a free-text template and return its trimmed output.
    pub async fn generate(
        &self,
        key: TemplateKey,
        inputs: &TemplateInputs,
    ) -> Result<String, TriageError> {
        let prompt = self.prompts.render(key, inputs)?;
        let text = self.call(key, vec![ChatMessage::user(prompt)]).await?;
        let text = text.trim();
        if text.is_empty() {
            return Err(TriageError::Generation {
                template: key.name(),
                reason: "model returned empty text".to_string(),
            });
        }
        Ok(text.to_string())
    }

    /// Usage accumulated so far.
    pub fn usage(&self) -> TokenUsage {
        TokenUsage {
            calls: self.calls.load(Ordering::Relaxed),
            input_tokens: self.input_tokens.load(Ordering::Relaxed),
            output_tokens: self.output_tokens.load(Ordering::Relaxed),
        }
    }

    /// Estimated cost of `usage` on this classifier's model.
    pub fn estimated_cost(&self, usage: TokenUsage) -> Decimal {
        costs::estimate(
            self.llm.cost_per_token(),
            usage.input_tokens,
            usage.output_tokens,
        )
    }

    pub fn model_name(&self) -> &str {
        self.llm.model_name()
    }

    async fn call(
        &self,
        key: TemplateKey,
        messages: Vec<ChatMessage>,
    ) -> Result<String, TriageError> {
        let request = CompletionRequest::new(messages)
            .with_temperature(self.config.temperature)
            .with_max_tokens(self.config.max_tokens)
            .with_metadata("template", key.name());

        let response = self
            .llm
            .complete(request)
            .await
            .map_err(|e| TriageError::Generation {
                template: key.name(),
                reason: e.to_string(),
            })?;

        self.calls.fetch_add(1, Ordering::Relaxed);
        self.input_tokens
            .fetch_add(u64::from(response.input_tokens), Ordering::Relaxed);
        self.output_tokens
            .fetch_add(u64::from(response.output_tokens), Ordering::Relaxed);

        debug!(
            template = key.name(),
            input_tokens = response.input_tokens,
            output_tokens = response.output_tokens,
            "Generation call complete"
        );
        Ok(response.content)
    }
}

fn parse_structured<T: StructuredOutput>(raw: &str) -> Result<T, ParseFailure> {
    let json_str = extract_json_object(raw)
        .ok_or_else(|| ParseFailure::NotJson("no JSON object in output".to_string()))?;
    let value: serde_json::Value = serde_json::from_str(json_str)
        .map_err(|e| ParseFailure::NotJson(format!("JSON parse error: {e}")))?;
    let parsed: T = serde_json::from_value(value)
        .map_err(|e| ParseFailure::Schema(format!("schema mismatch: {e}")))?;
    parsed.validate().map_err(ParseFailure::Schema)?;
    Ok(parsed)
}

fn build_repair_prompt(shape: &str, completion: &str, error: &str) -> String {
    format!(
        "Instructions:\nRespond with a single JSON object of this shape:\n{shape}\n\n\
         Completion:\n{completion}\n\n\
         The completion above does not satisfy the instructions.\n\
         Error: {error}\n\n\
         Try again. Respond only with a JSON object that satisfies the instructions."
    )
}
