//! Test doubles shared by unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::error::LlmError;
use crate::llm::provider::{
    CompletionRequest, CompletionResponse, FinishReason, LlmProvider,
};

/// LLM stub that replies from per-template queues.
///
/// Requests are routed by their `template` metadata tag. An empty queue
/// answers with a request failure.
pub struct ScriptedLlm {
    replies: Mutex<HashMap<String, VecDeque<String>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedLlm {
    pub const INPUT_TOKENS: u64 = 10;
    pub const OUTPUT_TOKENS: u64 = 5;

    pub fn new() -> Self {
        Self {
            replies: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue a reply for `template`.
    pub fn reply(self, template: &str, content: &str) -> Self {
        self.replies
            .lock()
            .unwrap()
            .entry(template.to_string())
            .or_default()
            .push_back(content.to_string());
        self
    }

    /// All requests seen so far.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Number of calls made for `template`.
    pub fn calls_for(&self, template: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.metadata.get("template").map(String::as_str) == Some(template))
            .count()
    }

    /// Templates in call order.
    pub fn call_order(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter_map(|r| r.metadata.get("template").cloned())
            .collect()
    }

    /// Content of the last user message sent for `template`.
    pub fn last_prompt(&self, template: &str) -> Option<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|r| r.metadata.get("template").map(String::as_str) == Some(template))
            .and_then(|r| r.messages.last().map(|m| m.content.clone()))
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlm {
    fn model_name(&self) -> &str {
        "scripted"
    }

    fn cost_per_token(&self) -> (Decimal, Decimal) {
        (Decimal::ZERO, Decimal::ZERO)
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let template = request
            .metadata
            .get("template")
            .cloned()
            .unwrap_or_default();
        self.requests.lock().unwrap().push(request);

        let reply = self
            .replies
            .lock()
            .unwrap()
            .get_mut(&template)
            .and_then(VecDeque::pop_front);

        match reply {
            Some(content) => Ok(CompletionResponse {
                content,
                input_tokens: Self::INPUT_TOKENS as u32,
                output_tokens: Self::OUTPUT_TOKENS as u32,
                finish_reason: FinishReason::Stop,
                response_id: None,
            }),
            None => Err(LlmError::RequestFailed {
                provider: "scripted".to_string(),
                reason: format!("no scripted reply for template '{template}'"),
            }),
        }
    }
}
