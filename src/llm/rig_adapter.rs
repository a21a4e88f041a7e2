//! Bridges rig-core's `CompletionModel` to our `LlmProvider` trait.

use async_trait::async_trait;
use rig::completion::{AssistantContent, CompletionModel};
use rig::message::Message;
use rust_decimal::Decimal;

use crate::error::LlmError;
use crate::llm::costs;
use crate::llm::provider::{
    ChatMessage, CompletionRequest, CompletionResponse, FinishReason, LlmProvider, Role,
};

/// Completion budget when the caller sets none (Anthropic requires one).
const DEFAULT_MAX_TOKENS: u64 = 1024;

/// Adapter wrapping any rig completion model.
pub struct RigAdapter<M: CompletionModel> {
    model: M,
    model_name: String,
}

impl<M: CompletionModel> RigAdapter<M> {
    pub fn new(model: M, model_name: &str) -> Self {
        Self {
            model,
            model_name: model_name.to_string(),
        }
    }
}

/// Split our messages into rig's (preamble, history, prompt) shape.
///
/// System messages are joined into the preamble; the last non-system
/// message becomes the prompt.
fn split_messages(messages: Vec<ChatMessage>) -> (Option<String>, Vec<Message>, Option<Message>) {
    let mut system_parts = Vec::new();
    let mut history = Vec::new();

    for message in messages {
        match message.role {
            Role::System => system_parts.push(message.content),
            Role::User => history.push(Message::user(message.content)),
            Role::Assistant => history.push(Message::assistant(message.content)),
        }
    }

    let preamble = if system_parts.is_empty() {
        None
    } else {
        Some(system_parts.join("\n\n"))
    };
    let prompt = history.pop();
    (preamble, history, prompt)
}

/// Rejected credentials surface as `AuthFailed`; everything else is a failed request.
fn request_error(provider: &str, reason: String) -> LlmError {
    let lowered = reason.to_lowercase();
    let auth = ["401", "unauthorized", "invalid api key", "invalid x-api-key", "authentication"]
        .iter()
        .any(|marker| lowered.contains(marker));
    if auth {
        LlmError::AuthFailed {
            provider: provider.to_string(),
        }
    } else {
        LlmError::RequestFailed {
            provider: provider.to_string(),
            reason,
        }
    }
}

#[async_trait]
impl<M> LlmProvider for RigAdapter<M>
where
    M: CompletionModel + 'static,
{
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn cost_per_token(&self) -> (Decimal, Decimal) {
        costs::model_cost(&self.model_name)
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let (preamble, history, prompt) = split_messages(request.messages);
        let Some(prompt) = prompt else {
            return Err(LlmError::InvalidResponse {
                provider: self.model_name.clone(),
                reason: "completion request has no user message".to_string(),
            });
        };

        let mut builder = self.model.completion_request(prompt).messages(history);
        if let Some(preamble) = preamble {
            builder = builder.preamble(preamble);
        }
        if let Some(temperature) = request.temperature {
            builder = builder.temperature(f64::from(temperature));
        }
        let max_tokens = request
            .max_tokens
            .map(u64::from)
            .unwrap_or(DEFAULT_MAX_TOKENS);
        builder = builder.max_tokens(max_tokens);

        let response = builder
            .send()
            .await
            .map_err(|e| request_error(&self.model_name, e.to_string()))?;

        let content: String = response
            .choice
            .iter()
            .filter_map(|c| match c {
                AssistantContent::Text(text) => Some(text.text.clone()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("");

        let output_tokens = response.usage.output_tokens as u32;
        let finish_reason = if u64::from(output_tokens) >= max_tokens {
            FinishReason::Length
        } else {
            FinishReason::Stop
        };

        Ok(CompletionResponse {
            content,
            input_tokens: response.usage.input_tokens as u32,
            output_tokens,
            finish_reason,
            response_id: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_joins_system_into_preamble() {
        let (preamble, history, prompt) = split_messages(vec![
            ChatMessage::system("one"),
            ChatMessage::system("two"),
            ChatMessage::user("question"),
        ]);
        assert_eq!(preamble.as_deref(), Some("one\n\ntwo"));
        assert!(history.is_empty());
        assert!(prompt.is_some());
    }

    #[test]
    fn split_keeps_history_before_prompt() {
        let (preamble, history, prompt) = split_messages(vec![
            ChatMessage::user("bad output"),
            ChatMessage::assistant("{oops"),
            ChatMessage::user("fix it"),
        ]);
        assert!(preamble.is_none());
        assert_eq!(history.len(), 2);
        assert!(prompt.is_some());
    }

    #[test]
    fn split_without_messages_has_no_prompt() {
        let (_, _, prompt) = split_messages(vec![ChatMessage::system("only system")]);
        assert!(prompt.is_none());
    }

    #[test]
    fn rejected_key_is_auth_failure() {
        let err = request_error(
            "gpt-4o-mini",
            "ProviderError: 401 Unauthorized: Incorrect API key provided".into(),
        );
        assert!(matches!(err, LlmError::AuthFailed { ref provider } if provider == "gpt-4o-mini"));

        let err = request_error("claude", "authentication_error: invalid x-api-key".into());
        assert!(matches!(err, LlmError::AuthFailed { .. }));
    }

    #[test]
    fn other_failures_keep_reason() {
        let err = request_error("gpt-4o-mini", "HttpError: connection reset".into());
        assert!(
            matches!(err, LlmError::RequestFailed { ref reason, .. } if reason.contains("connection reset"))
        );
    }
}
