//! Anthropic Messages API provider.
//!
//! System messages are extracted and passed in the separate `system`
//! field; consecutive messages with the same role are merged because the
//! API requires alternating turns.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::llms::base_llm::{BaseLLM, BaseLLMState, Completion, LLMMessage};
use crate::llms::provider_config::{ProviderConfig, ProviderId};
use crate::llms::providers::utils::send_json;
use crate::types::usage_metrics::{TokenUsage, UsageMetrics};
use crate::utilities::errors::ProviderError;

/// Anthropic API version header value.
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

const JSON_ONLY_INSTRUCTION: &str =
    "Respond with a single JSON object only. Do not add prose or code fences.";

/// Anthropic Messages implementation.
#[derive(Debug)]
pub struct AnthropicCompletion {
    pub state: BaseLLMState,
}

impl AnthropicCompletion {
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            state: BaseLLMState::new(config),
        }
    }

    pub fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.state.base_url())
    }

    /// Build the Messages API request body.
    pub fn build_request_body(&self, messages: &[LLMMessage], json_mode: bool) -> Value {
        let (system, rest) = BaseLLMState::split_system(messages);

        let mut formatted: Vec<Value> = Vec::new();
        for message in rest {
            let role = if message.role == "assistant" { "assistant" } else { "user" };
            match formatted.last_mut() {
                Some(last) if last["role"] == role => {
                    let merged = format!(
                        "{}\n\n{}",
                        last["content"].as_str().unwrap_or(""),
                        message.content
                    );
                    last["content"] = Value::String(merged);
                }
                _ => formatted.push(json!({"role": role, "content": message.content})),
            }
        }
        // The conversation must open with a user turn.
        if formatted.first().map(|m| m["role"] != "user").unwrap_or(true) {
            formatted.insert(0, json!({"role": "user", "content": "(conversation start)"}));
        }

        let mut body = json!({
            "model": self.state.model(),
            "max_tokens": self.state.config.max_tokens,
            "messages": formatted,
        });

        let system = match (system, json_mode) {
            (Some(s), true) => Some(format!("{}\n\n{}", s, JSON_ONLY_INSTRUCTION)),
            (None, true) => Some(JSON_ONLY_INSTRUCTION.to_string()),
            (s, false) => s,
        };
        if let Some(system_text) = system {
            body["system"] = Value::String(system_text);
        }
        if let Some(temp) = self.state.config.temperature {
            body["temperature"] = json!(temp);
        }

        body
    }

    /// Concatenate the text blocks of a Messages API response.
    pub fn parse_response(response: &Value) -> Result<Completion, ProviderError> {
        let content = response
            .get("content")
            .and_then(|c| c.as_array())
            .ok_or_else(|| ProviderError::InvalidResponse("no content in Anthropic response".to_string()))?;

        let text: String = content
            .iter()
            .filter(|block| block.get("type").and_then(|t| t.as_str()) == Some("text"))
            .filter_map(|block| block.get("text").and_then(|t| t.as_str()))
            .collect::<Vec<_>>()
            .join("");

        let usage = response
            .get("usage")
            .map(|u| TokenUsage {
                input_tokens: u.get("input_tokens").and_then(|v| v.as_i64()).unwrap_or(0),
                output_tokens: u.get("output_tokens").and_then(|v| v.as_i64()).unwrap_or(0),
            })
            .unwrap_or_default();

        Ok(Completion { text, usage })
    }
}

#[async_trait]
impl BaseLLM for AnthropicCompletion {
    fn provider(&self) -> ProviderId {
        ProviderId::Anthropic
    }

    fn model(&self) -> &str {
        self.state.model()
    }

    async fn complete(&self, messages: &[LLMMessage], json_mode: bool) -> Result<Completion, ProviderError> {
        let api_key = self.state.require_api_key()?;
        log::debug!(
            "anthropic complete: model={}, messages={}, json_mode={}",
            self.state.model(),
            messages.len(),
            json_mode
        );

        let body = self.build_request_body(messages, json_mode);
        let endpoint = self.messages_url();
        let response = send_json(&self.state, "anthropic", |client| {
            client
                .post(&endpoint)
                .header("x-api-key", api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .json(&body)
        })
        .await?;

        let completion = Self::parse_response(&response)?;
        self.state.track_token_usage(completion.usage);
        Ok(completion)
    }

    fn get_token_usage_summary(&self) -> UsageMetrics {
        self.state.get_token_usage_summary()
    }

    fn reset(&self) {
        self.state.reset_usage();
    }
}
