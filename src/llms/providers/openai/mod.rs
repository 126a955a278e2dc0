//! OpenAI Chat Completions provider.
//!
//! Also serves any OpenAI-compatible endpoint; the Groq provider is a thin
//! wrapper around it.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::llms::base_llm::{BaseLLM, BaseLLMState, Completion, LLMMessage};
use crate::llms::provider_config::{ProviderConfig, ProviderId};
use crate::llms::providers::utils::send_json;
use crate::types::usage_metrics::{TokenUsage, UsageMetrics};
use crate::utilities::errors::ProviderError;

/// OpenAI Chat Completions implementation.
///
/// # Example
///
/// ```ignore
/// let config = ProviderConfig::new(ProviderId::OpenAI, api_key);
/// let provider = OpenAICompletion::new(config);
/// let completion = provider.complete(&[LLMMessage::user("hello")], false).await?;
/// ```
#[derive(Debug)]
pub struct OpenAICompletion {
    /// Shared base LLM state.
    pub state: BaseLLMState,
    provider_id: ProviderId,
}

impl OpenAICompletion {
    pub fn new(config: ProviderConfig) -> Self {
        let provider_id = config.provider_id;
        Self {
            state: BaseLLMState::new(config),
            provider_id,
        }
    }

    /// Chat Completions endpoint.
    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.state.base_url())
    }

    /// Build the request body for the Chat Completions API.
    pub fn build_request_body(&self, messages: &[LLMMessage], json_mode: bool) -> Value {
        let mut body = json!({
            "model": self.state.model(),
            "messages": messages,
            "max_tokens": self.state.config.max_tokens,
        });

        if let Some(temp) = self.state.config.temperature {
            body["temperature"] = json!(temp);
        }
        if json_mode {
            body["response_format"] = json!({"type": "json_object"});
        }

        body
    }

    /// Parse a Chat Completions API response.
    pub fn parse_completions_response(response: &Value) -> Result<Completion, ProviderError> {
        let message = response
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|choice| choice.get("message"))
            .ok_or_else(|| ProviderError::InvalidResponse("no choices in completion response".to_string()))?;

        let text = message
            .get("content")
            .and_then(|c| c.as_str())
            .unwrap_or("")
            .to_string();

        let usage = response
            .get("usage")
            .map(|u| TokenUsage {
                input_tokens: u.get("prompt_tokens").and_then(|v| v.as_i64()).unwrap_or(0),
                output_tokens: u.get("completion_tokens").and_then(|v| v.as_i64()).unwrap_or(0),
            })
            .unwrap_or_default();

        Ok(Completion { text, usage })
    }
}

#[async_trait]
impl BaseLLM for OpenAICompletion {
    fn provider(&self) -> ProviderId {
        self.provider_id
    }

    fn model(&self) -> &str {
        self.state.model()
    }

    async fn complete(&self, messages: &[LLMMessage], json_mode: bool) -> Result<Completion, ProviderError> {
        let api_key = self.state.require_api_key()?;
        log::debug!(
            "{} complete: model={}, messages={}, json_mode={}",
            self.provider_id,
            self.state.model(),
            messages.len(),
            json_mode
        );

        let body = self.build_request_body(messages, json_mode);
        let endpoint = self.completions_url();
        let response = send_json(&self.state, self.provider_id.as_str(), |client| {
            client.post(&endpoint).bearer_auth(api_key).json(&body)
        })
        .await?;

        let completion = Self::parse_completions_response(&response)?;
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
