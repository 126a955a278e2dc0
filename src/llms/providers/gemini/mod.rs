//! Google Gemini `generateContent` provider.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::llms::base_llm::{BaseLLM, BaseLLMState, Completion, LLMMessage};
use crate::llms::provider_config::{ProviderConfig, ProviderId};
use crate::llms::providers::utils::send_json;
use crate::types::usage_metrics::{TokenUsage, UsageMetrics};
use crate::utilities::errors::ProviderError;

/// Gemini implementation over the Generative Language API.
#[derive(Debug)]
pub struct GeminiCompletion {
    pub state: BaseLLMState,
}

impl GeminiCompletion {
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            state: BaseLLMState::new(config),
        }
    }

    pub fn api_endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.state.base_url(),
            self.state.model()
        )
    }

    pub fn generation_config(&self, json_mode: bool) -> Value {
        let mut config = json!({ "maxOutputTokens": self.state.config.max_tokens });
        if let Some(temp) = self.state.config.temperature {
            config["temperature"] = json!(temp);
        }
        if json_mode {
            config["responseMimeType"] = json!("application/json");
        }
        config
    }

    /// Build the request body; roles map assistant→model, user→user.
    pub fn build_request_body(&self, messages: &[LLMMessage], json_mode: bool) -> Value {
        let (system, rest) = BaseLLMState::split_system(messages);

        let contents: Vec<Value> = rest
            .iter()
            .map(|m| {
                let role = if m.role == "assistant" { "model" } else { "user" };
                json!({"role": role, "parts": [{"text": m.content}]})
            })
            .collect();

        let mut body = json!({
            "contents": contents,
            "generationConfig": self.generation_config(json_mode),
        });
        if let Some(system_text) = system {
            body["systemInstruction"] = json!({"parts": [{"text": system_text}]});
        }
        body
    }

    pub fn parse_response(response: &Value) -> Result<Completion, ProviderError> {
        let candidate = response
            .get("candidates")
            .and_then(|c| c.get(0))
            .ok_or_else(|| {
                let reason = response
                    .pointer("/promptFeedback/blockReason")
                    .and_then(|r| r.as_str())
                    .unwrap_or("no candidates");
                ProviderError::InvalidResponse(format!("Gemini returned no answer: {}", reason))
            })?;

        let text: String = candidate
            .pointer("/content/parts")
            .and_then(|p| p.as_array())
            .map(|parts| {
                parts
                    .iter()
                    .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        let usage = response
            .get("usageMetadata")
            .map(|u| TokenUsage {
                input_tokens: u.get("promptTokenCount").and_then(|v| v.as_i64()).unwrap_or(0),
                output_tokens: u.get("candidatesTokenCount").and_then(|v| v.as_i64()).unwrap_or(0),
            })
            .unwrap_or_default();

        Ok(Completion { text, usage })
    }
}

#[async_trait]
impl BaseLLM for GeminiCompletion {
    fn provider(&self) -> ProviderId {
        ProviderId::Google
    }

    fn model(&self) -> &str {
        self.state.model()
    }

    async fn complete(&self, messages: &[LLMMessage], json_mode: bool) -> Result<Completion, ProviderError> {
        let api_key = self.state.require_api_key()?;
        log::debug!(
            "gemini complete: model={}, messages={}, json_mode={}",
            self.state.model(),
            messages.len(),
            json_mode
        );

        let body = self.build_request_body(messages, json_mode);
        let endpoint = self.api_endpoint();
        let response = send_json(&self.state, "google", |client| {
            client
                .post(&endpoint)
                .header("x-goog-api-key", api_key)
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

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> GeminiCompletion {
        GeminiCompletion::new(ProviderConfig::new(ProviderId::Google, "g-test"))
    }

    #[test]
    fn test_api_endpoint() {
        assert_eq!(
            provider().api_endpoint(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:generateContent"
        );
    }

    #[test]
    fn test_build_request_body_maps_roles() {
        let messages = vec![
            LLMMessage::system("Be brief."),
            LLMMessage::user("How many beds?"),
            LLMMessage::assistant("Twelve."),
        ];
        let body = provider().build_request_body(&messages, true);
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "Be brief.");
        assert_eq!(body["contents"][1]["role"], "model");
        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
    }

    #[test]
    fn test_parse_response() {
        let response = json!({
            "candidates": [{"content": {"role": "model", "parts": [{"text": "Twelve beds."}]}}],
            "usageMetadata": {"promptTokenCount": 12, "candidatesTokenCount": 3}
        });
        let completion = GeminiCompletion::parse_response(&response).unwrap();
        assert_eq!(completion.text, "Twelve beds.");
        assert_eq!(completion.usage.output_tokens, 3);

        let blocked = json!({"promptFeedback": {"blockReason": "SAFETY"}});
        let err = GeminiCompletion::parse_response(&blocked).unwrap_err();
        assert!(err.to_string().contains("SAFETY"));
    }
}
