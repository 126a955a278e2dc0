//! Base LLM trait and shared provider state.
//!
//! Every vendor implementation embeds a [`BaseLLMState`] for its
//! configuration, HTTP client and token counters, and implements
//! [`BaseLLM::complete`] in terms of its own request/response shapes.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::llms::provider_config::{ProviderConfig, ProviderId};
use crate::types::usage_metrics::{TokenUsage, UsageMetrics};
use crate::utilities::errors::ProviderError;

static JSON_OBJECT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\{.*\}").expect("static regex is valid"));

// ---------------------------------------------------------------------------
// LLMMessage
// ---------------------------------------------------------------------------

/// A single chat message sent to a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LLMMessage {
    /// `system`, `user` or `assistant`.
    pub role: String,
    pub content: String,
}

impl LLMMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }

    pub fn is_system(&self) -> bool {
        self.role == "system"
    }
}

/// Text and token counts of one completion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Completion {
    pub text: String,
    pub usage: TokenUsage,
}

// ---------------------------------------------------------------------------
// BaseLLM trait
// ---------------------------------------------------------------------------

/// Interface every vendor implementation follows.
///
/// Implementations are shared behind `Arc`s, so token counters live behind
/// interior mutability and every method takes `&self`.
#[async_trait]
pub trait BaseLLM: Send + Sync + fmt::Debug {
    /// Which vendor this is.
    fn provider(&self) -> ProviderId;

    /// Model identifier sent to the vendor.
    fn model(&self) -> &str;

    /// Run one chat completion.
    ///
    /// With `json_mode` the vendor is asked for a bare JSON object, using
    /// its native switch where one exists.
    async fn complete(&self, messages: &[LLMMessage], json_mode: bool) -> Result<Completion, ProviderError>;

    /// Cumulative token usage since construction or the last reset.
    fn get_token_usage_summary(&self) -> UsageMetrics;

    /// Drop provider-side state (token counters).
    fn reset(&self);
}

// ---------------------------------------------------------------------------
// BaseLLMState - shared state for LLM implementations
// ---------------------------------------------------------------------------

/// Shared state for LLM implementations.
#[derive(Debug)]
pub struct BaseLLMState {
    pub config: ProviderConfig,
    pub client: reqwest::Client,
    token_usage: Mutex<UsageMetrics>,
}

impl BaseLLMState {
    pub fn new(config: ProviderConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_default();

        Self {
            config,
            client,
            token_usage: Mutex::new(UsageMetrics::new()),
        }
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// API base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.config.endpoint.trim_end_matches('/')
    }

    /// Fail fast when no key is configured.
    pub fn require_api_key(&self) -> Result<&str, ProviderError> {
        if self.config.has_api_key() {
            Ok(self.config.api_key())
        } else {
            Err(ProviderError::NotConfigured)
        }
    }

    // --- Token usage tracking ---

    pub fn track_token_usage(&self, usage: TokenUsage) {
        self.token_usage.lock().add_usage_metrics(&usage.into());
    }

    pub fn get_token_usage_summary(&self) -> UsageMetrics {
        *self.token_usage.lock()
    }

    pub fn reset_usage(&self) {
        *self.token_usage.lock() = UsageMetrics::new();
    }

    // --- Message formatting ---

    /// Split out the system messages (joined with blank lines) for vendors
    /// that take the system prompt as a separate field.
    pub fn split_system(messages: &[LLMMessage]) -> (Option<String>, Vec<&LLMMessage>) {
        let system: Vec<&str> = messages
            .iter()
            .filter(|m| m.is_system())
            .map(|m| m.content.as_str())
            .collect();
        let rest = messages.iter().filter(|m| !m.is_system()).collect();

        let system = if system.is_empty() {
            None
        } else {
            Some(system.join("\n\n"))
        };
        (system, rest)
    }

    /// Parse structured output from a response string.
    ///
    /// Tries the whole response as JSON first, then the outermost `{...}`
    /// span (models like to wrap JSON in prose or code fences).
    pub fn validate_structured_output(response: &str) -> Result<Value, ProviderError> {
        let trimmed = response.trim();
        if trimmed.starts_with('{') || trimmed.starts_with('[') {
            if let Ok(val) = serde_json::from_str::<Value>(trimmed) {
                return Ok(val);
            }
        }

        if let Some(m) = JSON_OBJECT_RE.find(response) {
            if let Ok(val) = serde_json::from_str::<Value>(m.as_str()) {
                return Ok(val);
            }
        }

        Err(ProviderError::InvalidResponse(
            "no JSON object found in model output".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> BaseLLMState {
        BaseLLMState::new(ProviderConfig::new(ProviderId::OpenAI, "sk-test"))
    }

    #[test]
    fn test_split_system_joins_system_messages() {
        let messages = vec![
            LLMMessage::system("You are a hospital assistant."),
            LLMMessage::user("Show me all beds"),
            LLMMessage::system("Answer briefly."),
        ];
        let (system, rest) = BaseLLMState::split_system(&messages);
        assert_eq!(
            system.as_deref(),
            Some("You are a hospital assistant.\n\nAnswer briefly.")
        );
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].role, "user");
    }

    #[test]
    fn test_validate_structured_output() {
        let direct = BaseLLMState::validate_structured_output("{\"needsMCPData\": true}").unwrap();
        assert_eq!(direct["needsMCPData"], true);

        let fenced = BaseLLMState::validate_structured_output(
            "Sure:\n```json\n{\"needsMCPData\": false,\n \"topic\": \"greeting\"}\n```",
        )
        .unwrap();
        assert_eq!(fenced["topic"], "greeting");

        assert!(matches!(
            BaseLLMState::validate_structured_output("no json here"),
            Err(ProviderError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_token_usage_tracking_and_reset() {
        let state = state();
        state.track_token_usage(TokenUsage {
            input_tokens: 100,
            output_tokens: 20,
        });
        state.track_token_usage(TokenUsage {
            input_tokens: 10,
            output_tokens: 5,
        });

        let usage = state.get_token_usage_summary();
        assert_eq!(usage.total_tokens, 135);
        assert_eq!(usage.successful_requests, 2);

        state.reset_usage();
        assert_eq!(state.get_token_usage_summary(), UsageMetrics::new());
    }

    #[test]
    fn test_require_api_key() {
        assert!(state().require_api_key().is_ok());
        let empty = BaseLLMState::new(ProviderConfig::new(ProviderId::Groq, ""));
        assert_eq!(empty.require_api_key(), Err(ProviderError::NotConfigured));
    }
}
