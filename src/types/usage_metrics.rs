//! Token usage tracking for LLM providers.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Cumulative token usage for one provider instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageMetrics {
    /// Total number of tokens used.
    pub total_tokens: i64,
    /// Number of tokens used in prompts.
    pub prompt_tokens: i64,
    /// Number of tokens used in completions.
    pub completion_tokens: i64,
    /// Number of successful requests made.
    pub successful_requests: i64,
}

impl UsageMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add usage metrics from another UsageMetrics object.
    pub fn add_usage_metrics(&mut self, other: &UsageMetrics) {
        self.total_tokens += other.total_tokens;
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.successful_requests += other.successful_requests;
    }

    /// Record one request from vendor usage data.
    ///
    /// Field names differ per vendor (OpenAI and Groq `prompt_tokens`,
    /// Anthropic `input_tokens`, Gemini `promptTokenCount`); all are accepted.
    pub fn track(&mut self, usage_data: &HashMap<String, Value>) {
        let prompt_tokens = usage_data
            .get("prompt_tokens")
            .or_else(|| usage_data.get("input_tokens"))
            .or_else(|| usage_data.get("promptTokenCount"))
            .and_then(|v| v.as_i64())
            .unwrap_or(0);

        let completion_tokens = usage_data
            .get("completion_tokens")
            .or_else(|| usage_data.get("output_tokens"))
            .or_else(|| usage_data.get("candidatesTokenCount"))
            .and_then(|v| v.as_i64())
            .unwrap_or(0);

        self.prompt_tokens += prompt_tokens;
        self.completion_tokens += completion_tokens;
        self.total_tokens += prompt_tokens + completion_tokens;
        self.successful_requests += 1;
    }
}

/// Token counts for a single provider response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    pub input_tokens: i64,
    pub output_tokens: i64,
}

impl From<TokenUsage> for UsageMetrics {
    fn from(usage: TokenUsage) -> Self {
        Self {
            total_tokens: usage.input_tokens + usage.output_tokens,
            prompt_tokens: usage.input_tokens,
            completion_tokens: usage.output_tokens,
            successful_requests: 1,
        }
    }
}
