//! Groq provider.
//!
//! Groq serves an OpenAI-compatible Chat Completions API, so this wraps
//! [`OpenAICompletion`] pointed at Groq's endpoint.

use async_trait::async_trait;

use crate::llms::base_llm::{BaseLLM, Completion, LLMMessage};
use crate::llms::provider_config::{ProviderConfig, ProviderId};
use crate::llms::providers::openai::OpenAICompletion;
use crate::types::usage_metrics::UsageMetrics;
use crate::utilities::errors::ProviderError;

#[derive(Debug)]
pub struct GroqCompletion {
    inner: OpenAICompletion,
}

impl GroqCompletion {
    pub fn new(mut config: ProviderConfig) -> Self {
        config.provider_id = ProviderId::Groq;
        Self {
            inner: OpenAICompletion::new(config),
        }
    }

    pub fn completions_url(&self) -> String {
        self.inner.completions_url()
    }
}

#[async_trait]
impl BaseLLM for GroqCompletion {
    fn provider(&self) -> ProviderId {
        ProviderId::Groq
    }

    fn model(&self) -> &str {
        self.inner.model()
    }

    async fn complete(&self, messages: &[LLMMessage], json_mode: bool) -> Result<Completion, ProviderError> {
        self.inner.complete(messages, json_mode).await
    }

    fn get_token_usage_summary(&self) -> UsageMetrics {
        self.inner.get_token_usage_summary()
    }

    fn reset(&self) {
        self.inner.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_groq_uses_openai_compatible_endpoint() {
        let groq = GroqCompletion::new(ProviderConfig::new(ProviderId::Groq, "gsk-test"));
        assert_eq!(groq.completions_url(), "https://api.groq.com/openai/v1/chat/completions");
        assert_eq!(groq.provider(), ProviderId::Groq);
        assert_eq!(groq.model(), "llama-3.1-8b-instant");
    }
}
