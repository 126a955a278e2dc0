//! LLM provider implementations.
//!
//! Each provider implements [`BaseLLM`] over its vendor's HTTP API and
//! handles authentication, request formatting and token accounting.
//!
//! | Provider | Module | API |
//! |----------|--------|-----|
//! | OpenAI | [`openai`] | Chat Completions |
//! | Anthropic | [`anthropic`] | Messages |
//! | Google | [`gemini`] | `generateContent` |
//! | Groq | [`groq`] | OpenAI-compatible Chat Completions |
//!
//! The [`utils`] module holds the shared send/retry loop and status mapping.

pub mod anthropic;
pub mod gemini;
pub mod groq;
pub mod openai;
pub mod utils;

use crate::llms::base_llm::BaseLLM;
use crate::llms::provider_config::{ProviderConfig, ProviderId};

/// Construct the provider selected by `config.provider_id`.
pub fn create_llm(config: ProviderConfig) -> Box<dyn BaseLLM> {
    match config.provider_id {
        ProviderId::OpenAI => Box::new(openai::OpenAICompletion::new(config)),
        ProviderId::Anthropic => Box::new(anthropic::AnthropicCompletion::new(config)),
        ProviderId::Google => Box::new(gemini::GeminiCompletion::new(config)),
        ProviderId::Groq => Box::new(groq::GroqCompletion::new(config)),
    }
}
