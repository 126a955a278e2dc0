//! LLM layer.
//!
//! - [`base_llm`] - the per-vendor completion trait and shared state
//! - [`provider_config`] - provider selection and credentials
//! - [`providers`] - OpenAI, Anthropic, Gemini and Groq implementations
//! - [`adapter`] - the uniform analyze/generate contract used by the chat core
//! - [`prompts`] - analysis and generation prompts
//! - [`registry`] - the single process-wide active provider

pub mod adapter;
pub mod base_llm;
pub mod prompts;
pub mod provider_config;
pub mod providers;
pub mod registry;

pub use adapter::{GenerateRequest, GeneratedReply, LlmAdapter, ProviderAdapter, QueryAnalysis};
pub use base_llm::{BaseLLM, BaseLLMState, Completion, LLMMessage};
pub use provider_config::{ProviderConfig, ProviderId};
pub use registry::ProviderRegistry;
