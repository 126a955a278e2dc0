//! Utility modules shared across the assistant.

pub mod errors;
pub mod string_utils;

pub use errors::{AssistantError, ConfigError, ProviderError};
