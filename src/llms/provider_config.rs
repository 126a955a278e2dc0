//! Provider selection and credentials.
//!
//! A `ProviderConfig` is resolved once (from the environment or a runtime
//! switch request) and handed to the provider constructor. The API key is
//! kept in a [`SecretString`] and never appears in `Debug` output or logs.

use std::fmt;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

/// Default request timeout for provider calls, in seconds.
pub const DEFAULT_PROVIDER_TIMEOUT: u64 = 60;
/// Default retry count for transient provider failures.
pub const DEFAULT_PROVIDER_RETRIES: u32 = 2;
/// Default completion length cap.
pub const DEFAULT_MAX_TOKENS: u32 = 1024;

/// Supported LLM vendors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    #[serde(rename = "openai")]
    OpenAI,
    Anthropic,
    #[serde(alias = "gemini")]
    Google,
    Groq,
}

impl ProviderId {
    pub const ALL: [ProviderId; 4] = [
        ProviderId::OpenAI,
        ProviderId::Anthropic,
        ProviderId::Google,
        ProviderId::Groq,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::OpenAI => "openai",
            ProviderId::Anthropic => "anthropic",
            ProviderId::Google => "google",
            ProviderId::Groq => "groq",
        }
    }

    /// Parse a provider name (case-insensitive, `gemini` accepted for Google).
    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Some(ProviderId::OpenAI),
            "anthropic" | "claude" => Some(ProviderId::Anthropic),
            "google" | "gemini" => Some(ProviderId::Google),
            "groq" => Some(ProviderId::Groq),
            _ => None,
        }
    }

    /// Vendor API base URL.
    pub fn default_endpoint(&self) -> &'static str {
        match self {
            ProviderId::OpenAI => "https://api.openai.com/v1",
            ProviderId::Anthropic => "https://api.anthropic.com",
            ProviderId::Google => "https://generativelanguage.googleapis.com/v1beta",
            ProviderId::Groq => "https://api.groq.com/openai/v1",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderId::OpenAI => "gpt-4o-mini",
            ProviderId::Anthropic => "claude-3-5-haiku-latest",
            ProviderId::Google => "gemini-1.5-flash",
            ProviderId::Groq => "llama-3.1-8b-instant",
        }
    }

    /// Vendor-specific environment variable holding the API key.
    pub fn api_key_env(&self) -> &'static str {
        match self {
            ProviderId::OpenAI => "OPENAI_API_KEY",
            ProviderId::Anthropic => "ANTHROPIC_API_KEY",
            ProviderId::Google => "GOOGLE_API_KEY",
            ProviderId::Groq => "GROQ_API_KEY",
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything needed to construct one provider instance.
#[derive(Clone)]
pub struct ProviderConfig {
    pub provider_id: ProviderId,
    api_key: SecretString,
    /// API base URL.
    pub endpoint: String,
    pub model: String,
    pub temperature: Option<f64>,
    pub max_tokens: u32,
    pub timeout_secs: u64,
    /// Retries for network errors and 5xx answers. Quota and auth errors are never retried.
    pub max_retries: u32,
}

impl ProviderConfig {
    /// Config with the vendor's default endpoint and model.
    pub fn new(provider_id: ProviderId, api_key: impl Into<String>) -> Self {
        Self {
            provider_id,
            api_key: SecretString::new(api_key.into()),
            endpoint: provider_id.default_endpoint().to_string(),
            model: provider_id.default_model().to_string(),
            temperature: Some(0.2),
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout_secs: DEFAULT_PROVIDER_TIMEOUT,
            max_retries: DEFAULT_PROVIDER_RETRIES,
        }
    }

    /// Override the endpoint; blank values keep the default.
    pub fn with_endpoint(mut self, endpoint: Option<String>) -> Self {
        if let Some(endpoint) = endpoint.filter(|e| !e.trim().is_empty()) {
            self.endpoint = endpoint.trim().trim_end_matches('/').to_string();
        }
        self
    }

    /// Override the model; blank values keep the default.
    pub fn with_model(mut self, model: Option<String>) -> Self {
        if let Some(model) = model.filter(|m| !m.trim().is_empty()) {
            self.model = model.trim().to_string();
        }
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// The raw API key, for request headers only.
    pub fn api_key(&self) -> &str {
        self.api_key.expose_secret()
    }

    pub fn has_api_key(&self) -> bool {
        !self.api_key().trim().is_empty()
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("provider_id", &self.provider_id)
            .field("api_key", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_id_parsing() {
        assert_eq!(ProviderId::from_str_opt("OpenAI"), Some(ProviderId::OpenAI));
        assert_eq!(ProviderId::from_str_opt("gemini"), Some(ProviderId::Google));
        assert_eq!(ProviderId::from_str_opt(" groq "), Some(ProviderId::Groq));
        assert_eq!(ProviderId::from_str_opt("mistral"), None);

        for id in ProviderId::ALL {
            assert_eq!(ProviderId::from_str_opt(id.as_str()), Some(id));
        }
    }

    #[test]
    fn test_provider_id_serde() {
        assert_eq!(serde_json::to_string(&ProviderId::OpenAI).unwrap(), "\"openai\"");
        let id: ProviderId = serde_json::from_str("\"gemini\"").unwrap();
        assert_eq!(id, ProviderId::Google);
    }

    #[test]
    fn test_config_defaults_and_overrides() {
        let config = ProviderConfig::new(ProviderId::Anthropic, "sk-ant-test")
            .with_endpoint(Some("https://proxy.internal/anthropic/".to_string()))
            .with_model(Some("  ".to_string()));

        assert_eq!(config.endpoint, "https://proxy.internal/anthropic");
        assert_eq!(config.model, "claude-3-5-haiku-latest");
        assert_eq!(config.api_key(), "sk-ant-test");
        assert!(config.has_api_key());
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let config = ProviderConfig::new(ProviderId::OpenAI, "sk-very-secret");
        let debug = format!("{:?}", config);
        assert!(!debug.contains("sk-very-secret"));
        assert!(debug.contains("<redacted>"));
    }
}
