//! Error types for the assistant core.
//!
//! Every failure kind the routing layer can meet is named here. Most of
//! them never escape a turn: classification failures degrade to the
//! heuristic result, provider failures degrade to the deterministic
//! formatter, and tool failures are reported per invocation.

use thiserror::Error;

/// Errors raised while talking to an LLM provider.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    /// No provider is configured for this conversation.
    #[error("no LLM provider is configured")]
    NotConfigured,

    /// Rate limited or out of credits.
    #[error("LLM provider quota exceeded: {0}")]
    QuotaExceeded(String),

    /// The API key was rejected.
    #[error("LLM provider rejected the credentials: {0}")]
    Authentication(String),

    /// The provider could not be reached.
    #[error("LLM provider unreachable: {0}")]
    Network(String),

    /// The provider answered with a non-success status.
    #[error("LLM provider error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The provider answered, but not in a shape we understand.
    #[error("unexpected LLM provider response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// Whether the error means the provider is over quota.
    pub fn is_quota(&self) -> bool {
        matches!(self, ProviderError::QuotaExceeded(_))
    }

    /// Whether a retry could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Network(_) => true,
            ProviderError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Short label used in user-facing degradation notes.
    pub fn kind(&self) -> &'static str {
        match self {
            ProviderError::NotConfigured => "not configured",
            ProviderError::QuotaExceeded(_) => "quota exceeded",
            ProviderError::Authentication(_) => "authentication failed",
            ProviderError::Network(_) => "unreachable",
            ProviderError::Api { .. } => "provider error",
            ProviderError::InvalidResponse(_) => "invalid response",
        }
    }
}

/// Errors of the query-routing and orchestration layer.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AssistantError {
    /// The backend executor could not produce a tool catalog.
    #[error("tool catalog unavailable: {0}")]
    CatalogUnavailable(String),

    /// The semantic classifier failed. Absorbed, never surfaced.
    #[error("semantic classification failed: {0}")]
    ClassificationFailed(String),

    /// A constructed invocation lacks fields its schema requires.
    #[error("missing required field(s) for {operation}: {}", fields.join(", "))]
    MissingRequiredField {
        operation: String,
        fields: Vec<String>,
    },

    /// The backend reported a failure for one invocation.
    #[error("{operation} failed: {message}")]
    ToolExecutionFailed { operation: String, message: String },

    /// An invocation named an operation the catalog does not contain.
    #[error("unknown operation: {0}")]
    UnknownOperation(String),

    /// The LLM provider is unavailable (quota, auth, network).
    #[error(transparent)]
    ProviderUnavailable(#[from] ProviderError),

    /// Anything else caught at the turn boundary.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Errors raised while loading startup configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A variable is present but not parseable.
    #[error("invalid value for {name}: {value}")]
    InvalidValue { name: String, value: String },

    /// A required variable is absent.
    #[error("missing configuration: {0}")]
    Missing(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_required_field_message_lists_fields() {
        let err = AssistantError::MissingRequiredField {
            operation: "create_patient".to_string(),
            fields: vec!["first_name".to_string(), "date_of_birth".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "missing required field(s) for create_patient: first_name, date_of_birth"
        );
    }

    #[test]
    fn test_provider_error_classification() {
        assert!(ProviderError::QuotaExceeded("429".into()).is_quota());
        assert!(!ProviderError::QuotaExceeded("429".into()).is_retryable());
        assert!(ProviderError::Network("reset".into()).is_retryable());
        assert!(ProviderError::Api { status: 503, message: String::new() }.is_retryable());
        assert!(!ProviderError::Api { status: 400, message: String::new() }.is_retryable());
        assert!(!ProviderError::Authentication("bad key".into()).is_retryable());
    }

    #[test]
    fn test_provider_error_converts_into_assistant_error() {
        let err: AssistantError = ProviderError::NotConfigured.into();
        assert_eq!(err.to_string(), "no LLM provider is configured");
    }
}
