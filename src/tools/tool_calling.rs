//! Tool invocation and call-result data structures.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Argument object sent with an invocation.
pub type Arguments = Map<String, Value>;

/// Error text recorded when an invocation exceeds its execution timeout.
pub const TIMEOUT_ERROR: &str = "timeout";

/// One call to a backend operation.
///
/// Built by the argument extractor; `operation` must name a tool present
/// in the catalog at dispatch time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    /// Operation name, e.g. `create_patient`.
    pub operation: String,
    /// Argument object matching the operation's schema.
    #[serde(default)]
    pub arguments: Arguments,
}

impl ToolInvocation {
    /// Create an invocation with the given arguments.
    pub fn new(operation: impl Into<String>, arguments: Arguments) -> Self {
        Self {
            operation: operation.into(),
            arguments,
        }
    }

    /// Create a no-argument invocation, used for pure "list X" reads.
    pub fn without_arguments(operation: impl Into<String>) -> Self {
        Self::new(operation, Arguments::new())
    }
}

/// Outcome of one invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallResult {
    /// The invocation this result answers.
    pub invocation: ToolInvocation,
    /// Whether the backend reported success.
    pub success: bool,
    /// Structured data returned on success.
    pub data: Option<Value>,
    /// Error text on failure.
    pub error: Option<String>,
    /// Wall-clock time spent on the call.
    pub latency_ms: u64,
}

impl ToolCallResult {
    pub fn succeeded(invocation: ToolInvocation, data: Value, latency_ms: u64) -> Self {
        Self {
            invocation,
            success: true,
            data: Some(data),
            error: None,
            latency_ms,
        }
    }

    pub fn failed(invocation: ToolInvocation, error: impl Into<String>, latency_ms: u64) -> Self {
        Self {
            invocation,
            success: false,
            data: None,
            error: Some(error.into()),
            latency_ms,
        }
    }

    pub fn timed_out(invocation: ToolInvocation, latency_ms: u64) -> Self {
        Self::failed(invocation, TIMEOUT_ERROR, latency_ms)
    }

    /// Operation name shortcut.
    pub fn operation(&self) -> &str {
        &self.invocation.operation
    }

    /// Whether this result failed because of the execution timeout.
    pub fn is_timeout(&self) -> bool {
        !self.success && self.error.as_deref() == Some(TIMEOUT_ERROR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_result_constructors() {
        let inv = ToolInvocation::without_arguments("list_beds");
        let ok = ToolCallResult::succeeded(inv.clone(), json!({"beds": []}), 12);
        assert!(ok.success);
        assert!(ok.error.is_none());
        assert_eq!(ok.operation(), "list_beds");

        let timeout = ToolCallResult::timed_out(inv.clone(), 30_000);
        assert!(!timeout.success);
        assert!(timeout.is_timeout());

        let failed = ToolCallResult::failed(inv, "boom", 3);
        assert!(!failed.is_timeout());
        assert_eq!(failed.error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_result_serializes_camel_case() {
        let inv = ToolInvocation::without_arguments("list_staff");
        let value = serde_json::to_value(ToolCallResult::succeeded(inv, json!([]), 5)).unwrap();
        assert_eq!(value["latencyMs"], 5);
        assert_eq!(value["invocation"]["operation"], "list_staff");
    }
}
