//! Transport layer implementations for MCP connections.
//!
//! - **Stdio** (`StdioTransport`): a local MCP server run as a child
//!   process, newline-delimited JSON-RPC over stdin/stdout.
//! - **HTTP** (`HTTPTransport`): a remote MCP server over streamable HTTP.
//!
//! Both implement [`BaseTransport`], which carries JSON-RPC 2.0 requests and
//! notifications and returns the `result` member of each response.

pub mod http;
pub mod stdio;

use async_trait::async_trait;
use serde_json::Value;

pub use http::HTTPTransport;
pub use stdio::StdioTransport;

/// JSON-RPC protocol version string.
pub const JSONRPC_VERSION: &str = "2.0";

// ---------------------------------------------------------------------------
// TransportType
// ---------------------------------------------------------------------------

/// MCP transport types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportType {
    /// Standard I/O transport (local child process).
    Stdio,
    /// Plain JSON-over-HTTP transport.
    Http,
    /// Streamable HTTP transport (JSON or event-stream responses).
    StreamableHttp,
}

impl std::fmt::Display for TransportType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.value())
    }
}

impl TransportType {
    /// Get the string value of the transport type.
    pub fn value(&self) -> &'static str {
        match self {
            TransportType::Stdio => "stdio",
            TransportType::Http => "http",
            TransportType::StreamableHttp => "streamable-http",
        }
    }

    /// Parse a transport type from a string (case-insensitive).
    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "stdio" => Some(TransportType::Stdio),
            "http" => Some(TransportType::Http),
            "streamable-http" | "streamable_http" => Some(TransportType::StreamableHttp),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// BaseTransport
// ---------------------------------------------------------------------------

/// Base trait for MCP transport implementations.
///
/// Transports are shared between concurrent tool invocations, so every
/// method takes `&self`; implementations keep their mutable state behind
/// locks or atomics.
#[async_trait]
pub trait BaseTransport: Send + Sync {
    /// Return the transport type.
    fn transport_type(&self) -> TransportType;

    /// Check if transport is currently connected.
    fn connected(&self) -> bool;

    /// Establish the underlying channel. No-op when already connected.
    async fn connect(&self) -> Result<(), anyhow::Error>;

    /// Tear down the underlying channel. No-op when not connected.
    async fn disconnect(&self) -> Result<(), anyhow::Error>;

    /// Send a JSON-RPC request and return the response's `result` member.
    ///
    /// A JSON-RPC `error` member is returned as `Err`.
    async fn send_request(&self, method: &str, params: Value) -> Result<Value, anyhow::Error>;

    /// Send a JSON-RPC notification (no response expected).
    async fn send_notification(&self, method: &str, params: Value) -> Result<(), anyhow::Error>;

    /// String identifier for logging: `stdio:{command}:{args}` or `http:{url}`.
    fn server_identifier(&self) -> String;
}

// ---------------------------------------------------------------------------
// JSON-RPC helpers
// ---------------------------------------------------------------------------

/// Build a JSON-RPC request envelope.
pub fn jsonrpc_request(id: u64, method: &str, params: Value) -> Value {
    serde_json::json!({
        "jsonrpc": JSONRPC_VERSION,
        "id": id,
        "method": method,
        "params": params,
    })
}

/// Build a JSON-RPC notification envelope.
pub fn jsonrpc_notification(method: &str, params: Value) -> Value {
    serde_json::json!({
        "jsonrpc": JSONRPC_VERSION,
        "method": method,
        "params": params,
    })
}

/// Extract `result` from a JSON-RPC response, turning `error` into `Err`.
pub fn jsonrpc_result(response: Value) -> Result<Value, anyhow::Error> {
    if let Some(error) = response.get("error") {
        let code = error.get("code").and_then(|c| c.as_i64()).unwrap_or(0);
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("unknown JSON-RPC error");
        return Err(anyhow::anyhow!("MCP error {}: {}", code, message));
    }

    match response {
        Value::Object(mut map) => Ok(map.remove("result").unwrap_or(Value::Null)),
        other => Err(anyhow::anyhow!("Malformed JSON-RPC response: {}", other)),
    }
}

/// Response id as `u64`, when present.
pub fn jsonrpc_id(message: &Value) -> Option<u64> {
    message.get("id").and_then(|id| {
        id.as_u64()
            .or_else(|| id.as_str().and_then(|s| s.parse().ok()))
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
