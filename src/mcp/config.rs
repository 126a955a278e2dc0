//! MCP server configuration.
//!
//! The hospital backend is reachable either as a remote streamable-HTTP
//! server or as a local process speaking stdio. Each configuration builds
//! the matching transport and an [`MCPClient`] over it.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::mcp::client::MCPClient;
use crate::mcp::transports::{BaseTransport, HTTPTransport, StdioTransport};

// ---------------------------------------------------------------------------
// MCPServerStdio
// ---------------------------------------------------------------------------

/// Stdio MCP server configuration.
///
/// # Example
///
/// ```rust
/// use hms_assistant::mcp::config::MCPServerStdio;
///
/// let config = MCPServerStdio::new("node").with_args(vec!["dist/server.js".to_string()]);
/// assert_eq!(config.server_identifier(), "stdio:node:dist/server.js");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MCPServerStdio {
    /// Command to execute (e.g., "node", "npx").
    pub command: String,
    /// Command arguments.
    #[serde(default)]
    pub args: Vec<String>,
    /// Environment variables to pass to the process.
    #[serde(default)]
    pub env: Option<HashMap<String, String>>,
}

impl MCPServerStdio {
    pub fn new(command: &str) -> Self {
        Self {
            command: command.to_string(),
            args: Vec::new(),
            env: None,
        }
    }

    /// Set the command arguments.
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    /// Set the environment variables.
    pub fn with_env(mut self, env: HashMap<String, String>) -> Self {
        self.env = Some(env);
        self
    }

    pub fn server_identifier(&self) -> String {
        format!("stdio:{}:{}", self.command, self.args.join(":"))
    }
}

// ---------------------------------------------------------------------------
// MCPServerHTTP
// ---------------------------------------------------------------------------

/// HTTP / streamable-HTTP MCP server configuration.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct MCPServerHTTP {
    /// Server URL (e.g., "http://localhost:3001/mcp").
    pub url: String,
    /// Optional HTTP headers, e.g. for a gateway token.
    #[serde(default)]
    pub headers: Option<HashMap<String, String>>,
    /// Whether to use streamable HTTP transport (default: true).
    #[serde(default = "default_true")]
    pub streamable: bool,
}

fn default_true() -> bool {
    true
}

impl std::fmt::Debug for MCPServerHTTP {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MCPServerHTTP")
            .field("url", &self.url)
            .field(
                "headers",
                &self.headers.as_ref().map(|h| {
                    h.keys().map(|k| format!("{}=<masked>", k)).collect::<Vec<_>>()
                }),
            )
            .field("streamable", &self.streamable)
            .finish()
    }
}

impl MCPServerHTTP {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            headers: None,
            streamable: true,
        }
    }

    /// Set the HTTP headers.
    pub fn with_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers = Some(headers);
        self
    }

    /// Set whether to use streamable HTTP.
    pub fn with_streamable(mut self, streamable: bool) -> Self {
        self.streamable = streamable;
        self
    }

    pub fn server_identifier(&self) -> String {
        format!("http:{}", self.url)
    }
}

// ---------------------------------------------------------------------------
// MCPServerConfig
// ---------------------------------------------------------------------------

/// Any supported MCP server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "transport", rename_all = "lowercase")]
pub enum MCPServerConfig {
    Stdio(MCPServerStdio),
    Http(MCPServerHTTP),
}

impl MCPServerConfig {
    pub fn server_identifier(&self) -> String {
        match self {
            MCPServerConfig::Stdio(c) => c.server_identifier(),
            MCPServerConfig::Http(c) => c.server_identifier(),
        }
    }

    /// Build the transport described by this configuration.
    pub fn build_transport(&self) -> Arc<dyn BaseTransport> {
        match self {
            MCPServerConfig::Stdio(c) => Arc::new(StdioTransport::new(
                &c.command,
                Some(c.args.clone()),
                c.env.clone(),
            )),
            MCPServerConfig::Http(c) => Arc::new(HTTPTransport::new(
                &c.url,
                c.headers.clone(),
                Some(c.streamable),
            )),
        }
    }

    /// Build an unconnected client; `execution_timeout` bounds each tool call.
    pub fn build_client(&self, execution_timeout: u64) -> MCPClient {
        MCPClient::new(self.build_transport()).with_execution_timeout(execution_timeout)
    }
}

impl From<MCPServerStdio> for MCPServerConfig {
    fn from(config: MCPServerStdio) -> Self {
        MCPServerConfig::Stdio(config)
    }
}

impl From<MCPServerHTTP> for MCPServerConfig {
    fn from(config: MCPServerHTTP) -> Self {
        MCPServerConfig::Http(config)
    }
}
