//! MCP client with session management.
//!
//! `MCPClient` drives the MCP JSON-RPC handshake over a [`BaseTransport`]
//! and exposes tool discovery, tool execution and a health ping. Discovery
//! is a pure read and is retried with exponential backoff; execution is
//! sent exactly once because backend operations such as record creation
//! are not idempotent.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::mcp::executor::ToolExecutor;
use crate::mcp::transports::BaseTransport;
use crate::tools::{Arguments, ToolDescriptor};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// MCP connection timeout in seconds.
pub const MCP_CONNECTION_TIMEOUT: u64 = 30;
/// MCP tool execution timeout in seconds.
pub const MCP_TOOL_EXECUTION_TIMEOUT: u64 = 30;
/// MCP tool discovery timeout in seconds.
pub const MCP_DISCOVERY_TIMEOUT: u64 = 30;
/// Health ping timeout in seconds.
pub const MCP_PING_TIMEOUT: u64 = 5;
/// Maximum discovery attempts.
pub const MCP_MAX_RETRIES: u32 = 3;
/// MCP protocol revision announced in `initialize`.
pub const MCP_PROTOCOL_VERSION: &str = "2024-11-05";

/// Upper bound on `tools/list` pages followed in one discovery.
const MAX_TOOL_PAGES: usize = 50;

// ---------------------------------------------------------------------------
// MCPClient
// ---------------------------------------------------------------------------

/// MCP client with session management.
///
/// The client is shared behind an `Arc` by the catalog, the dispatcher and
/// the health monitor, so every operation takes `&self`. The session is
/// initialized lazily on first use. A failed health ping only marks it
/// stale; it is torn down and re-initialized by the next request that
/// finds no other request in flight.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use hms_assistant::mcp::client::MCPClient;
/// use hms_assistant::mcp::transports::HTTPTransport;
///
/// let transport = HTTPTransport::new("http://localhost:3001/mcp", None, None);
/// let client = MCPClient::new(Arc::new(transport))
///     .with_connect_timeout(10)
///     .with_max_retries(5);
///
/// // async {
/// //     let tools = client.list_tools().await.unwrap();
/// //     let beds = client.call_tool("list_beds", &Default::default()).await.unwrap();
/// // };
/// ```
pub struct MCPClient {
    transport: Arc<dyn BaseTransport>,
    /// Connection timeout in seconds.
    pub connect_timeout: u64,
    /// Tool execution timeout in seconds.
    pub execution_timeout: u64,
    /// Tool discovery timeout in seconds.
    pub discovery_timeout: u64,
    /// Maximum discovery attempts.
    pub max_retries: u32,
    initialized: AtomicBool,
    was_connected: AtomicBool,
    server_info: parking_lot::Mutex<Option<Value>>,
    connect_lock: tokio::sync::Mutex<()>,
    /// Set by a failed ping; cleared when the session is reset.
    stale: AtomicBool,
    /// Held shared by every request; taken exclusively to reset the session.
    in_flight: tokio::sync::RwLock<()>,
}

impl MCPClient {
    /// Create a new MCPClient over the given transport.
    pub fn new(transport: Arc<dyn BaseTransport>) -> Self {
        Self {
            transport,
            connect_timeout: MCP_CONNECTION_TIMEOUT,
            execution_timeout: MCP_TOOL_EXECUTION_TIMEOUT,
            discovery_timeout: MCP_DISCOVERY_TIMEOUT,
            max_retries: MCP_MAX_RETRIES,
            initialized: AtomicBool::new(false),
            was_connected: AtomicBool::new(false),
            server_info: parking_lot::Mutex::new(None),
            connect_lock: tokio::sync::Mutex::new(()),
            stale: AtomicBool::new(false),
            in_flight: tokio::sync::RwLock::new(()),
        }
    }

    // -----------------------------------------------------------------------
    // Builder methods
    // -----------------------------------------------------------------------

    /// Builder: set connection timeout.
    pub fn with_connect_timeout(mut self, timeout: u64) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Builder: set execution timeout.
    pub fn with_execution_timeout(mut self, timeout: u64) -> Self {
        self.execution_timeout = timeout;
        self
    }

    /// Builder: set discovery timeout.
    pub fn with_discovery_timeout(mut self, timeout: u64) -> Self {
        self.discovery_timeout = timeout;
        self
    }

    /// Builder: set max discovery attempts (at least one).
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries.max(1);
        self
    }

    // -----------------------------------------------------------------------
    // Connection state
    // -----------------------------------------------------------------------

    /// Whether the transport is up and the MCP session is initialized.
    pub fn connected(&self) -> bool {
        self.transport.connected() && self.initialized.load(Ordering::SeqCst)
    }

    /// `serverInfo` reported by the server during `initialize`.
    pub fn server_info(&self) -> Option<Value> {
        self.server_info.lock().clone()
    }

    /// Transport identifier, for logs and status output.
    pub fn server_identifier(&self) -> String {
        self.transport.server_identifier()
    }

    // -----------------------------------------------------------------------
    // Connect / Disconnect
    // -----------------------------------------------------------------------

    /// Connect to the MCP server and run the `initialize` handshake.
    ///
    /// No-op when already connected.
    pub async fn connect(&self) -> Result<(), anyhow::Error> {
        let _guard = self.connect_lock.lock().await;
        if self.connected() {
            return Ok(());
        }

        let server = self.transport.server_identifier();
        let is_reconnect = self.was_connected.load(Ordering::SeqCst);
        let started_at = Instant::now();

        log::info!(
            "MCP connection started: server='{}', transport='{}', reconnect={}",
            server,
            self.transport.transport_type(),
            is_reconnect
        );

        let timeout = Duration::from_secs(self.connect_timeout);
        match tokio::time::timeout(timeout, self.handshake()).await {
            Ok(Ok(init)) => {
                *self.server_info.lock() = init.get("serverInfo").cloned();
                self.initialized.store(true, Ordering::SeqCst);
                self.was_connected.store(true, Ordering::SeqCst);
                log::info!(
                    "MCP connection established: server='{}' ({}ms)",
                    server,
                    started_at.elapsed().as_millis()
                );
                Ok(())
            }
            Ok(Err(e)) => {
                self.cleanup_on_error().await;
                let error_msg = format!("Failed to connect to MCP server: {}", e);
                log::error!(
                    "MCP connection failed: server='{}', error_type='network', error='{}', duration={}ms",
                    server,
                    error_msg,
                    started_at.elapsed().as_millis()
                );
                Err(anyhow::anyhow!(error_msg))
            }
            Err(_) => {
                self.cleanup_on_error().await;
                let error_msg = format!(
                    "MCP connection timed out after {} seconds. \
                     The server may be slow or unreachable.",
                    self.connect_timeout
                );
                log::error!(
                    "MCP connection failed: server='{}', error_type='timeout', duration={}ms",
                    server,
                    started_at.elapsed().as_millis()
                );
                Err(anyhow::anyhow!(error_msg))
            }
        }
    }

    async fn handshake(&self) -> Result<Value, anyhow::Error> {
        self.transport.connect().await?;
        let init = self
            .transport
            .send_request(
                "initialize",
                json!({
                    "protocolVersion": MCP_PROTOCOL_VERSION,
                    "capabilities": {},
                    "clientInfo": {
                        "name": env!("CARGO_PKG_NAME"),
                        "version": env!("CARGO_PKG_VERSION"),
                    },
                }),
            )
            .await?;
        self.transport
            .send_notification("notifications/initialized", json!({}))
            .await?;
        Ok(init)
    }

    /// Disconnect from the MCP server. No-op when not connected.
    pub async fn disconnect(&self) -> Result<(), anyhow::Error> {
        if !self.transport.connected() && !self.initialized.load(Ordering::SeqCst) {
            return Ok(());
        }

        let result = self.transport.disconnect().await;
        self.initialized.store(false, Ordering::SeqCst);

        result.map_err(|e| anyhow::anyhow!("Error during MCP client disconnect: {}", e))
    }

    async fn cleanup_on_error(&self) {
        let _ = self.transport.disconnect().await;
        self.initialized.store(false, Ordering::SeqCst);
    }

    /// Whether a failed ping is waiting for the session to be reset.
    pub fn is_stale(&self) -> bool {
        self.stale.load(Ordering::SeqCst)
    }

    /// Start a request: reset a stale session if nothing else is using it,
    /// then connect. The returned guard must live until the response is in.
    async fn begin_request(&self) -> Result<tokio::sync::RwLockReadGuard<'_, ()>, anyhow::Error> {
        if self.is_stale() {
            if let Ok(_exclusive) = self.in_flight.try_write() {
                if self.stale.swap(false, Ordering::SeqCst) {
                    log::info!(
                        "Resetting stale MCP session: server='{}'",
                        self.transport.server_identifier()
                    );
                    self.cleanup_on_error().await;
                }
            }
        }

        let guard = self.in_flight.read().await;
        if !self.connected() {
            self.connect().await?;
        }
        Ok(guard)
    }

    // -----------------------------------------------------------------------
    // Tool Operations
    // -----------------------------------------------------------------------

    /// List available tools, following `nextCursor` pagination.
    ///
    /// Definitions without a usable name are skipped.
    pub async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, anyhow::Error> {
        let _request = self.begin_request().await?;
        self.retry_operation(|| self.list_tools_impl()).await
    }

    async fn list_tools_impl(&self) -> Result<Vec<ToolDescriptor>, anyhow::Error> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;

        for _ in 0..MAX_TOOL_PAGES {
            let params = match &cursor {
                Some(c) => json!({ "cursor": c }),
                None => json!({}),
            };
            let page = self.transport.send_request("tools/list", params).await?;

            let definitions = page
                .get("tools")
                .and_then(|t| t.as_array())
                .ok_or_else(|| anyhow::anyhow!("Malformed tools/list response: missing 'tools'"))?;
            tools.extend(definitions.iter().filter_map(ToolDescriptor::from_mcp_definition));

            cursor = page
                .get("nextCursor")
                .and_then(|c| c.as_str())
                .filter(|c| !c.is_empty())
                .map(str::to_string);
            if cursor.is_none() {
                break;
            }
        }

        log::debug!("Discovered {} MCP tools", tools.len());
        Ok(tools)
    }

    /// Call a tool on the MCP server and return its structured data.
    ///
    /// Sent once; never retried.
    pub async fn call_tool(&self, tool_name: &str, arguments: &Arguments) -> Result<Value, anyhow::Error> {
        let _request = self.begin_request().await?;

        let cleaned_arguments = clean_tool_arguments(arguments);
        log::info!(
            "MCP tool execution started: tool='{}', server='{}'",
            tool_name,
            self.transport.server_identifier()
        );
        let started_at = Instant::now();

        let request = self.transport.send_request(
            "tools/call",
            json!({ "name": tool_name, "arguments": cleaned_arguments }),
        );
        let result = match tokio::time::timeout(Duration::from_secs(self.execution_timeout), request).await {
            Ok(Ok(raw)) => parse_tool_result(raw),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(anyhow::anyhow!(
                "Tool '{}' timed out after {} seconds",
                tool_name,
                self.execution_timeout
            )),
        };

        let duration_ms = started_at.elapsed().as_millis();
        match &result {
            Ok(_) => log::info!(
                "MCP tool execution completed: tool='{}' ({}ms)",
                tool_name,
                duration_ms
            ),
            Err(e) => {
                let error_type = if e.to_string().to_lowercase().contains("timed out") {
                    "timeout"
                } else {
                    "server_error"
                };
                log::error!(
                    "MCP tool execution failed: tool='{}', error_type='{}', error='{}' ({}ms)",
                    tool_name,
                    error_type,
                    e,
                    duration_ms
                );
            }
        }
        result
    }

    /// Check the server with `ping`.
    ///
    /// A failed ping never touches requests in flight: it marks the
    /// session stale and leaves the reset to the next request that runs
    /// alone.
    pub async fn ping(&self) -> bool {
        let request = async {
            let _request = self.begin_request().await?;
            self.transport.send_request("ping", json!({})).await
        };

        match tokio::time::timeout(Duration::from_secs(MCP_PING_TIMEOUT), request).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                log::debug!("MCP ping failed: {}", e);
                self.stale.store(true, Ordering::SeqCst);
                false
            }
            Err(_) => {
                log::debug!("MCP ping timed out after {} seconds", MCP_PING_TIMEOUT);
                self.stale.store(true, Ordering::SeqCst);
                false
            }
        }
    }

    // -----------------------------------------------------------------------
    // Retry logic
    // -----------------------------------------------------------------------

    /// Retry an async read with exponential backoff (1s, 2s, 4s, ...).
    ///
    /// Authentication and not-found errors are returned immediately.
    async fn retry_operation<F, Fut, T>(&self, operation: F) -> Result<T, anyhow::Error>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T, anyhow::Error>>,
    {
        let mut last_error = None;
        let timeout = Duration::from_secs(self.discovery_timeout);

        for attempt in 0..self.max_retries {
            match tokio::time::timeout(timeout, operation()).await {
                Ok(Ok(result)) => return Ok(result),
                Ok(Err(e)) => {
                    let error_str = e.to_string().to_lowercase();

                    if error_str.contains("authentication") || error_str.contains("unauthorized") {
                        return Err(anyhow::anyhow!("Authentication failed: {}", e));
                    }
                    if error_str.contains("not found") {
                        return Err(anyhow::anyhow!("Resource not found: {}", e));
                    }

                    log::warn!("MCP operation failed (attempt {}): {}", attempt + 1, e);
                    last_error = Some(e);
                }
                Err(_) => {
                    last_error = Some(anyhow::anyhow!(
                        "Operation timed out after {} seconds",
                        self.discovery_timeout
                    ));
                }
            }

            if attempt + 1 < self.max_retries {
                tokio::time::sleep(Duration::from_secs(2u64.pow(attempt))).await;
            }
        }

        Err(last_error
            .unwrap_or_else(|| anyhow::anyhow!("Operation failed after {} attempts", self.max_retries)))
    }
}

#[async_trait]
impl ToolExecutor for MCPClient {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, anyhow::Error> {
        MCPClient::list_tools(self).await
    }

    async fn call_tool(&self, operation: &str, arguments: &Arguments) -> Result<Value, anyhow::Error> {
        MCPClient::call_tool(self, operation, arguments).await
    }

    async fn health_check(&self) -> bool {
        self.ping().await
    }
}

// ---------------------------------------------------------------------------
// Argument cleaning and result parsing
// ---------------------------------------------------------------------------

/// Remove `null` values and containers left empty after cleaning.
pub fn clean_tool_arguments(arguments: &Arguments) -> Arguments {
    arguments
        .iter()
        .filter_map(|(key, value)| clean_value(value).map(|v| (key.clone(), v)))
        .collect()
}

fn clean_value(value: &Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::Object(map) => {
            let cleaned: Map<String, Value> = clean_tool_arguments(map);
            (!cleaned.is_empty()).then_some(Value::Object(cleaned))
        }
        Value::Array(items) => {
            let cleaned: Vec<Value> = items.iter().filter_map(clean_value).collect();
            (!cleaned.is_empty()).then_some(Value::Array(cleaned))
        }
        other => Some(other.clone()),
    }
}

/// Turn a `tools/call` result into the operation's data.
///
/// `structuredContent` wins over `content`; text content is parsed as JSON
/// when possible. `isError: true` and `{success: false, error}` envelopes
/// become `Err`; a `{success: true, data}` envelope unwraps to `data`.
pub fn parse_tool_result(result: Value) -> Result<Value, anyhow::Error> {
    let is_error = result.get("isError").and_then(|v| v.as_bool()).unwrap_or(false);

    let payload = if let Some(structured) = result.get("structuredContent").filter(|v| !v.is_null()) {
        structured.clone()
    } else if let Some(content) = result.get("content").and_then(|c| c.as_array()) {
        let text: Vec<&str> = content
            .iter()
            .filter(|item| item.get("type").and_then(|t| t.as_str()).unwrap_or("text") == "text")
            .filter_map(|item| item.get("text").and_then(|t| t.as_str()))
            .collect();
        let text = text.join("\n");
        serde_json::from_str(&text).unwrap_or(Value::String(text))
    } else {
        result
    };

    if is_error {
        return Err(anyhow::anyhow!(error_text(&payload)));
    }

    match payload.get("success").and_then(|s| s.as_bool()) {
        Some(false) => Err(anyhow::anyhow!(error_text(&payload))),
        Some(true) => Ok(payload.get("data").cloned().unwrap_or(payload)),
        None => Ok(payload),
    }
}

fn error_text(payload: &Value) -> String {
    match payload {
        Value::String(s) if !s.is_empty() => s.clone(),
        other => other
            .get("error")
            .or_else(|| other.get("message"))
            .and_then(|e| e.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| "operation failed".to_string()),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::transports::TransportType;
    use std::sync::atomic::AtomicUsize;

    type Handler = Box<dyn Fn(&str, &Value) -> Result<Value, anyhow::Error> + Send + Sync>;

    /// Transport answering requests from a closure and recording them.
    ///
    /// Like a single-threaded stdio server, a request waits for the one
    /// before it, and a disconnect fails every request still waiting.
    struct ScriptedTransport {
        connected: AtomicBool,
        calls: parking_lot::Mutex<Vec<(String, Value)>>,
        handler: Handler,
        delays: Vec<(&'static str, Duration)>,
        serial: tokio::sync::Mutex<()>,
    }

    impl ScriptedTransport {
        fn new(handler: Handler) -> Arc<Self> {
            Self::slow(handler, Vec::new())
        }

        fn slow(handler: Handler, delays: Vec<(&'static str, Duration)>) -> Arc<Self> {
            Arc::new(Self {
                connected: AtomicBool::new(false),
                calls: parking_lot::Mutex::new(Vec::new()),
                handler,
                delays,
                serial: tokio::sync::Mutex::new(()),
            })
        }

        fn methods(&self) -> Vec<String> {
            self.calls.lock().iter().map(|(m, _)| m.clone()).collect()
        }
    }

    #[async_trait]
    impl BaseTransport for ScriptedTransport {
        fn transport_type(&self) -> TransportType {
            TransportType::Http
        }
        fn connected(&self) -> bool {
            self.connected.load(Ordering::SeqCst)
        }
        async fn connect(&self) -> Result<(), anyhow::Error> {
            self.connected.store(true, Ordering::SeqCst);
            Ok(())
        }
        async fn disconnect(&self) -> Result<(), anyhow::Error> {
            self.connected.store(false, Ordering::SeqCst);
            Ok(())
        }
        async fn send_request(&self, method: &str, params: Value) -> Result<Value, anyhow::Error> {
            self.calls.lock().push((method.to_string(), params.clone()));
            if method == "initialize" {
                return Ok(json!({"serverInfo": {"name": "hospital", "version": "1.0"}}));
            }

            let _turn = self.serial.lock().await;
            if let Some((_, delay)) = self.delays.iter().find(|(m, _)| *m == method) {
                tokio::time::sleep(*delay).await;
            }
            if !self.connected() {
                return Err(anyhow::anyhow!("MCP server closed before answering '{}'", method));
            }
            (self.handler)(method, &params)
        }
        async fn send_notification(&self, method: &str, params: Value) -> Result<(), anyhow::Error> {
            self.calls.lock().push((method.to_string(), params));
            Ok(())
        }
        fn server_identifier(&self) -> String {
            "http:scripted".to_string()
        }
    }

    #[test]
    fn test_client_new_defaults() {
        let transport = ScriptedTransport::new(Box::new(|_, _| Ok(json!({}))));
        let client = MCPClient::new(transport);

        assert_eq!(client.connect_timeout, MCP_CONNECTION_TIMEOUT);
        assert_eq!(client.execution_timeout, MCP_TOOL_EXECUTION_TIMEOUT);
        assert_eq!(client.discovery_timeout, MCP_DISCOVERY_TIMEOUT);
        assert_eq!(client.max_retries, MCP_MAX_RETRIES);
        assert!(!client.connected());
    }

    #[test]
    fn test_client_builder() {
        let transport = ScriptedTransport::new(Box::new(|_, _| Ok(json!({}))));
        let client = MCPClient::new(transport)
            .with_connect_timeout(60)
            .with_execution_timeout(120)
            .with_discovery_timeout(45)
            .with_max_retries(0);

        assert_eq!(client.connect_timeout, 60);
        assert_eq!(client.execution_timeout, 120);
        assert_eq!(client.discovery_timeout, 45);
        assert_eq!(client.max_retries, 1);
    }

    #[tokio::test]
    async fn test_connect_runs_handshake() {
        let transport = ScriptedTransport::new(Box::new(|_, _| Ok(json!({}))));
        let client = MCPClient::new(transport.clone());

        client.connect().await.unwrap();
        client.connect().await.unwrap();

        assert!(client.connected());
        assert_eq!(transport.methods(), vec!["initialize", "notifications/initialized"]);
        assert_eq!(client.server_info().unwrap()["name"], "hospital");
    }

    #[tokio::test]
    async fn test_list_tools_follows_cursor() {
        let transport = ScriptedTransport::new(Box::new(|method, params| {
            assert_eq!(method, "tools/list");
            if params.get("cursor").is_none() {
                Ok(json!({
                    "tools": [{"name": "list_beds", "description": "List beds", "inputSchema": {"type": "object"}}],
                    "nextCursor": "page-2"
                }))
            } else {
                Ok(json!({
                    "tools": [
                        {"name": "create_patient", "inputSchema": {
                            "type": "object",
                            "properties": {"first_name": {"type": "string"}},
                            "required": ["first_name"]
                        }},
                        {"description": "nameless"}
                    ]
                }))
            }
        }));
        let client = MCPClient::new(transport);

        let tools = client.list_tools().await.unwrap();
        let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["list_beds", "create_patient"]);
        assert_eq!(tools[1].required_fields().collect::<Vec<_>>(), vec!["first_name"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_list_tools_retries_transient_failures() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();
        let transport = ScriptedTransport::new(Box::new(move |_, _| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(anyhow::anyhow!("connection reset"))
            } else {
                Ok(json!({"tools": []}))
            }
        }));
        let client = MCPClient::new(transport);

        assert!(client.list_tools().await.unwrap().is_empty());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_list_tools_does_not_retry_auth_errors() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();
        let transport = ScriptedTransport::new(Box::new(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(anyhow::anyhow!("401 Unauthorized"))
        }));
        let client = MCPClient::new(transport);

        let err = client.list_tools().await.unwrap_err();
        assert!(err.to_string().contains("Authentication failed"));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_call_tool_is_sent_once_and_cleans_arguments() {
        let transport = ScriptedTransport::new(Box::new(|_, _| Err(anyhow::anyhow!("backend exploded"))));
        let client = MCPClient::new(transport.clone());

        let mut args = Arguments::new();
        args.insert("first_name".into(), json!("John"));
        args.insert("middle_name".into(), Value::Null);
        assert!(client.call_tool("create_patient", &args).await.is_err());

        let calls: Vec<_> = transport
            .calls
            .lock()
            .iter()
            .filter(|(m, _)| m == "tools/call")
            .cloned()
            .collect();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1["name"], "create_patient");
        assert_eq!(calls[0].1["arguments"], json!({"first_name": "John"}));
    }

    #[tokio::test]
    async fn test_ping_failure_resets_session_on_next_request() {
        let transport = ScriptedTransport::new(Box::new(|method, _| {
            if method == "ping" {
                Err(anyhow::anyhow!("gone"))
            } else {
                Ok(json!({"content": [{"type": "text", "text": "[]"}]}))
            }
        }));
        let client = MCPClient::new(transport.clone());

        assert!(!client.health_check().await);
        assert!(client.is_stale());
        assert!(client.connected());

        client.call_tool("list_beds", &Arguments::new()).await.unwrap();
        assert!(!client.is_stale());
        let initializations = transport.methods().iter().filter(|m| *m == "initialize").count();
        assert_eq!(initializations, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_call_survives_failed_ping() {
        let transport = ScriptedTransport::slow(
            Box::new(|method, _| match method {
                "tools/call" => Ok(json!({"structuredContent": {"id": 101}})),
                _ => Ok(json!({})),
            }),
            vec![("tools/call", Duration::from_secs(7))],
        );
        let client = Arc::new(MCPClient::new(transport.clone()));
        client.connect().await.unwrap();

        let caller = Arc::clone(&client);
        let call = tokio::spawn(async move {
            let mut args = Arguments::new();
            args.insert("first_name".into(), json!("John"));
            caller.call_tool("create_patient", &args).await
        });
        tokio::task::yield_now().await;

        // The server is busy with the create, so the ping times out.
        assert!(!client.health_check().await);
        assert!(client.is_stale());

        let created = call.await.unwrap().unwrap();
        assert_eq!(created, json!({"id": 101}));
        let creates = transport.methods().iter().filter(|m| *m == "tools/call").count();
        assert_eq!(creates, 1);

        // Idle again: the next health check resets the session and succeeds.
        assert!(client.health_check().await);
        assert!(!client.is_stale());
    }

    #[test]
    fn test_clean_tool_arguments_removes_nulls_and_empty_containers() {
        let args: Arguments = serde_json::from_value(json!({
            "name": "Ward A",
            "notes": null,
            "tags": [null],
            "address": {"line2": null},
            "contact": {"phone": "555", "fax": null},
            "count": 0
        }))
        .unwrap();

        let cleaned = clean_tool_arguments(&args);
        assert_eq!(
            Value::Object(cleaned),
            json!({"name": "Ward A", "contact": {"phone": "555"}, "count": 0})
        );
    }

    #[test]
    fn test_parse_tool_result_prefers_structured_content() {
        let data = parse_tool_result(json!({
            "content": [{"type": "text", "text": "ignored"}],
            "structuredContent": {"beds": [{"bed_number": "B1"}]}
        }))
        .unwrap();
        assert_eq!(data, json!({"beds": [{"bed_number": "B1"}]}));
    }

    #[test]
    fn test_parse_tool_result_unwraps_success_envelope_in_text() {
        let data = parse_tool_result(json!({
            "content": [{"type": "text", "text": "{\"success\":true,\"data\":{\"id\":7}}"}]
        }))
        .unwrap();
        assert_eq!(data, json!({"id": 7}));
    }

    #[test]
    fn test_parse_tool_result_failures() {
        let err = parse_tool_result(json!({
            "content": [{"type": "text", "text": "{\"success\":false,\"error\":\"duplicate patient\"}"}]
        }))
        .unwrap_err();
        assert_eq!(err.to_string(), "duplicate patient");

        let err = parse_tool_result(json!({
            "isError": true,
            "content": [{"type": "text", "text": "bed not found"}]
        }))
        .unwrap_err();
        assert_eq!(err.to_string(), "bed not found");
    }

    #[test]
    fn test_parse_tool_result_plain_text() {
        let data = parse_tool_result(json!({"content": [{"type": "text", "text": "ok"}]})).unwrap();
        assert_eq!(data, json!("ok"));
    }
}
