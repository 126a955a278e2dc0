//! Stdio transport for MCP servers running as local processes.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::mcp::transports::{
    jsonrpc_id, jsonrpc_notification, jsonrpc_request, jsonrpc_result, BaseTransport,
    TransportType,
};

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<Value>>>>;

/// Removes a request's pending entry when its caller stops waiting.
struct PendingEntry<'a> {
    pending: &'a PendingMap,
    id: u64,
}

impl Drop for PendingEntry<'_> {
    fn drop(&mut self) {
        self.pending.lock().remove(&self.id);
    }
}

/// Stdio transport for connecting to local MCP servers.
///
/// Requests are written as one JSON line each; a reader task matches
/// response lines to waiting requests by id, so concurrent invocations can
/// share the same process.
pub struct StdioTransport {
    /// Command to execute (e.g., "node", "npx").
    pub command: String,
    /// Command arguments.
    pub args: Vec<String>,
    /// Environment variables to pass to the process.
    pub env: HashMap<String, String>,
    is_connected: Arc<AtomicBool>,
    next_id: AtomicU64,
    pending: PendingMap,
    stdin: tokio::sync::Mutex<Option<ChildStdin>>,
    process: Mutex<Option<Child>>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl StdioTransport {
    /// Create a new StdioTransport.
    ///
    /// # Arguments
    /// * `command` - Command to execute.
    /// * `args` - Command arguments.
    /// * `env` - Environment variables.
    pub fn new(
        command: &str,
        args: Option<Vec<String>>,
        env: Option<HashMap<String, String>>,
    ) -> Self {
        Self {
            command: command.to_string(),
            args: args.unwrap_or_default(),
            env: env.unwrap_or_default(),
            is_connected: Arc::new(AtomicBool::new(false)),
            next_id: AtomicU64::new(1),
            pending: Arc::new(Mutex::new(HashMap::new())),
            stdin: tokio::sync::Mutex::new(None),
            process: Mutex::new(None),
            reader: Mutex::new(None),
        }
    }

    async fn write_line(&self, message: &Value) -> Result<(), anyhow::Error> {
        let mut line = serde_json::to_string(message)?;
        line.push('\n');

        let mut guard = self.stdin.lock().await;
        let stdin = guard
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("Stdio transport is not connected"))?;
        stdin.write_all(line.as_bytes()).await?;
        stdin.flush().await?;
        Ok(())
    }
}

/// Route each response line to the request waiting on its id.
async fn read_responses<R>(reader: R, pending: PendingMap, connected: Arc<AtomicBool>)
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if line.trim().is_empty() {
                    continue;
                }
                let message: Value = match serde_json::from_str(&line) {
                    Ok(message) => message,
                    Err(_) => {
                        log::debug!("Ignoring non-JSON line from MCP server: {}", line);
                        continue;
                    }
                };
                let Some(id) = jsonrpc_id(&message) else {
                    log::trace!("MCP server notification: {}", message);
                    continue;
                };
                if let Some(sender) = pending.lock().remove(&id) {
                    let _ = sender.send(message);
                }
            }
            Ok(None) => break,
            Err(e) => {
                log::warn!("Error reading from MCP server stdout: {}", e);
                break;
            }
        }
    }

    // Process exited: fail everything still waiting.
    connected.store(false, Ordering::SeqCst);
    pending.lock().clear();
}

#[async_trait]
impl BaseTransport for StdioTransport {
    fn transport_type(&self) -> TransportType {
        TransportType::Stdio
    }

    fn connected(&self) -> bool {
        self.is_connected.load(Ordering::SeqCst)
    }

    async fn connect(&self) -> Result<(), anyhow::Error> {
        if self.connected() {
            return Ok(());
        }

        let mut cmd = Command::new(&self.command);
        cmd.args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        for (key, value) in &self.env {
            cmd.env(key, value);
        }

        let mut child = cmd.spawn().map_err(|e| {
            anyhow::anyhow!(
                "Failed to start MCP server process '{}': {}",
                self.command,
                e
            )
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow::anyhow!("MCP server process has no stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow::anyhow!("MCP server process has no stdout"))?;

        *self.stdin.lock().await = Some(stdin);
        *self.process.lock() = Some(child);
        self.is_connected.store(true, Ordering::SeqCst);

        let handle = tokio::spawn(read_responses(
            stdout,
            Arc::clone(&self.pending),
            Arc::clone(&self.is_connected),
        ));
        *self.reader.lock() = Some(handle);

        log::info!(
            "Stdio transport connected: {} {}",
            self.command,
            self.args.join(" ")
        );

        Ok(())
    }

    async fn disconnect(&self) -> Result<(), anyhow::Error> {
        if !self.connected() && self.process.lock().is_none() {
            return Ok(());
        }

        self.stdin.lock().await.take();
        if let Some(handle) = self.reader.lock().take() {
            handle.abort();
        }
        let child = self.process.lock().take();
        if let Some(mut child) = child {
            let _ = child.kill().await;
        }
        self.pending.lock().clear();
        self.is_connected.store(false, Ordering::SeqCst);

        log::info!(
            "Stdio transport disconnected: {} {}",
            self.command,
            self.args.join(" ")
        );

        Ok(())
    }

    async fn send_request(&self, method: &str, params: Value) -> Result<Value, anyhow::Error> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id, tx);
        let _entry = PendingEntry {
            pending: &self.pending,
            id,
        };

        self.write_line(&jsonrpc_request(id, method, params)).await?;

        let response = rx
            .await
            .map_err(|_| anyhow::anyhow!("MCP server closed before answering '{}'", method))?;
        jsonrpc_result(response)
    }

    async fn send_notification(&self, method: &str, params: Value) -> Result<(), anyhow::Error> {
        self.write_line(&jsonrpc_notification(method, params)).await
    }

    fn server_identifier(&self) -> String {
        format!("stdio:{}:{}", self.command, self.args.join(":"))
    }
}

impl Drop for StdioTransport {
    fn drop(&mut self) {
        if let Some(handle) = self.reader.get_mut().take() {
            handle.abort();
        }
        if let Some(process) = self.process.get_mut().as_mut() {
            // Best-effort kill on drop
            let _ = process.start_kill();
        }
    }
}
