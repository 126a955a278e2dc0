//! The backend-executor contract consumed by the routing core.

use async_trait::async_trait;
use serde_json::Value;

use crate::tools::{Arguments, ToolDescriptor};

/// A service that exposes named operations with argument schemas.
///
/// The MCP client is the production implementation; tests plug in
/// in-memory fakes.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// List the available operations.
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, anyhow::Error>;

    /// Execute one operation, returning its structured data.
    ///
    /// A backend-reported failure (`{success:false, error}`) is an `Err`.
    async fn call_tool(&self, operation: &str, arguments: &Arguments) -> Result<Value, anyhow::Error>;

    /// Binary connectivity check.
    async fn health_check(&self) -> bool;
}
