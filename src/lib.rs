//! # hms-assistant
//!
//! Natural-language assistant for a hospital-management system.
//!
//! A chat message is classified for data intent, turned into invocations of
//! the operations the hospital backend publishes over MCP, dispatched
//! concurrently, and answered with a confirmation, an LLM-written narrative,
//! or a deterministic summary of the results.
//!
//! - [`mcp`] - backend client, transports and health monitoring
//! - [`catalog`] - the live set of backend operations
//! - [`chat`] - the per-turn pipeline and sessions
//! - [`llms`] - interchangeable LLM providers
//! - [`server`] - the HTTP API

pub mod catalog;
pub mod chat;
pub mod config;
pub mod llms;
pub mod mcp;
pub mod server;
pub mod tools;
pub mod types;
pub mod utilities;

#[cfg(test)]
pub(crate) mod testing;

pub use catalog::ToolCatalog;
pub use chat::{ChatEngine, ChatSession};
pub use config::AppConfig;
pub use utilities::errors::AssistantError;

/// Crate version reported by `/health`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
