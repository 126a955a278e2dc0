//! Model Context Protocol (MCP) integration.
//!
//! The hospital backend exposes its operations as MCP tools. This module
//! provides the client, server configuration, transports (stdio and
//! streamable HTTP), catalog filtering, and the periodic health check.

pub mod client;
pub mod config;
pub mod executor;
pub mod filters;
pub mod health;
pub mod transports;

pub use client::MCPClient;
pub use config::{MCPServerConfig, MCPServerHTTP, MCPServerStdio};
pub use executor::ToolExecutor;
pub use filters::StaticToolFilter;
pub use health::{BackendStatus, HealthMonitor};
pub use transports::{BaseTransport, TransportType};
