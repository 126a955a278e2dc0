//! Hospital assistant HTTP server binary.
//!
//! Connects to the hospital backend's MCP server, loads its tool catalog,
//! starts the health monitor and serves the chat API.
//!
//! Configuration is read from the environment; see `hms_assistant::config`.
//! `RUST_LOG` sets the tracing filter (default: `info,hms_assistant=debug`).
//!
//! # Usage
//!
//! ```bash
//! MCP_SERVER_URL=http://localhost:3001/mcp cargo run --bin server
//! ```

use std::sync::Arc;
use std::time::Duration;

use hms_assistant::catalog::ToolCatalog;
use hms_assistant::chat::ChatEngine;
use hms_assistant::config::AppConfig;
use hms_assistant::llms::ProviderRegistry;
use hms_assistant::mcp::{HealthMonitor, ToolExecutor};
use hms_assistant::server::{app_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,hms_assistant=debug".into()),
        )
        .init();

    let config = AppConfig::from_env()?;
    tracing::debug!(?config, "configuration loaded");

    let client = Arc::new(config.mcp_server.build_client(config.tool_timeout_secs));
    if let Err(e) = client.connect().await {
        tracing::warn!(
            server = %config.mcp_server.server_identifier(),
            "MCP server not reachable at startup: {}",
            e
        );
    }
    let executor: Arc<dyn ToolExecutor> = client;

    let catalog = Arc::new(ToolCatalog::new(executor).with_filter(config.tool_filter.clone()));
    match catalog.refresh().await {
        Ok(tools) => tracing::info!(tools = tools.len(), "tool catalog loaded"),
        Err(e) => tracing::warn!("tool catalog unavailable: {}", e),
    }

    let providers = match config.provider.clone() {
        Some(provider) => {
            let id = provider.provider_id;
            let registry = ProviderRegistry::with_config(provider)?;
            tracing::info!(provider = %id, "LLM provider configured");
            registry
        }
        None => {
            tracing::info!("no LLM provider configured; replies use deterministic formatting");
            ProviderRegistry::new()
        }
    };

    let engine = Arc::new(
        ChatEngine::new(Arc::clone(&catalog), Arc::new(providers))
            .with_tool_timeout(Duration::from_secs(config.tool_timeout_secs))
            .with_history_window(config.history_window)
            .with_vocabulary(config.vocabulary.clone()),
    );

    let monitor = Arc::new(HealthMonitor::new(
        catalog,
        Duration::from_secs(config.health_check_interval_secs),
    ));
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let health_task = Arc::clone(&monitor).spawn(shutdown_rx);

    let state = AppState::new(engine, monitor).with_session_idle_secs(config.session_idle_secs);
    let app = app_router(state);

    let bind_addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("hms-assistant listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down");
        })
        .await?;

    let _ = shutdown_tx.send(true);
    let _ = health_task.await;
    Ok(())
}
