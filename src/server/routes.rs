//! Axum route handlers for the assistant HTTP server.
//!
//! # Routes
//!
//! - `GET    /health`                - liveness plus backend status
//! - `GET    /status`                - backend, catalog and provider state
//! - `GET    /tools`                 - current tool catalog
//! - `POST   /chat`                  - run one chat turn
//! - `GET    /sessions/:id/history`  - a session's turns
//! - `POST   /provider`              - switch the active LLM provider
//! - `DELETE /provider`              - clear the active LLM provider

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::catalog::ToolCatalog;
use crate::chat::handler::{chat_handler, history_handler};
use crate::chat::session::{ChatEngine, ChatSession};
use crate::llms::provider_config::{ProviderConfig, ProviderId};
use crate::llms::registry::ProviderRegistry;
use crate::mcp::health::{BackendStatus, HealthMonitor};
use crate::utilities::errors::ProviderError;

/// Sessions idle this long are dropped when a new session is created.
pub const DEFAULT_SESSION_IDLE_SECS: u64 = 30 * 60;

/// Shared application state for the HTTP server.
#[derive(Clone)]
pub struct AppState {
    /// The turn pipeline shared by every session.
    pub engine: Arc<ChatEngine>,
    /// Live sessions by id.
    pub sessions: Arc<DashMap<String, Arc<ChatSession>>>,
    /// Backend health, published by the background monitor.
    pub monitor: Arc<HealthMonitor>,
    pub started_at: DateTime<Utc>,
    session_idle: chrono::Duration,
}

impl AppState {
    pub fn new(engine: Arc<ChatEngine>, monitor: Arc<HealthMonitor>) -> Self {
        Self {
            engine,
            sessions: Arc::new(DashMap::new()),
            monitor,
            started_at: Utc::now(),
            session_idle: idle_duration(DEFAULT_SESSION_IDLE_SECS),
        }
    }

    /// Builder: how long a session may sit idle before it is dropped.
    pub fn with_session_idle_secs(mut self, secs: u64) -> Self {
        self.session_idle = idle_duration(secs);
        self
    }

    /// Drop sessions idle past the limit; returns how many were removed.
    pub fn evict_idle_sessions(&self) -> usize {
        let now = Utc::now();
        let before = self.sessions.len();
        self.sessions
            .retain(|_, session| !session.is_idle(now, self.session_idle));
        let evicted = before.saturating_sub(self.sessions.len());
        if evicted > 0 {
            tracing::debug!(evicted, remaining = self.sessions.len(), "evicted idle sessions");
        }
        evicted
    }

    pub fn catalog(&self) -> &Arc<ToolCatalog> {
        self.engine.catalog()
    }

    pub fn providers(&self) -> &Arc<ProviderRegistry> {
        self.engine.providers()
    }

    /// The session with `id`, created if absent. `None` starts a new one.
    pub fn session(&self, id: Option<&str>) -> Arc<ChatSession> {
        let id = id
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        if !self.sessions.contains_key(&id) {
            self.evict_idle_sessions();
        }

        self.sessions
            .entry(id.clone())
            .or_insert_with(|| {
                tracing::info!(session = %id, "new chat session");
                Arc::new(ChatSession::new(id.clone(), Arc::clone(&self.engine)))
            })
            .clone()
    }
}

fn idle_duration(secs: u64) -> chrono::Duration {
    chrono::Duration::seconds(i64::try_from(secs).unwrap_or(i64::MAX / 1_000))
}

/// Build the axum router with all routes.
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/tools", get(tools_handler))
        .route("/chat", post(chat_handler))
        .route("/sessions/:id/history", get(history_handler))
        .route("/provider", post(switch_provider_handler).delete(clear_provider_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": crate::VERSION,
        "service": env!("CARGO_PKG_NAME"),
        "backend": state.monitor.status(),
    }))
}

/// GET /status
async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    let catalog = state.catalog();
    let providers = state.providers();
    let provider = providers.current().map(|p| {
        json!({
            "id": p.provider_id(),
            "model": p.model(),
            "usage": p.usage(),
        })
    });
    let backend: BackendStatus = state.monitor.status();

    Json(json!({
        "backend": backend,
        "backendConnected": backend.is_connected(),
        "operationsAvailable": catalog.operations_available(),
        "toolCount": catalog.tool_count(),
        "lastCatalogRefresh": catalog.last_refresh(),
        "provider": provider,
        "sessions": state.sessions.len(),
        "uptimeSecs": (Utc::now() - state.started_at).num_seconds(),
    }))
}

/// GET /tools
async fn tools_handler(State(state): State<AppState>) -> impl IntoResponse {
    let tools = state.catalog().snapshot();
    Json(json!({
        "available": state.catalog().is_available(),
        "tools": tools.as_slice(),
    }))
}

/// Request body for `POST /provider`.
#[derive(Deserialize)]
pub struct ProviderSwitchRequest {
    pub provider: String,
    pub api_key: String,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

/// POST /provider
async fn switch_provider_handler(
    State(state): State<AppState>,
    Json(request): Json<ProviderSwitchRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let Some(provider_id) = ProviderId::from_str_opt(&request.provider) else {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": format!("unknown provider '{}'", request.provider),
                "supported": ProviderId::ALL.iter().map(|p| p.as_str()).collect::<Vec<_>>(),
            })),
        ));
    };

    let config = ProviderConfig::new(provider_id, request.api_key)
        .with_endpoint(request.endpoint)
        .with_model(request.model);
    let model = config.model.clone();

    match state.providers().switch(config) {
        Ok(id) => {
            tracing::info!(provider = %id, model = %model, "LLM provider switched");
            Ok(Json(json!({ "provider": id, "model": model })))
        }
        Err(e @ ProviderError::NotConfigured) => Err((
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": format!("{} (api_key is empty)", e) })),
        )),
        Err(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() })),
        )),
    }
}

/// DELETE /provider
async fn clear_provider_handler(State(state): State<AppState>) -> StatusCode {
    state.providers().clear();
    StatusCode::NO_CONTENT
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
