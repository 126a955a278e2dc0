//! HTTP handlers for the chat endpoints.
//!
//! - `POST /chat` runs one turn in a session, creating the session when
//!   no `session_id` is given or the id is unknown
//! - `GET /sessions/:id/history` returns a session's turns

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::server::AppState;
use crate::tools::ToolCallResult;
use crate::types::conversation::{ConversationTurn, SynthesisPath};

/// Upper bound on a single chat message, in characters.
pub const MAX_MESSAGE_CHARS: usize = 8_000;

/// Request body for `POST /chat`.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Response body for `POST /chat`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub session_id: String,
    pub reply: String,
    pub synthesis: Option<SynthesisPath>,
    #[serde(default)]
    pub results: Vec<ToolCallResult>,
    pub timestamp: DateTime<Utc>,
}

fn bad_request(message: impl Into<String>) -> (StatusCode, Json<Value>) {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({ "error": message.into() })),
    )
}

/// POST /chat
pub async fn chat_handler(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, (StatusCode, Json<Value>)> {
    let message = request.message.trim();
    if message.is_empty() {
        return Err(bad_request("message must not be empty"));
    }
    if message.chars().count() > MAX_MESSAGE_CHARS {
        return Err(bad_request(format!(
            "message exceeds {} characters",
            MAX_MESSAGE_CHARS
        )));
    }

    let session = state.session(request.session_id.as_deref());
    tracing::debug!(session = session.id(), "chat turn");

    let turn = session.handle_message(message).await;
    Ok(Json(ChatResponse {
        session_id: session.id().to_string(),
        reply: turn.content,
        synthesis: turn.synthesis,
        results: turn.attached_results.unwrap_or_default(),
        timestamp: turn.timestamp,
    }))
}

/// GET /sessions/:id/history
pub async fn history_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<ConversationTurn>>, (StatusCode, Json<Value>)> {
    match state.sessions.get(&id) {
        Some(session) => Ok(Json(session.history())),
        None => Err((
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": format!("unknown session '{}'", id) })),
        )),
    }
}
