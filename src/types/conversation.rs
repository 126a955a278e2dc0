//! Conversation turns.
//!
//! Turn order is significant: the last N turns form the LLM context
//! window for the next reply.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::tools::ToolCallResult;

/// Who authored a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Role name as used in LLM chat messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// How the assistant reply of a turn was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SynthesisPath {
    /// Templated acknowledgment of a successful create/update.
    Confirmation,
    /// LLM narrative grounded on the call results.
    Narrative,
    /// Deterministic formatting of raw results (LLM unavailable).
    Fallback,
    /// Conversational reply, no data operation involved.
    Conversational,
    /// Request rejected before dispatch (missing fields, no operation).
    Rejected,
    /// Data operations unavailable (backend unreachable).
    Unavailable,
    /// Apology produced at the turn boundary after an internal fault.
    Error,
}

/// One message in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    /// Results of the operations dispatched for this turn, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attached_results: Option<Vec<ToolCallResult>>,
    /// Set on assistant turns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synthesis: Option<SynthesisPath>,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            timestamp: Utc::now(),
            attached_results: None,
            synthesis: None,
        }
    }

    pub fn assistant(
        content: impl Into<String>,
        results: Option<Vec<ToolCallResult>>,
        synthesis: SynthesisPath,
    ) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            timestamp: Utc::now(),
            attached_results: results,
            synthesis: Some(synthesis),
        }
    }
}

/// The last `window` turns of `history`, oldest first.
pub fn recent_turns(history: &[ConversationTurn], window: usize) -> &[ConversationTurn] {
    let start = history.len().saturating_sub(window);
    &history[start..]
}
