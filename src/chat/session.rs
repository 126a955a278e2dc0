//! Turn pipeline and conversation sessions.
//!
//! [`ChatEngine`] runs one turn: classify, extract, dispatch, synthesize.
//! [`ChatSession`] owns a conversation's history and is the turn boundary:
//! turns are serialised, and every user turn gets exactly one assistant
//! turn, even when the pipeline panics.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use parking_lot::Mutex;
use serde::Serialize;

use crate::catalog::ToolCatalog;
use crate::chat::dispatcher::{panic_message, ToolDispatcher};
use crate::chat::extractor::extract;
use crate::chat::intent::{IntentClassifier, IntentJudgment};
use crate::chat::synthesizer::{ResponseSynthesizer, Synthesis, UNAVAILABLE_MESSAGE};
use crate::chat::vocabulary::Vocabulary;
use crate::llms::registry::ProviderRegistry;
use crate::tools::ToolCallResult;
use crate::types::conversation::{ConversationTurn, SynthesisPath};
use crate::utilities::errors::AssistantError;

/// Turns kept per session; older ones are dropped.
pub const DEFAULT_MAX_HISTORY: usize = 200;

/// Reply produced when a turn faults.
pub const APOLOGY_MESSAGE: &str =
    "Sorry, something went wrong while handling your message. Please try again.";

/// Everything one turn produced.
#[derive(Debug, Clone)]
pub struct TurnReply {
    pub message: String,
    pub path: SynthesisPath,
    pub results: Option<Vec<ToolCallResult>>,
    pub judgment: Option<IntentJudgment>,
}

impl TurnReply {
    fn from_synthesis(synthesis: Synthesis, judgment: Option<IntentJudgment>) -> Self {
        Self {
            message: synthesis.message,
            path: synthesis.path,
            results: None,
            judgment,
        }
    }
}

/// The shared query-routing pipeline.
pub struct ChatEngine {
    catalog: Arc<ToolCatalog>,
    providers: Arc<ProviderRegistry>,
    classifier: IntentClassifier,
    dispatcher: ToolDispatcher,
    synthesizer: ResponseSynthesizer,
}

impl ChatEngine {
    pub fn new(catalog: Arc<ToolCatalog>, providers: Arc<ProviderRegistry>) -> Self {
        let dispatcher = ToolDispatcher::new(catalog.executor());
        Self {
            catalog,
            providers,
            classifier: IntentClassifier::default(),
            dispatcher,
            synthesizer: ResponseSynthesizer::default(),
        }
    }

    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.dispatcher = self.dispatcher.with_timeout(timeout);
        self
    }

    pub fn with_history_window(mut self, window: usize) -> Self {
        self.synthesizer = ResponseSynthesizer::new(window);
        self
    }

    pub fn with_vocabulary(mut self, vocabulary: Vocabulary) -> Self {
        self.classifier = IntentClassifier::new(vocabulary);
        self
    }

    pub fn catalog(&self) -> &Arc<ToolCatalog> {
        &self.catalog
    }

    pub fn providers(&self) -> &Arc<ProviderRegistry> {
        &self.providers
    }

    /// Run one turn against `history` (the turns before this message).
    pub async fn run_turn(&self, text: &str, history: &[ConversationTurn]) -> TurnReply {
        let catalog = self.catalog.snapshot();
        let provider = self.providers.current();
        let provider = provider.as_deref();

        if !self.catalog.operations_available() {
            let judgment = self.classifier.heuristic(text, &catalog);
            if judgment.requires_tool_call {
                log::info!("Backend unavailable, not dispatching for this turn");
                return TurnReply::from_synthesis(ResponseSynthesizer::unavailable(), Some(judgment));
            }
            let mut synthesis = self.synthesizer.converse(text, history, provider, &[]).await;
            synthesis.message.push_str("\n\n_");
            synthesis.message.push_str(UNAVAILABLE_MESSAGE);
            synthesis.message.push('_');
            return TurnReply::from_synthesis(synthesis, Some(judgment));
        }

        let judgment = self.classifier.classify(text, &catalog, provider).await;
        log::debug!(
            "Judgment: requires_tool_call={} confidence={:?} candidates={:?}",
            judgment.requires_tool_call,
            judgment.confidence,
            judgment.candidate_operations
        );
        if !judgment.requires_tool_call {
            let synthesis = self.synthesizer.converse(text, history, provider, &catalog).await;
            return TurnReply::from_synthesis(synthesis, Some(judgment));
        }

        let outcome = extract(text, &judgment, &catalog);
        if outcome.is_rejected() {
            for rejection in &outcome.rejections {
                log::info!("Rejected before dispatch: {}", rejection);
            }
            return TurnReply::from_synthesis(
                ResponseSynthesizer::rejected(&outcome.rejections),
                Some(judgment),
            );
        }
        if outcome.invocations.is_empty() {
            let synthesis = self.synthesizer.converse(text, history, provider, &catalog).await;
            return TurnReply::from_synthesis(synthesis, Some(judgment));
        }

        let results = self.dispatcher.dispatch(outcome.invocations, &catalog).await;
        let synthesis = self
            .synthesizer
            .synthesize(&results, text, history, provider, &catalog)
            .await;

        TurnReply {
            message: synthesis.message,
            path: synthesis.path,
            results: Some(results),
            judgment: Some(judgment),
        }
    }
}

/// Summary of a session for listings.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
    pub turns: usize,
}

/// One conversation.
pub struct ChatSession {
    id: String,
    engine: Arc<ChatEngine>,
    history: Mutex<Vec<ConversationTurn>>,
    turn_lock: tokio::sync::Mutex<()>,
    max_history: usize,
    created_at: DateTime<Utc>,
    last_active: Mutex<DateTime<Utc>>,
}

impl ChatSession {
    pub fn new(id: impl Into<String>, engine: Arc<ChatEngine>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            engine,
            history: Mutex::new(Vec::new()),
            turn_lock: tokio::sync::Mutex::new(()),
            max_history: DEFAULT_MAX_HISTORY,
            created_at: now,
            last_active: Mutex::new(now),
        }
    }

    pub fn with_max_history(mut self, max_history: usize) -> Self {
        self.max_history = max_history.max(2);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn history(&self) -> Vec<ConversationTurn> {
        self.history.lock().clone()
    }

    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            id: self.id.clone(),
            created_at: self.created_at,
            last_active: self.last_active(),
            turns: self.history.lock().len(),
        }
    }

    pub fn last_active(&self) -> DateTime<Utc> {
        *self.last_active.lock()
    }

    /// Whether a turn is running or waiting to run.
    pub fn is_busy(&self) -> bool {
        self.turn_lock.try_lock().is_err()
    }

    /// Idle for at least `ttl` as of `now`, with no turn running.
    pub fn is_idle(&self, now: DateTime<Utc>, ttl: chrono::Duration) -> bool {
        !self.is_busy() && now - self.last_active() >= ttl
    }

    fn touch(&self) {
        *self.last_active.lock() = Utc::now();
    }

    /// Handle one user message and return the assistant turn.
    pub async fn handle_message(&self, text: &str) -> ConversationTurn {
        self.touch();
        let _turn = self.turn_lock.lock().await;

        let prior = {
            let mut history = self.history.lock();
            let prior = history.clone();
            history.push(ConversationTurn::user(text));
            prior
        };

        let outcome = AssertUnwindSafe(self.engine.run_turn(text, &prior))
            .catch_unwind()
            .await;
        let reply = match outcome {
            Ok(reply) => ConversationTurn::assistant(reply.message, reply.results, reply.path),
            Err(panic) => {
                let err = AssistantError::Internal(panic_message(panic.as_ref()));
                log::error!("Turn in session {} failed: {}", self.id, err);
                ConversationTurn::assistant(APOLOGY_MESSAGE, None, SynthesisPath::Error)
            }
        };

        let mut history = self.history.lock();
        history.push(reply.clone());
        if history.len() > self.max_history {
            let excess = history.len() - self.max_history;
            history.drain(..excess);
        }
        drop(history);
        self.touch();
        reply
    }
}
