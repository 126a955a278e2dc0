//! Query routing and tool-call orchestration.
//!
//! A user message flows through:
//!
//! 1. [`intent`] - does it need backend data, and which operations?
//! 2. [`extractor`] - concrete invocations, validated against the catalog
//! 3. [`dispatcher`] - concurrent, isolated execution with timeouts
//! 4. [`synthesizer`] - confirmation, LLM narrative or deterministic text
//!
//! [`session`] ties them together per conversation and [`handler`] exposes
//! them over HTTP.

pub mod dispatcher;
pub mod extractor;
pub mod formatter;
pub mod handler;
pub mod intent;
pub mod session;
pub mod slots;
pub mod synthesizer;
pub mod vocabulary;

pub use dispatcher::ToolDispatcher;
pub use extractor::{extract, ExtractionOutcome};
pub use intent::{Confidence, IntentClassifier, IntentJudgment};
pub use session::{ChatEngine, ChatSession, TurnReply};
pub use synthesizer::{ResponseSynthesizer, Synthesis};
pub use vocabulary::{Action, Entity, Vocabulary};
