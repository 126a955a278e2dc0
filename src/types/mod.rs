//! Shared data types.

pub mod conversation;
pub mod usage_metrics;

pub use conversation::{recent_turns, ConversationTurn, Role, SynthesisPath};
pub use usage_metrics::{TokenUsage, UsageMetrics};
