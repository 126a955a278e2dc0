//! Response Synthesizer.
//!
//! Three tiers, tried in order:
//!
//! 1. a successful create/update gets a templated confirmation
//! 2. otherwise an available provider narrates the results
//! 3. otherwise (or when the provider fails) the deterministic formatter
//!
//! Every path yields text. When the backend and the provider both fail the
//! reply says which one failed and why.

use serde_json::{json, Value};

use crate::chat::formatter::{format_confirmation, format_result, format_results, is_mutation};
use crate::chat::vocabulary::Entity;
use crate::llms::adapter::{GenerateRequest, ProviderAdapter};
use crate::tools::{ToolCallResult, ToolDescriptor};
use crate::types::conversation::{recent_turns, ConversationTurn, SynthesisPath};
use crate::utilities::errors::{AssistantError, ProviderError};

/// Default number of history turns given to the provider.
pub const DEFAULT_HISTORY_WINDOW: usize = 10;

pub const UNAVAILABLE_MESSAGE: &str = "Data operations are currently unavailable: the hospital \
backend cannot be reached. I can't look up or change records until it reconnects.";

/// The reply text and how it was produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Synthesis {
    pub message: String,
    pub path: SynthesisPath,
    /// Provider failure that forced a degraded path, if any.
    pub provider_error: Option<ProviderError>,
}

impl Synthesis {
    fn new(message: impl Into<String>, path: SynthesisPath) -> Self {
        Self {
            message: message.into(),
            path,
            provider_error: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResponseSynthesizer {
    history_window: usize,
}

impl Default for ResponseSynthesizer {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_WINDOW)
    }
}

impl ResponseSynthesizer {
    pub fn new(history_window: usize) -> Self {
        Self { history_window }
    }

    pub fn history_window(&self) -> usize {
        self.history_window
    }

    /// Reply for a turn that dispatched `results`.
    pub async fn synthesize(
        &self,
        results: &[ToolCallResult],
        text: &str,
        history: &[ConversationTurn],
        provider: Option<&dyn ProviderAdapter>,
        catalog: &[ToolDescriptor],
    ) -> Synthesis {
        if results
            .iter()
            .any(|r| r.success && is_mutation(r.operation()))
        {
            return Synthesis::new(Self::confirmation(results), SynthesisPath::Confirmation);
        }

        let provider_error = match provider {
            Some(provider) => {
                let request = GenerateRequest::new(text)
                    .with_grounding(grounding_data(results))
                    .with_history(recent_turns(history, self.history_window).to_vec())
                    .with_operations(catalog.to_vec());
                match provider.generate_response(request).await {
                    Ok(reply) => return Synthesis::new(reply.message, SynthesisPath::Narrative),
                    Err(e) => {
                        log::warn!(
                            "Narrative generation failed ({}), falling back to formatter: {}",
                            provider.provider_id(),
                            e
                        );
                        Some(e)
                    }
                }
            }
            None => None,
        };

        let mut message = if results.iter().all(|r| !r.success) {
            format!(
                "The hospital backend could not complete the request.\n\n{}",
                format_results(results)
            )
        } else {
            format_results(results)
        };
        if let Some(e) = &provider_error {
            message.push_str(&provider_note(e));
        }

        Synthesis {
            message,
            path: SynthesisPath::Fallback,
            provider_error,
        }
    }

    /// Confirmation for successful mutations, with sibling results rendered
    /// deterministically beneath.
    fn confirmation(results: &[ToolCallResult]) -> String {
        results
            .iter()
            .map(|r| {
                if r.success && is_mutation(r.operation()) {
                    format_confirmation(r)
                } else {
                    format_result(r)
                }
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Reply for a message that needs no backend data.
    pub async fn converse(
        &self,
        text: &str,
        history: &[ConversationTurn],
        provider: Option<&dyn ProviderAdapter>,
        catalog: &[ToolDescriptor],
    ) -> Synthesis {
        let Some(provider) = provider else {
            return Synthesis::new(help_text(catalog), SynthesisPath::Conversational);
        };

        let request = GenerateRequest::new(text)
            .with_history(recent_turns(history, self.history_window).to_vec())
            .with_operations(catalog.to_vec());
        match provider.generate_response(request).await {
            Ok(reply) => Synthesis::new(reply.message, SynthesisPath::Conversational),
            Err(e) => {
                log::warn!("Conversational reply failed ({}): {}", provider.provider_id(), e);
                let mut message = help_text(catalog);
                message.push_str(&provider_note(&e));
                Synthesis {
                    message,
                    path: SynthesisPath::Conversational,
                    provider_error: Some(e),
                }
            }
        }
    }

    /// Reply for a turn whose invocations were rejected before dispatch.
    pub fn rejected(rejections: &[AssistantError]) -> Synthesis {
        let mut lines = vec!["I couldn't run that request yet:".to_string()];
        for rejection in rejections {
            lines.push(format!("- {}", rejection));
        }
        if rejections
            .iter()
            .any(|r| matches!(r, AssistantError::MissingRequiredField { .. }))
        {
            lines.push(String::new());
            lines.push("Please include the missing details in your message and try again.".to_string());
        }
        Synthesis::new(lines.join("\n"), SynthesisPath::Rejected)
    }

    /// Reply when the backend is unreachable.
    pub fn unavailable() -> Synthesis {
        Synthesis::new(UNAVAILABLE_MESSAGE, SynthesisPath::Unavailable)
    }
}

/// Results in the shape handed to the provider as grounding data.
pub fn grounding_data(results: &[ToolCallResult]) -> Value {
    Value::Array(
        results
            .iter()
            .map(|r| {
                json!({
                    "operation": r.operation(),
                    "arguments": r.invocation.arguments,
                    "success": r.success,
                    "data": r.data,
                    "error": r.error,
                })
            })
            .collect(),
    )
}

fn provider_note(error: &ProviderError) -> String {
    format!(
        "\n\n_The AI assistant is unavailable ({}), so this reply was built from the raw data._",
        error.kind()
    )
}

/// Deterministic reply describing what the assistant can do.
pub fn help_text(catalog: &[ToolDescriptor]) -> String {
    let mut topics: Vec<&str> = Vec::new();
    for tool in catalog {
        if let Some(entity) = Entity::from_operation(&tool.name) {
            if !topics.contains(&entity.plural()) {
                topics.push(entity.plural());
            }
        }
    }

    let mut text = String::from("I'm the hospital management assistant.");
    if topics.is_empty() {
        text.push_str(" Ask me about patients, beds, staff or departments.");
    } else {
        text.push_str(&format!(" I can look up and manage {}.", topics.join(", ")));
    }
    text.push_str(
        " Try \"Show me all beds\" or \"Create a patient named John Smith born 1985-03-15\".",
    );
    text
}
