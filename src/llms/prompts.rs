//! Prompt construction for query analysis and reply generation.

use serde_json::Value;

use crate::llms::base_llm::LLMMessage;
use crate::tools::ToolDescriptor;
use crate::types::conversation::{ConversationTurn, Role};
use crate::utilities::string_utils::truncate_chars;

/// Cap on serialized grounding data sent to the model.
pub const MAX_GROUNDING_CHARS: usize = 12_000;

/// System prompt for the semantic classifier.
pub const ANALYSIS_SYSTEM_PROMPT: &str = "\
You route messages for a hospital management assistant. Decide whether the \
user's message needs data from the hospital backend (patients, beds, staff, \
departments, rooms, appointments, equipment, supplies, users).

Answer with one JSON object and nothing else:
{\"needsMCPData\": boolean, \"topic\": string, \"confidence\": number between 0 and 1, \
\"action\": \"list\" | \"create\" | \"update\" | \"assign\" | \"none\", \
\"operations\": [operation names from the list below], \
\"entities\": {field name: value extracted from the message}}

Only name operations that appear in the list. Use the operation's own field \
names as entity keys (e.g. first_name, last_name, date_of_birth). Dates use \
YYYY-MM-DD.";

/// System prompt for grounded reply generation.
pub const GENERATION_SYSTEM_PROMPT: &str = "\
You are the assistant of a hospital management system. Answer the user \
clearly and concisely. When backend data is provided, base your answer only \
on that data: do not invent records, counts or identifiers. If an operation \
failed, say so plainly. Use short lists or tables for multiple records.";

/// Messages for `analyze_query`.
pub fn analysis_messages(text: &str, catalog: &[ToolDescriptor]) -> Vec<LLMMessage> {
    let operations = if catalog.is_empty() {
        "(no operations available)".to_string()
    } else {
        catalog
            .iter()
            .map(describe_operation)
            .collect::<Vec<_>>()
            .join("\n")
    };

    vec![
        LLMMessage::system(format!(
            "{}\n\nAvailable operations:\n{}",
            ANALYSIS_SYSTEM_PROMPT, operations
        )),
        LLMMessage::user(text),
    ]
}

fn describe_operation(tool: &ToolDescriptor) -> String {
    let fields: Vec<String> = tool
        .argument_schema
        .iter()
        .map(|(name, spec)| {
            if spec.required {
                format!("{}*: {}", name, spec.field_type)
            } else {
                format!("{}: {}", name, spec.field_type)
            }
        })
        .collect();

    if fields.is_empty() {
        format!("- {}: {}", tool.name, tool.description)
    } else {
        format!("- {}({}): {}", tool.name, fields.join(", "), tool.description)
    }
}

/// Messages for `generate_response`: system prompt, history, then the
/// current message with any grounding data appended.
pub fn generation_messages(
    text: &str,
    grounding_data: Option<&Value>,
    history: &[ConversationTurn],
    available_operations: &[ToolDescriptor],
) -> Vec<LLMMessage> {
    let mut system = GENERATION_SYSTEM_PROMPT.to_string();
    if !available_operations.is_empty() {
        let names: Vec<&str> = available_operations.iter().map(|t| t.name.as_str()).collect();
        system.push_str("\n\nThe backend supports these operations: ");
        system.push_str(&names.join(", "));
        system.push('.');
    }

    let mut messages = vec![LLMMessage::system(system)];
    for turn in history {
        messages.push(match turn.role {
            Role::User => LLMMessage::user(turn.content.clone()),
            Role::Assistant => LLMMessage::assistant(turn.content.clone()),
        });
    }

    let user = match grounding_data {
        Some(data) => {
            let serialized = serde_json::to_string_pretty(data).unwrap_or_else(|_| data.to_string());
            format!(
                "{}\n\nBackend data:\n```json\n{}\n```",
                text,
                truncate_chars(&serialized, MAX_GROUNDING_CHARS)
            )
        }
        None => text.to_string(),
    };
    messages.push(LLMMessage::user(user));
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_analysis_messages_list_operations() {
        let catalog = vec![
            ToolDescriptor::new("list_beds", "List all beds"),
            ToolDescriptor::new("create_patient", "Register a patient")
                .with_field("first_name", "string", true)
                .with_field("phone", "string", false),
        ];
        let messages = analysis_messages("Show me all beds", &catalog);

        assert_eq!(messages.len(), 2);
        assert!(messages[0].content.contains("- list_beds: List all beds"));
        assert!(messages[0]
            .content
            .contains("- create_patient(first_name*: string, phone: string): Register a patient"));
        assert_eq!(messages[1], LLMMessage::user("Show me all beds"));
    }

    #[test]
    fn test_generation_messages_with_history_and_grounding() {
        let history = vec![
            ConversationTurn::user("hi"),
            ConversationTurn::assistant("Hello!", None, crate::types::SynthesisPath::Conversational),
        ];
        let data = json!({"beds": [{"bed_number": "A-1", "status": "available"}]});
        let messages = generation_messages("Show me all beds", Some(&data), &history, &[]);

        assert_eq!(messages.len(), 4);
        assert_eq!(messages[2].role, "assistant");
        assert!(messages[3].content.contains("Backend data"));
        assert!(messages[3].content.contains("A-1"));
        assert!(!messages[0].content.contains("supports these operations"));
    }
}
