//! Argument Extractor.
//!
//! Turns an [`IntentJudgment`] into concrete [`ToolInvocation`]s checked
//! against the catalog schemas. Invocations missing required fields are
//! rejected here and never reach the dispatcher.

use serde_json::{Number, Value};

use crate::chat::intent::IntentJudgment;
use crate::tools::{find_tool, Arguments, FieldSpec, ToolDescriptor, ToolInvocation};
use crate::utilities::errors::AssistantError;

/// Alternative slot names accepted for a schema field, tried in order.
const FIELD_ALIASES: &[(&str, &[&str])] = &[
    ("first_name", &["given_name", "firstName"]),
    ("last_name", &["surname", "family_name", "lastName"]),
    ("name", &["full_name", "department_name"]),
    ("full_name", &["name"]),
    ("date_of_birth", &["dob", "birth_date", "dateOfBirth", "date"]),
    ("dob", &["date_of_birth"]),
    ("birth_date", &["date_of_birth"]),
    ("phone", &["phone_number", "contact_number"]),
    ("phone_number", &["phone"]),
    ("bed_number", &["bed", "bed_id", "bedNumber"]),
    ("bed_id", &["bed_number"]),
    ("room_number", &["room", "room_id"]),
    ("room_id", &["room_number"]),
    ("patient_id", &["patient", "patientId"]),
    ("appointment_date", &["date"]),
    ("role", &["position", "staff_role"]),
];

/// What the extractor produced for one message.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractionOutcome {
    /// Ready to dispatch.
    pub invocations: Vec<ToolInvocation>,
    /// Rejected before dispatch.
    pub rejections: Vec<AssistantError>,
}

impl ExtractionOutcome {
    pub fn is_rejected(&self) -> bool {
        !self.rejections.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.invocations.is_empty() && self.rejections.is_empty()
    }
}

/// Build invocations for every candidate operation in `judgment`.
pub fn extract(_text: &str, judgment: &IntentJudgment, catalog: &[ToolDescriptor]) -> ExtractionOutcome {
    let mut outcome = ExtractionOutcome::default();
    if !judgment.requires_tool_call {
        return outcome;
    }

    for operation in &judgment.candidate_operations {
        let Some(tool) = find_tool(catalog, operation) else {
            outcome
                .rejections
                .push(AssistantError::UnknownOperation(operation.clone()));
            continue;
        };

        match build_arguments(tool, &judgment.extracted_entities) {
            Ok(arguments) => outcome
                .invocations
                .push(ToolInvocation::new(tool.name.clone(), arguments)),
            Err(missing) => {
                log::debug!("Rejecting {}: missing {:?}", tool.name, missing);
                outcome.rejections.push(AssistantError::MissingRequiredField {
                    operation: tool.name.clone(),
                    fields: missing,
                });
            }
        }
    }
    outcome
}

/// Fill `tool`'s schema from `slots`; `Err` lists the required fields left empty.
pub fn build_arguments(tool: &ToolDescriptor, slots: &Arguments) -> Result<Arguments, Vec<String>> {
    let mut arguments = Arguments::new();
    let mut missing = Vec::new();

    for (field, spec) in &tool.argument_schema {
        match lookup(field, slots).and_then(|value| coerce(value, spec)) {
            Some(value) => {
                arguments.insert(field.clone(), value);
            }
            None if spec.required => missing.push(field.clone()),
            None => {}
        }
    }

    if missing.is_empty() {
        Ok(arguments)
    } else {
        Err(missing)
    }
}

fn lookup<'a>(field: &str, slots: &'a Arguments) -> Option<&'a Value> {
    let present = |key: &str| slots.get(key).filter(|v| !is_blank(v));

    present(field).or_else(|| {
        FIELD_ALIASES
            .iter()
            .find(|(name, _)| *name == field)
            .and_then(|(_, aliases)| aliases.iter().find_map(|alias| present(*alias)))
    })
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// Convert a slot value to the schema's declared type. `None` means the
/// value cannot be represented and the field counts as absent.
fn coerce(value: &Value, spec: &FieldSpec) -> Option<Value> {
    match spec.field_type.as_str() {
        "string" => match value {
            Value::String(s) => Some(Value::String(s.trim().to_string())),
            Value::Number(n) => Some(Value::String(n.to_string())),
            Value::Bool(b) => Some(Value::String(b.to_string())),
            _ => None,
        },
        "integer" => match value {
            Value::Number(n) if n.is_i64() || n.is_u64() => Some(value.clone()),
            Value::Number(n) => n
                .as_f64()
                .filter(|f| f.fract() == 0.0)
                .map(|f| Value::from(f as i64)),
            Value::String(s) => s.trim().parse::<i64>().ok().map(Value::from),
            _ => None,
        },
        "number" => match value {
            Value::Number(_) => Some(value.clone()),
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number),
            _ => None,
        },
        "boolean" => match value {
            Value::Bool(_) => Some(value.clone()),
            Value::String(s) => match s.trim().to_lowercase().as_str() {
                "true" | "yes" | "y" | "1" => Some(Value::Bool(true)),
                "false" | "no" | "n" | "0" => Some(Value::Bool(false)),
                _ => None,
            },
            _ => None,
        },
        "array" => match value {
            Value::Array(_) => Some(value.clone()),
            other => Some(Value::Array(vec![other.clone()])),
        },
        _ => Some(value.clone()),
    }
}
