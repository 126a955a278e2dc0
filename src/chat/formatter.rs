//! Deterministic rendering of call results.
//!
//! Used for creation confirmations and whenever no LLM narrative is
//! available. Record arrays are rendered by entity shape, detected from
//! the fields present; anything unrecognised gets a capped key/value list.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::tools::ToolCallResult;
use crate::utilities::string_utils::{display_value, humanize_key, truncate_chars};

/// Fields shown per record in the generic listing.
pub const MAX_FIELDS_PER_RECORD: usize = 4;
/// Records shown per result before summarising the rest.
pub const MAX_RECORDS: usize = 20;

const MUTATION_PREFIXES: &[&str] = &[
    "create_", "add_", "register_", "update_", "edit_", "set_", "assign_", "delete_", "remove_",
];

/// Whether `operation` changes backend state, judged by its name.
pub fn is_mutation(operation: &str) -> bool {
    MUTATION_PREFIXES.iter().any(|p| operation.starts_with(p))
}

/// Known record shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityShape {
    Bed,
    Patient,
    Staff,
    Department,
    Generic,
}

/// Classify a record by its distinguishing fields.
pub fn detect_shape(record: &Map<String, Value>) -> EntityShape {
    let has = |k: &str| record.contains_key(k);

    if has("bed_number") || has("bedNumber") {
        EntityShape::Bed
    } else if has("patient_number")
        || has("patientNumber")
        || has("date_of_birth")
        || (has("mrn") && has("first_name"))
    {
        EntityShape::Patient
    } else if (has("role") && (has("first_name") || has("name")))
        || has("employee_id")
        || has("staff_number")
    {
        EntityShape::Staff
    } else if has("name") && has("description") {
        EntityShape::Department
    } else {
        EntityShape::Generic
    }
}

/// Record list inside a result payload: the payload itself when it is an
/// array, else an array-of-objects field of an object payload. The field
/// named `subject` wins, then the first non-empty one, then any.
pub fn extract_records<'a>(
    data: &'a Value,
    subject: Option<&str>,
) -> Option<(Option<&'a str>, Vec<&'a Map<String, Value>>)> {
    fn objects(items: &[Value]) -> Option<Vec<&Map<String, Value>>> {
        items.iter().map(Value::as_object).collect()
    }

    match data {
        Value::Array(items) => objects(items).map(|records| (None, records)),
        Value::Object(map) => {
            let candidates: Vec<(&str, Vec<&Map<String, Value>>)> = map
                .iter()
                .filter_map(|(key, value)| match value {
                    Value::Array(items) => objects(items).map(|records| (key.as_str(), records)),
                    _ => None,
                })
                .collect();

            let pick = subject
                .and_then(|s| candidates.iter().position(|(key, _)| key.eq_ignore_ascii_case(s)))
                .or_else(|| candidates.iter().position(|(_, records)| !records.is_empty()))
                .or_else(|| (!candidates.is_empty()).then_some(0))?;
            candidates
                .into_iter()
                .nth(pick)
                .map(|(key, records)| (Some(key), records))
        }
        _ => None,
    }
}

/// Collection an operation reads, by name: `list_beds` reads `beds`.
fn operation_subject(operation: &str) -> &str {
    operation
        .split_once('_')
        .map(|(_, rest)| rest)
        .unwrap_or(operation)
}

/// Title for a read result: the collection key, else the operation subject.
fn collection_title(result: &ToolCallResult, key: Option<&str>) -> String {
    humanize_key(key.unwrap_or_else(|| operation_subject(result.operation())))
}

fn text_field<'a>(record: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|k| record.get(*k).and_then(Value::as_str))
        .filter(|s| !s.trim().is_empty())
}

fn any_field(record: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|k| record.get(*k).filter(|v| !v.is_null()))
        .map(display_value)
}

fn person_name(record: &Map<String, Value>) -> Option<String> {
    let first = text_field(record, &["first_name", "firstName"]);
    let last = text_field(record, &["last_name", "lastName"]);
    match (first, last) {
        (Some(f), Some(l)) => Some(format!("{} {}", f, l)),
        (Some(n), None) | (None, Some(n)) => Some(n.to_string()),
        (None, None) => text_field(record, &["name", "full_name"]).map(str::to_string),
    }
}

fn format_beds(records: &[&Map<String, Value>]) -> String {
    let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for record in records {
        let status = text_field(record, &["status"]).unwrap_or("unknown").to_lowercase();
        let label = any_field(record, &["bed_number", "bedNumber", "id"]).unwrap_or_else(|| "?".into());
        groups.entry(status).or_default().push(label);
    }

    let mut lines = vec![format!("**Beds** ({} total)", records.len())];
    for (status, beds) in groups {
        let shown: Vec<&str> = beds.iter().take(MAX_RECORDS).map(String::as_str).collect();
        let more = if beds.len() > shown.len() {
            format!(", …and {} more", beds.len() - shown.len())
        } else {
            String::new()
        };
        lines.push(format!("- {}: {} ({}{})", status, beds.len(), shown.join(", "), more));
    }
    lines.join("\n")
}

fn format_patient(record: &Map<String, Value>) -> String {
    let mut line = person_name(record).unwrap_or_else(|| "Unnamed patient".into());
    if let Some(number) = any_field(record, &["patient_number", "patientNumber", "mrn", "id"]) {
        line.push_str(&format!(" ({})", number));
    }
    if let Some(dob) = text_field(record, &["date_of_birth", "dateOfBirth"]) {
        line.push_str(&format!(", born {}", dob));
    }
    if let Some(gender) = text_field(record, &["gender"]) {
        line.push_str(&format!(", {}", gender));
    }
    line
}

fn format_staff(record: &Map<String, Value>) -> String {
    let mut line = person_name(record).unwrap_or_else(|| "Unnamed staff member".into());
    if let Some(role) = text_field(record, &["role", "position"]) {
        line.push_str(&format!(", {}", role));
    }
    if let Some(dept) = text_field(record, &["department", "department_name"]) {
        line.push_str(&format!(" ({})", dept));
    }
    line
}

fn format_department(record: &Map<String, Value>) -> String {
    let name = text_field(record, &["name"]).unwrap_or("Unnamed department");
    match text_field(record, &["description"]) {
        Some(description) => format!("{}: {}", name, truncate_chars(description, 120)),
        None => name.to_string(),
    }
}

fn format_generic(record: &Map<String, Value>) -> String {
    record
        .iter()
        .filter(|(_, v)| !v.is_null())
        .take(MAX_FIELDS_PER_RECORD)
        .map(|(k, v)| format!("{}: {}", humanize_key(k), truncate_chars(&display_value(v), 80)))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Render a record list under `title`.
pub fn format_records(title: &str, records: &[&Map<String, Value>]) -> String {
    if records.is_empty() {
        return format!("No {} found.", title.to_lowercase());
    }

    let shape = detect_shape(records[0]);
    if shape == EntityShape::Bed {
        return format_beds(records);
    }

    let mut lines = vec![format!("**{}** ({})", title, records.len())];
    for record in records.iter().take(MAX_RECORDS) {
        let line = match detect_shape(record) {
            EntityShape::Patient => format_patient(record),
            EntityShape::Staff => format_staff(record),
            EntityShape::Department => format_department(record),
            EntityShape::Bed | EntityShape::Generic => format_generic(record),
        };
        lines.push(format!("- {}", line));
    }
    if records.len() > MAX_RECORDS {
        lines.push(format!("…and {} more", records.len() - MAX_RECORDS));
    }
    lines.join("\n")
}

/// Deterministic rendering of one result.
pub fn format_result(result: &ToolCallResult) -> String {
    if !result.success {
        return format_failure(result);
    }
    let data = result.data.as_ref().unwrap_or(&Value::Null);

    if let Some((key, records)) = extract_records(data, Some(operation_subject(result.operation()))) {
        return format_records(&collection_title(result, key), &records);
    }

    match data {
        Value::Object(map) if !map.is_empty() => {
            let title = collection_title(result, None);
            let fields: Vec<String> = map
                .iter()
                .filter(|(_, v)| !v.is_null())
                .take(MAX_RECORDS)
                .map(|(k, v)| format!("- {}: {}", humanize_key(k), truncate_chars(&display_value(v), 120)))
                .collect();
            format!("**{}**\n{}", title, fields.join("\n"))
        }
        Value::String(s) if !s.trim().is_empty() => s.trim().to_string(),
        Value::Null | Value::Object(_) | Value::String(_) => {
            format!("{} returned no data.", result.operation())
        }
        other => display_value(other),
    }
}

/// One line describing a failed invocation.
pub fn format_failure(result: &ToolCallResult) -> String {
    if result.is_timeout() {
        format!("{} timed out.", result.operation())
    } else {
        format!(
            "{} failed: {}",
            result.operation(),
            result.error.as_deref().unwrap_or("unknown error")
        )
    }
}

/// Deterministic rendering of a whole result list.
pub fn format_results(results: &[ToolCallResult]) -> String {
    results
        .iter()
        .map(format_result)
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn is_display_key(key: &str) -> bool {
    let lower = key.to_lowercase();
    lower == "id"
        || lower.ends_with("_id")
        || key.ends_with("Id")
        || lower.contains("number")
        || lower.contains("name")
}

/// Every display-key field (id, `*_id`, `*number*`, `*name*`) in a
/// creation payload, top level first, then one level of nesting.
pub fn confirmation_fields(data: &Value) -> Vec<(String, String)> {
    let mut fields = Vec::new();
    let Some(map) = data.as_object() else {
        return fields;
    };

    for (key, value) in map {
        if is_display_key(key) && !value.is_null() && !value.is_object() {
            fields.push((humanize_key(key), display_value(value)));
        }
    }
    for (parent, value) in map {
        if let Some(nested) = value.as_object() {
            for (key, value) in nested {
                if is_display_key(key) && !value.is_null() && !value.is_object() {
                    fields.push((
                        format!("{} {}", humanize_key(parent), humanize_key(key).to_lowercase()),
                        display_value(value),
                    ));
                }
            }
        }
    }
    fields
}

/// Templated acknowledgment of a successful mutation.
pub fn format_confirmation(result: &ToolCallResult) -> String {
    let operation = result.operation();
    let (verb, subject) = match operation.split_once('_') {
        Some(("create" | "add" | "register", rest)) => ("Created", rest),
        Some(("update" | "edit" | "set", rest)) => ("Updated", rest),
        Some(("assign", rest)) => ("Assigned", rest),
        Some(("delete" | "remove", rest)) => ("Removed", rest),
        Some((_, rest)) => ("Completed", rest),
        None => ("Completed", operation),
    };
    let subject = humanize_key(subject).to_lowercase();

    let mut lines = vec![format!("✅ {} {} successfully.", verb, subject)];
    match result.data.as_ref() {
        Some(data @ Value::Object(_)) => {
            for (label, value) in confirmation_fields(data) {
                lines.push(format!("- {}: {}", label, value));
            }
        }
        Some(Value::String(s)) if !s.trim().is_empty() => lines.push(s.trim().to_string()),
        _ => {}
    }
    lines.join("\n")
}
