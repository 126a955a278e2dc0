//! Regex slot extraction from free text.
//!
//! Produces string-valued slots keyed by the field names the hospital
//! backend uses (`first_name`, `date_of_birth`, `bed_number`, ...). Type
//! coercion against a concrete schema happens in the extractor.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::tools::Arguments;

static NAMED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:named|called)\s+([a-z][a-z'\-]*)(?:\s+([a-z][a-z'\-]*))?").unwrap()
});
static FIRST_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bfirst\s*name\s*(?:is|:|=)?\s*([a-z][a-z'\-]*)").unwrap());
static LAST_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:last|family)\s*name\s*(?:is|:|=)?\s*([a-z][a-z'\-]*)").unwrap()
});
static ISO_DATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d{4})-(\d{1,2})-(\d{1,2})\b").unwrap());
static US_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,2})/(\d{1,2})/(\d{4})\b").unwrap());
static BIRTH_CONTEXT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:born|birth|dob|birthday)\b").unwrap());
static GENDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b(male|female|other)\b").unwrap());
static PHONE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:phone|tel|telephone|mobile|contact)(?:\s+number)?\s*(?:is|:|=)?\s*(\+?\d[\d\s\-().]{5,}\d)")
        .unwrap()
});
static EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(?:\.[A-Za-z0-9\-]+)+)\b").unwrap());
static BED_NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bbed\s*(?:number|no\.?|#)?\s*[:#]?\s*([a-z]{0,2}-?\d+[a-z]?)\b").unwrap()
});
static ROOM_NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\broom\s*(?:number|no\.?|#)?\s*[:#]?\s*([a-z]{0,2}-?\d+[a-z]?)\b").unwrap()
});
static PATIENT_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bpatient\s*(?:id|#|number|no\.?)?\s*[:#]?\s*(\d+)\b").unwrap());
static STATUS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(available|occupied|maintenance|reserved|cleaning|discharged|admitted)\b")
        .unwrap()
});
static ROLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(doctor|nurse|surgeon|technician|receptionist|administrator|pharmacist)s?\b")
        .unwrap()
});
static DESCRIPTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\b(?:description|described as)\s*(?:is|:|=)?\s*"?([^"\n]+?)"?\s*$"#).unwrap()
});

/// Words that end a "named X Y" phrase instead of being a surname.
const NAME_STOPWORDS: &[&str] = &[
    "born", "with", "and", "in", "on", "dob", "age", "aged", "who", "as", "to", "for", "from", "at",
    "is", "gender", "phone", "email", "male", "female", "date", "birth", "description",
];

/// Extract every slot recognisable in `text`.
pub fn extract_slots(text: &str) -> Arguments {
    let mut slots = Arguments::new();

    extract_names(text, &mut slots);
    extract_date(text, &mut slots);

    let simple: [(&Lazy<Regex>, &str); 8] = [
        (&GENDER, "gender"),
        (&PHONE, "phone"),
        (&EMAIL, "email"),
        (&BED_NUMBER, "bed_number"),
        (&ROOM_NUMBER, "room_number"),
        (&PATIENT_ID, "patient_id"),
        (&STATUS, "status"),
        (&DESCRIPTION, "description"),
    ];
    for (pattern, slot) in simple {
        if let Some(value) = first_capture(pattern, text) {
            slots.insert(slot.to_string(), Value::String(value));
        }
    }
    if let Some(role) = first_capture(&ROLE, text) {
        slots.insert("role".to_string(), Value::String(role.to_lowercase()));
    }
    for slot in ["gender", "status"] {
        if let Some(Value::String(value)) = slots.get_mut(slot) {
            *value = value.to_lowercase();
        }
    }

    slots
}

fn first_capture(pattern: &Regex, text: &str) -> Option<String> {
    pattern
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn extract_names(text: &str, slots: &mut Arguments) {
    if let Some(caps) = NAMED.captures(text) {
        let first = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        let last = caps
            .get(2)
            .map(|m| m.as_str())
            .filter(|w| !NAME_STOPWORDS.contains(&w.to_lowercase().as_str()));

        if !first.is_empty() && !NAME_STOPWORDS.contains(&first.to_lowercase().as_str()) {
            let first = capitalize(first);
            let full = match last {
                Some(last) => {
                    let last = capitalize(last);
                    slots.insert("last_name".to_string(), Value::String(last.clone()));
                    format!("{} {}", first, last)
                }
                None => first.clone(),
            };
            slots.insert("first_name".to_string(), Value::String(first));
            slots.insert("full_name".to_string(), Value::String(full));
        }
    }

    if let Some(first) = first_capture(&FIRST_NAME, text) {
        slots.insert("first_name".to_string(), Value::String(capitalize(&first)));
    }
    if let Some(last) = first_capture(&LAST_NAME, text) {
        slots.insert("last_name".to_string(), Value::String(capitalize(&last)));
    }
}

fn extract_date(text: &str, slots: &mut Arguments) {
    let date = ISO_DATE
        .captures(text)
        .and_then(|c| normalize_date(&c[1], &c[2], &c[3]))
        .or_else(|| {
            US_DATE
                .captures(text)
                .and_then(|c| normalize_date(&c[3], &c[1], &c[2]))
        });

    if let Some(date) = date {
        let slot = if BIRTH_CONTEXT.is_match(text) {
            "date_of_birth"
        } else {
            "date"
        };
        slots.insert(slot.to_string(), Value::String(date));
    }
}

/// `YYYY-MM-DD`, or `None` when the parts are not a calendar date.
fn normalize_date(year: &str, month: &str, day: &str) -> Option<String> {
    let year: i32 = year.parse().ok()?;
    let month: u32 = month.parse().ok()?;
    let day: u32 = day.parse().ok()?;
    chrono::NaiveDate::from_ymd_opt(year, month, day).map(|d| d.format("%Y-%m-%d").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_patient_sentence() {
        let slots = extract_slots("Create a patient named John Smith born 1985-03-15");
        assert_eq!(slots["first_name"], json!("John"));
        assert_eq!(slots["last_name"], json!("Smith"));
        assert_eq!(slots["full_name"], json!("John Smith"));
        assert_eq!(slots["date_of_birth"], json!("1985-03-15"));
        assert!(!slots.contains_key("date"));
    }

    #[test]
    fn test_named_stops_at_connective() {
        let slots = extract_slots("add a patient named mary born 3/7/1990, female");
        assert_eq!(slots["first_name"], json!("Mary"));
        assert!(!slots.contains_key("last_name"));
        assert_eq!(slots["date_of_birth"], json!("1990-03-07"));
        assert_eq!(slots["gender"], json!("female"));
    }

    #[test]
    fn test_explicit_name_fields_win() {
        let slots = extract_slots("register patient, first name: Ana, last name is Ruiz");
        assert_eq!(slots["first_name"], json!("Ana"));
        assert_eq!(slots["last_name"], json!("Ruiz"));
    }

    #[test]
    fn test_contact_slots() {
        let slots = extract_slots("phone: +1 555-123-4567 and email jo.doe@clinic.org");
        assert_eq!(slots["phone"], json!("+1 555-123-4567"));
        assert_eq!(slots["email"], json!("jo.doe@clinic.org"));
    }

    #[test]
    fn test_bed_room_and_patient_slots() {
        let slots = extract_slots("Assign bed B-12 in room 4 to patient 17");
        assert_eq!(slots["bed_number"], json!("B-12"));
        assert_eq!(slots["room_number"], json!("4"));
        assert_eq!(slots["patient_id"], json!("17"));
    }

    #[test]
    fn test_plain_list_has_no_slots() {
        assert!(extract_slots("Show me all beds").is_empty());
        let slots = extract_slots("Show me all Available beds");
        assert_eq!(slots["status"], json!("available"));
    }

    #[test]
    fn test_invalid_dates_are_ignored() {
        assert!(extract_slots("appointment on 2024-13-40").is_empty());
        assert_eq!(extract_slots("appointment on 2024-05-02")["date"], json!("2024-05-02"));
    }

    #[test]
    fn test_role_and_description() {
        let slots = extract_slots("add staff named Jane Doe as Nurses");
        assert_eq!(slots["role"], json!("nurse"));
        let slots = extract_slots("create department named Cardiology description: Heart care");
        assert_eq!(slots["full_name"], json!("Cardiology"));
        assert_eq!(slots["description"], json!("Heart care"));
    }
}
