//! Domain vocabulary for the heuristic classifier.
//!
//! A flat `keyword → term` table. Matching is a case-insensitive substring
//! test, so the table deliberately over-triggers ("new", "user" alone are
//! enough): a spurious read shows "no data", a missed one drops a request.

use serde::{Deserialize, Serialize};

/// A record family the backend manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Entity {
    Patient,
    Bed,
    Staff,
    Appointment,
    Equipment,
    Supply,
    Department,
    Room,
    User,
}

impl Entity {
    pub const ALL: [Entity; 9] = [
        Entity::Patient,
        Entity::Bed,
        Entity::Staff,
        Entity::Appointment,
        Entity::Equipment,
        Entity::Supply,
        Entity::Department,
        Entity::Room,
        Entity::User,
    ];

    /// Singular form used in mutation operation names (`create_patient`).
    pub fn singular(&self) -> &'static str {
        match self {
            Entity::Patient => "patient",
            Entity::Bed => "bed",
            Entity::Staff => "staff",
            Entity::Appointment => "appointment",
            Entity::Equipment => "equipment",
            Entity::Supply => "supply",
            Entity::Department => "department",
            Entity::Room => "room",
            Entity::User => "user",
        }
    }

    /// Plural form used in read operation names (`list_patients`).
    pub fn plural(&self) -> &'static str {
        match self {
            Entity::Patient => "patients",
            Entity::Bed => "beds",
            Entity::Staff => "staff",
            Entity::Appointment => "appointments",
            Entity::Equipment => "equipment",
            Entity::Supply => "supplies",
            Entity::Department => "departments",
            Entity::Room => "rooms",
            Entity::User => "users",
        }
    }

    /// Parse an entity name, singular or plural.
    pub fn from_label(label: &str) -> Option<Entity> {
        let label = label.trim().to_lowercase();
        Entity::ALL
            .into_iter()
            .find(|e| label == e.singular() || label == e.plural())
    }

    /// Recover the entity an operation name is about, e.g. `list_beds` → Bed.
    pub fn from_operation(operation: &str) -> Option<Entity> {
        let subject = operation.split_once('_').map(|(_, rest)| rest)?;
        Entity::ALL
            .into_iter()
            .find(|e| subject == e.singular() || subject == e.plural())
    }
}

/// What the user wants done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    List,
    Create,
    Update,
    Assign,
}

impl Action {
    /// Operation-name prefixes tried, in order, for this action.
    pub fn prefixes(&self) -> &'static [&'static str] {
        match self {
            Action::List => &["list", "get"],
            Action::Create => &["create", "add", "register"],
            Action::Update => &["update"],
            Action::Assign => &["assign"],
        }
    }

    /// Whether operations for this action change backend state.
    pub fn is_mutation(&self) -> bool {
        !matches!(self, Action::List)
    }

    /// Parse the action label the semantic classifier returns.
    pub fn from_label(label: &str) -> Option<Action> {
        match label.trim().to_lowercase().as_str() {
            "list" | "read" | "show" | "get" => Some(Action::List),
            "create" | "add" | "register" => Some(Action::Create),
            "update" | "edit" => Some(Action::Update),
            "assign" => Some(Action::Assign),
            _ => None,
        }
    }

    /// Operation names for `entity` under this action, most conventional first.
    pub fn operation_names(&self, entity: Entity) -> Vec<String> {
        let noun = if *self == Action::List {
            entity.plural()
        } else {
            entity.singular()
        };
        self.prefixes()
            .iter()
            .map(|prefix| format!("{}_{}", prefix, noun))
            .collect()
    }
}

/// A vocabulary entry's meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Term {
    Entity(Entity),
    Action(Action),
}

impl Term {
    /// Parse an action label or an entity name; actions win.
    pub fn from_label(label: &str) -> Option<Term> {
        Action::from_label(label)
            .map(Term::Action)
            .or_else(|| Entity::from_label(label).map(Term::Entity))
    }
}

/// Built-in keyword table.
pub static DEFAULT_VOCABULARY: &[(&str, Term)] = &[
    ("patient", Term::Entity(Entity::Patient)),
    ("bed", Term::Entity(Entity::Bed)),
    ("staff", Term::Entity(Entity::Staff)),
    ("doctor", Term::Entity(Entity::Staff)),
    ("nurse", Term::Entity(Entity::Staff)),
    ("employee", Term::Entity(Entity::Staff)),
    ("appointment", Term::Entity(Entity::Appointment)),
    ("equipment", Term::Entity(Entity::Equipment)),
    ("supply", Term::Entity(Entity::Supply)),
    ("supplies", Term::Entity(Entity::Supply)),
    ("inventory", Term::Entity(Entity::Supply)),
    ("department", Term::Entity(Entity::Department)),
    ("room", Term::Entity(Entity::Room)),
    ("ward", Term::Entity(Entity::Room)),
    ("user", Term::Entity(Entity::User)),
    ("add", Term::Action(Action::Create)),
    ("create", Term::Action(Action::Create)),
    ("register", Term::Action(Action::Create)),
    ("admit", Term::Action(Action::Create)),
    ("new", Term::Action(Action::Create)),
    ("list", Term::Action(Action::List)),
    ("show", Term::Action(Action::List)),
    ("display", Term::Action(Action::List)),
    ("view", Term::Action(Action::List)),
    ("update", Term::Action(Action::Update)),
    ("change", Term::Action(Action::Update)),
    ("modify", Term::Action(Action::Update)),
    ("assign", Term::Action(Action::Assign)),
    ("allocate", Term::Action(Action::Assign)),
];

/// Entities and actions found in one message, in order of first appearance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VocabularyMatch {
    pub entities: Vec<Entity>,
    pub actions: Vec<Action>,
    pub keywords: Vec<String>,
}

impl VocabularyMatch {
    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct Vocabulary {
    entries: Vec<(String, Term)>,
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self {
            entries: DEFAULT_VOCABULARY
                .iter()
                .map(|(keyword, term)| (keyword.to_string(), *term))
                .collect(),
        }
    }
}

impl Vocabulary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or override a keyword.
    pub fn with_entry(mut self, keyword: &str, term: Term) -> Self {
        let keyword = keyword.to_lowercase();
        self.entries.retain(|(k, _)| *k != keyword);
        self.entries.push((keyword, term));
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Scan `text` against every keyword.
    pub fn matches(&self, text: &str) -> VocabularyMatch {
        let lowered = text.to_lowercase();

        let mut hits: Vec<(usize, &str, Term)> = self
            .entries
            .iter()
            .filter_map(|(keyword, term)| {
                lowered
                    .find(keyword.as_str())
                    .map(|pos| (pos, keyword.as_str(), *term))
            })
            .collect();
        hits.sort_by_key(|(pos, _, _)| *pos);

        let mut found = VocabularyMatch::default();
        for (_, keyword, term) in hits {
            found.keywords.push(keyword.to_string());
            match term {
                Term::Entity(entity) if !found.entities.contains(&entity) => {
                    found.entities.push(entity)
                }
                Term::Action(action) if !found.actions.contains(&action) => {
                    found.actions.push(action)
                }
                _ => {}
            }
        }
        found
    }
}
