//! Intent Classifier.
//!
//! Two strategies composed with OR semantics:
//!
//! - heuristic: the [`Vocabulary`] table plus regex slots, no network
//! - semantic: the active provider's `analyze_query`
//!
//! Either one flagging a data request makes the judgment require a tool
//! call. A semantic failure is logged and the heuristic judgment stands.

use serde::{Deserialize, Serialize};

use crate::chat::slots::extract_slots;
use crate::chat::vocabulary::{Action, Entity, Vocabulary};
use crate::llms::adapter::{ProviderAdapter, QueryAnalysis};
use crate::tools::{find_tool, Arguments, ToolDescriptor};
use crate::utilities::errors::AssistantError;

/// Which strategy produced the judgment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Heuristic,
    Semantic,
}

/// Per-message routing decision. Not persisted beyond the turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentJudgment {
    pub requires_tool_call: bool,
    pub confidence: Confidence,
    /// Catalog operation names, most relevant first.
    pub candidate_operations: Vec<String>,
    /// Slot values; semantic values override heuristic ones.
    pub extracted_entities: Arguments,
    #[serde(default)]
    pub entities: Vec<Entity>,
    #[serde(default)]
    pub action: Option<Action>,
    #[serde(default)]
    pub topic: Option<String>,
}

impl IntentJudgment {
    /// Judgment for a message that needs no backend data.
    pub fn conversational() -> Self {
        Self {
            requires_tool_call: false,
            confidence: Confidence::Heuristic,
            candidate_operations: Vec::new(),
            extracted_entities: Arguments::new(),
            entities: Vec::new(),
            action: None,
            topic: None,
        }
    }

    /// Fold a semantic analysis into this (heuristic) judgment.
    fn merge_semantic(&mut self, analysis: QueryAnalysis, catalog: &[ToolDescriptor]) {
        self.confidence = Confidence::Semantic;
        self.requires_tool_call |= analysis.needs_mcp_data;

        if self.action.is_none() {
            self.action = analysis.action.as_deref().and_then(Action::from_label);
        }
        if analysis.topic.is_some() {
            self.topic = analysis.topic;
        }

        for operation in analysis.operations {
            if find_tool(catalog, &operation).is_some()
                && !self.candidate_operations.contains(&operation)
            {
                if let Some(entity) = Entity::from_operation(&operation) {
                    if !self.entities.contains(&entity) {
                        self.entities.push(entity);
                    }
                }
                self.candidate_operations.push(operation);
            }
        }

        for (slot, value) in analysis.entities {
            if !value.is_null() {
                self.extracted_entities.insert(slot, value);
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct IntentClassifier {
    vocabulary: Vocabulary,
}

impl IntentClassifier {
    pub fn new(vocabulary: Vocabulary) -> Self {
        Self { vocabulary }
    }

    /// Keyword and regex judgment. Deterministic and offline.
    pub fn heuristic(&self, text: &str, catalog: &[ToolDescriptor]) -> IntentJudgment {
        let found = self.vocabulary.matches(text);
        if found.is_empty() {
            return IntentJudgment::conversational();
        }

        // An entity with no verb is a read: "beds?" means "list beds".
        // A read verb ahead of any mutation word governs the message, so
        // "show new patients" or "show patient addresses" stay reads.
        let actions = match found.actions.first() {
            None | Some(Action::List) => vec![Action::List],
            Some(_) => found.actions.clone(),
        };

        let mut candidates = Vec::new();
        for action in &actions {
            for entity in &found.entities {
                let resolved = action
                    .operation_names(*entity)
                    .into_iter()
                    .find(|name| find_tool(catalog, name).is_some());
                if let Some(name) = resolved {
                    if !candidates.contains(&name) {
                        candidates.push(name);
                    }
                }
            }
        }

        IntentJudgment {
            requires_tool_call: true,
            confidence: Confidence::Heuristic,
            candidate_operations: candidates,
            extracted_entities: extract_slots(text),
            entities: found.entities,
            action: actions.first().copied(),
            topic: None,
        }
    }

    /// Full classification. Never fails.
    pub async fn classify(
        &self,
        text: &str,
        catalog: &[ToolDescriptor],
        provider: Option<&dyn ProviderAdapter>,
    ) -> IntentJudgment {
        let mut judgment = self.heuristic(text, catalog);

        let Some(provider) = provider else {
            return judgment;
        };

        match provider.analyze_query(text, catalog).await {
            Ok(analysis) => judgment.merge_semantic(analysis, catalog),
            Err(e) => {
                let err = AssistantError::ClassificationFailed(e.to_string());
                log::warn!(
                    "{} ({}); using heuristic judgment (requires_tool_call={})",
                    err,
                    provider.provider_id(),
                    judgment.requires_tool_call
                );
            }
        }
        judgment
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::vocabulary::DEFAULT_VOCABULARY;
    use crate::testing::{hospital_catalog, FakeProvider};
    use crate::utilities::errors::ProviderError;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_heuristic_list_beds() {
        let judgment = IntentClassifier::default().heuristic("Show me all beds", &hospital_catalog());
        assert!(judgment.requires_tool_call);
        assert_eq!(judgment.confidence, Confidence::Heuristic);
        assert_eq!(judgment.candidate_operations, vec!["list_beds"]);
        assert_eq!(judgment.action, Some(Action::List));
        assert!(judgment.extracted_entities.is_empty());
    }

    #[test]
    fn test_heuristic_no_keywords() {
        let judgment = IntentClassifier::default().heuristic("Hello there, how are you?", &hospital_catalog());
        assert!(!judgment.requires_tool_call);
        assert!(judgment.candidate_operations.is_empty());
    }

    #[test]
    fn test_heuristic_requires_call_even_without_matching_operation() {
        let judgment = IntentClassifier::default().heuristic("book an appointment", &[]);
        assert!(judgment.requires_tool_call);
        assert!(judgment.candidate_operations.is_empty());
    }

    #[test]
    fn test_heuristic_create_with_slots() {
        let judgment = IntentClassifier::default().heuristic(
            "Create a patient named John Smith born 1985-03-15",
            &hospital_catalog(),
        );
        assert_eq!(judgment.candidate_operations, vec!["create_patient"]);
        assert_eq!(judgment.action, Some(Action::Create));
        assert_eq!(judgment.extracted_entities["date_of_birth"], json!("1985-03-15"));
    }

    #[test]
    fn test_heuristic_includes_every_plausible_operation() {
        let judgment =
            IntentClassifier::default().heuristic("list patients and beds", &hospital_catalog());
        assert_eq!(judgment.candidate_operations, vec!["list_patients", "list_beds"]);
    }

    #[test]
    fn test_leading_read_verb_outranks_later_mutation_words() {
        let classifier = IntentClassifier::default();
        for text in [
            "Show me new patients",
            "show patient addresses",
            "list patients registered today",
        ] {
            let judgment = classifier.heuristic(text, &hospital_catalog());
            assert_eq!(judgment.candidate_operations, vec!["list_patients"], "{}", text);
            assert_eq!(judgment.action, Some(Action::List), "{}", text);
        }

        let judgment = classifier.heuristic("Add a bed and list beds", &hospital_catalog());
        assert_eq!(judgment.action, Some(Action::Create));
        assert!(judgment.candidate_operations.contains(&"list_beds".to_string()));
    }

    #[tokio::test]
    async fn test_semantic_failure_degrades_to_heuristic() {
        let provider = FakeProvider::failing(ProviderError::QuotaExceeded("429".into()));
        let judgment = IntentClassifier::default()
            .classify("Show me all beds", &hospital_catalog(), Some(&provider))
            .await;
        assert!(judgment.requires_tool_call);
        assert_eq!(judgment.confidence, Confidence::Heuristic);
        assert_eq!(provider.analyze_count(), 1);
    }

    #[tokio::test]
    async fn test_semantic_or_heuristic() {
        // Semantic says no, heuristic says yes.
        let provider = FakeProvider::working("p");
        let judgment = IntentClassifier::default()
            .classify("Show me all beds", &hospital_catalog(), Some(&provider))
            .await;
        assert!(judgment.requires_tool_call);
        assert_eq!(judgment.confidence, Confidence::Semantic);

        // Semantic says yes, heuristic sees no keyword.
        let mut entities = serde_json::Map::new();
        entities.insert("status".into(), json!("occupied"));
        let provider = FakeProvider::working("p").with_analysis(QueryAnalysis {
            needs_mcp_data: true,
            topic: Some("occupancy".into()),
            action: Some("list".into()),
            operations: vec!["list_beds".into(), "drop_tables".into()],
            entities,
            ..Default::default()
        });
        let judgment = IntentClassifier::default()
            .classify("how full are we tonight?", &hospital_catalog(), Some(&provider))
            .await;
        assert!(judgment.requires_tool_call);
        assert_eq!(judgment.candidate_operations, vec!["list_beds"]);
        assert_eq!(judgment.entities, vec![Entity::Bed]);
        assert_eq!(judgment.action, Some(Action::List));
        assert_eq!(judgment.topic.as_deref(), Some("occupancy"));
        assert_eq!(judgment.extracted_entities["status"], json!("occupied"));
    }

    #[tokio::test]
    async fn test_semantic_entities_override_heuristic_slots() {
        let mut entities = serde_json::Map::new();
        entities.insert("last_name".into(), json!("Smith-Jones"));
        let provider = FakeProvider::working("p").with_analysis(QueryAnalysis {
            needs_mcp_data: true,
            operations: vec!["create_patient".into()],
            entities,
            ..Default::default()
        });
        let judgment = IntentClassifier::default()
            .classify(
                "Create a patient named John Smith born 1985-03-15",
                &hospital_catalog(),
                Some(&provider),
            )
            .await;
        assert_eq!(judgment.candidate_operations, vec!["create_patient"]);
        assert_eq!(judgment.extracted_entities["last_name"], json!("Smith-Jones"));
        assert_eq!(judgment.extracted_entities["first_name"], json!("John"));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_any_keyword_requires_tool_call_without_provider(
            index in 0..DEFAULT_VOCABULARY.len(),
            prefix in "[a-zA-Z0-9 ,.?!]{0,24}",
            suffix in "[a-zA-Z0-9 ,.?!]{0,24}",
            shout in any::<bool>(),
        ) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .build()
                .unwrap();

            let (keyword, _) = DEFAULT_VOCABULARY[index];
            let keyword = if shout { keyword.to_uppercase() } else { keyword.to_string() };
            let text = format!("{}{}{}", prefix, keyword, suffix);
            let provider = FakeProvider::failing(ProviderError::Network("connection refused".into()));

            let judgment = runtime.block_on(
                IntentClassifier::default().classify(&text, &hospital_catalog(), Some(&provider)),
            );
            prop_assert!(judgment.requires_tool_call, "{:?}", text);
            prop_assert_eq!(judgment.confidence, Confidence::Heuristic);
        }
    }
}
