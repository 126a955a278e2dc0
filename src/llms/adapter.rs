//! Provider Adapter: the uniform "classify" and "generate reply" contract
//! the routing core consumes, independent of vendor.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::llms::base_llm::{BaseLLM, BaseLLMState};
use crate::llms::prompts;
use crate::llms::provider_config::ProviderId;
use crate::tools::ToolDescriptor;
use crate::types::conversation::ConversationTurn;
use crate::types::usage_metrics::{TokenUsage, UsageMetrics};
use crate::utilities::errors::ProviderError;

/// Semantic judgment about one message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryAnalysis {
    #[serde(rename = "needsMCPData", default)]
    pub needs_mcp_data: bool,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
    /// `list`, `create`, `update`, `assign` or `none`.
    #[serde(default)]
    pub action: Option<String>,
    /// Operation names the model thinks apply.
    #[serde(default)]
    pub operations: Vec<String>,
    /// Slot values the model extracted.
    #[serde(default)]
    pub entities: Map<String, Value>,
}

/// Input to reply generation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grounding_data: Option<Value>,
    #[serde(default)]
    pub history: Vec<ConversationTurn>,
    #[serde(default)]
    pub available_operations: Vec<ToolDescriptor>,
}

impl GenerateRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn with_grounding(mut self, data: Value) -> Self {
        self.grounding_data = Some(data);
        self
    }

    pub fn with_history(mut self, history: Vec<ConversationTurn>) -> Self {
        self.history = history;
        self
    }

    pub fn with_operations(mut self, operations: Vec<ToolDescriptor>) -> Self {
        self.available_operations = operations;
        self
    }
}

/// Output of reply generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedReply {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
}

/// Uniform interface over a specific LLM vendor.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn provider_id(&self) -> ProviderId;

    fn model(&self) -> &str;

    /// Decide whether `text` needs backend data, and what it is about.
    async fn analyze_query(&self, text: &str, catalog: &[ToolDescriptor]) -> Result<QueryAnalysis, ProviderError>;

    /// Produce a natural-language reply.
    async fn generate_response(&self, request: GenerateRequest) -> Result<GeneratedReply, ProviderError>;

    /// Token usage since construction or the last reset.
    fn usage(&self) -> UsageMetrics;

    /// Drop provider-side state. Called when the provider is switched out.
    fn reset(&self);
}

/// [`ProviderAdapter`] over any [`BaseLLM`].
#[derive(Debug)]
pub struct LlmAdapter {
    llm: Box<dyn BaseLLM>,
}

impl LlmAdapter {
    pub fn new(llm: Box<dyn BaseLLM>) -> Self {
        Self { llm }
    }

    /// Turn raw model output into a [`QueryAnalysis`].
    ///
    /// Operations the catalog does not contain are dropped and confidence
    /// is clamped to `[0, 1]`.
    pub fn parse_analysis(raw: &str, catalog: &[ToolDescriptor]) -> Result<QueryAnalysis, ProviderError> {
        let value = BaseLLMState::validate_structured_output(raw)?;
        let mut analysis: QueryAnalysis = serde_json::from_value(value)
            .map_err(|e| ProviderError::InvalidResponse(format!("analysis shape: {}", e)))?;

        analysis
            .operations
            .retain(|op| catalog.iter().any(|t| &t.name == op));
        analysis.confidence = analysis.confidence.map(|c| c.clamp(0.0, 1.0));
        analysis.entities.retain(|_, v| !v.is_null());
        Ok(analysis)
    }
}

#[async_trait]
impl ProviderAdapter for LlmAdapter {
    fn provider_id(&self) -> ProviderId {
        self.llm.provider()
    }

    fn model(&self) -> &str {
        self.llm.model()
    }

    async fn analyze_query(&self, text: &str, catalog: &[ToolDescriptor]) -> Result<QueryAnalysis, ProviderError> {
        let messages = prompts::analysis_messages(text, catalog);
        let completion = self.llm.complete(&messages, true).await?;
        Self::parse_analysis(&completion.text, catalog)
    }

    async fn generate_response(&self, request: GenerateRequest) -> Result<GeneratedReply, ProviderError> {
        let messages = prompts::generation_messages(
            &request.text,
            request.grounding_data.as_ref(),
            &request.history,
            &request.available_operations,
        );
        let completion = self.llm.complete(&messages, false).await?;

        let message = completion.text.trim().to_string();
        if message.is_empty() {
            return Err(ProviderError::InvalidResponse("empty reply".to_string()));
        }
        Ok(GeneratedReply {
            message,
            usage: Some(completion.usage),
        })
    }

    fn usage(&self) -> UsageMetrics {
        self.llm.get_token_usage_summary()
    }

    fn reset(&self) {
        self.llm.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llms::base_llm::{Completion, LLMMessage};
    use parking_lot::Mutex;

    /// BaseLLM that replays canned completions and records its inputs.
    #[derive(Debug)]
    struct CannedLLM {
        replies: Mutex<Vec<Result<String, ProviderError>>>,
        seen: Mutex<Vec<(Vec<LLMMessage>, bool)>>,
        usage: Mutex<UsageMetrics>,
    }

    impl CannedLLM {
        fn new(replies: Vec<Result<String, ProviderError>>) -> Self {
            Self {
                replies: Mutex::new(replies),
                seen: Mutex::new(Vec::new()),
                usage: Mutex::new(UsageMetrics::new()),
            }
        }
    }

    #[async_trait]
    impl BaseLLM for CannedLLM {
        fn provider(&self) -> ProviderId {
            ProviderId::OpenAI
        }
        fn model(&self) -> &str {
            "canned"
        }
        async fn complete(&self, messages: &[LLMMessage], json_mode: bool) -> Result<Completion, ProviderError> {
            self.seen.lock().push((messages.to_vec(), json_mode));
            let text = self.replies.lock().remove(0)?;
            let usage = TokenUsage {
                input_tokens: 10,
                output_tokens: 2,
            };
            self.usage.lock().add_usage_metrics(&usage.into());
            Ok(Completion { text, usage })
        }
        fn get_token_usage_summary(&self) -> UsageMetrics {
            *self.usage.lock()
        }
        fn reset(&self) {
            *self.usage.lock() = UsageMetrics::new();
        }
    }

    fn catalog() -> Vec<ToolDescriptor> {
        vec![
            ToolDescriptor::new("list_beds", "List beds"),
            ToolDescriptor::new("create_patient", "Create a patient"),
        ]
    }

    #[tokio::test]
    async fn test_analyze_query_parses_and_filters() {
        let llm = CannedLLM::new(vec![Ok(r#"{"needsMCPData": true, "topic": "beds", "confidence": 1.7,
            "action": "list", "operations": ["list_beds", "drop_database"], "entities": {"status": null}}"#
            .to_string())]);
        let adapter = LlmAdapter::new(Box::new(llm));

        let analysis = adapter.analyze_query("Show me all beds", &catalog()).await.unwrap();
        assert!(analysis.needs_mcp_data);
        assert_eq!(analysis.operations, vec!["list_beds"]);
        assert_eq!(analysis.confidence, Some(1.0));
        assert!(analysis.entities.is_empty());
        assert_eq!(adapter.usage().successful_requests, 1);
    }

    #[tokio::test]
    async fn test_analyze_query_propagates_provider_errors() {
        let llm = CannedLLM::new(vec![Err(ProviderError::QuotaExceeded("429".into()))]);
        let adapter = LlmAdapter::new(Box::new(llm));
        let err = adapter.analyze_query("hi", &catalog()).await.unwrap_err();
        assert!(err.is_quota());
    }

    #[test]
    fn test_parse_analysis_rejects_garbage() {
        assert!(LlmAdapter::parse_analysis("I think you want beds", &catalog()).is_err());
        let minimal = LlmAdapter::parse_analysis(r#"{"needsMCPData": false}"#, &catalog()).unwrap();
        assert!(!minimal.needs_mcp_data);
        assert!(minimal.operations.is_empty());
    }

    #[tokio::test]
    async fn test_generate_response_and_reset() {
        let llm = CannedLLM::new(vec![Ok("  There are two beds.  ".to_string()), Ok("   ".to_string())]);
        let adapter = LlmAdapter::new(Box::new(llm));

        let reply = adapter
            .generate_response(GenerateRequest::new("Show me all beds").with_grounding(serde_json::json!({"beds": []})))
            .await
            .unwrap();
        assert_eq!(reply.message, "There are two beds.");
        assert_eq!(reply.usage.unwrap().output_tokens, 2);

        assert!(adapter.generate_response(GenerateRequest::new("again")).await.is_err());

        adapter.reset();
        assert_eq!(adapter.usage(), UsageMetrics::new());
    }
}
