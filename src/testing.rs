//! In-memory fakes shared by unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};

use crate::llms::adapter::{GenerateRequest, GeneratedReply, ProviderAdapter, QueryAnalysis};
use crate::llms::provider_config::ProviderId;
use crate::mcp::executor::ToolExecutor;
use crate::tools::{Arguments, ToolDescriptor, ToolInvocation};
use crate::types::usage_metrics::{TokenUsage, UsageMetrics};
use crate::utilities::errors::ProviderError;

/// A catalog shaped like the hospital backend's.
pub(crate) fn hospital_catalog() -> Vec<ToolDescriptor> {
    let mut tools: Vec<ToolDescriptor> = [
        "list_beds",
        "list_patients",
        "list_staff",
        "list_departments",
        "list_rooms",
        "list_appointments",
        "list_supplies",
        "list_users",
    ]
    .iter()
    .map(|name| ToolDescriptor::new(*name, format!("{} records", name)))
    .collect();

    tools.push(
        ToolDescriptor::new("create_patient", "Register a new patient")
            .with_field("first_name", "string", true)
            .with_field("last_name", "string", true)
            .with_field("date_of_birth", "string", true)
            .with_field("gender", "string", false)
            .with_field("phone", "string", false)
            .with_field("email", "string", false),
    );
    tools.push(
        ToolDescriptor::new("create_bed", "Add a bed")
            .with_field("bed_number", "string", true)
            .with_field("room_id", "integer", false)
            .with_field("status", "string", false),
    );
    tools.push(
        ToolDescriptor::new("create_department", "Create a department")
            .with_field("name", "string", true)
            .with_field("description", "string", false),
    );
    tools.push(
        ToolDescriptor::new("create_staff", "Add a staff member")
            .with_field("first_name", "string", true)
            .with_field("last_name", "string", true)
            .with_field("role", "string", true)
            .with_field("email", "string", false),
    );
    tools.push(
        ToolDescriptor::new("update_bed", "Change a bed")
            .with_field("bed_number", "string", true)
            .with_field("status", "string", false),
    );
    tools.push(
        ToolDescriptor::new("assign_bed", "Assign a bed to a patient")
            .with_field("bed_number", "string", true)
            .with_field("patient_id", "integer", true),
    );
    tools
}

// ---------------------------------------------------------------------------
// FakeExecutor
// ---------------------------------------------------------------------------

/// Scripted backend executor.
///
/// Unscripted operations succeed with an empty list.
pub(crate) struct FakeExecutor {
    tools: Vec<ToolDescriptor>,
    responses: Mutex<HashMap<String, Result<Value, String>>>,
    delays: Mutex<HashMap<String, Duration>>,
    panics: Mutex<HashSet<String>>,
    reachable: AtomicBool,
    calls: Mutex<Vec<ToolInvocation>>,
    list_calls: AtomicUsize,
}

impl FakeExecutor {
    pub(crate) fn new(tools: Vec<ToolDescriptor>) -> Self {
        Self {
            tools,
            responses: Mutex::new(HashMap::new()),
            delays: Mutex::new(HashMap::new()),
            panics: Mutex::new(HashSet::new()),
            reachable: AtomicBool::new(true),
            calls: Mutex::new(Vec::new()),
            list_calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn respond(&self, operation: &str, data: Value) {
        self.responses.lock().insert(operation.to_string(), Ok(data));
    }

    pub(crate) fn fail(&self, operation: &str, error: &str) {
        self.responses
            .lock()
            .insert(operation.to_string(), Err(error.to_string()));
    }

    pub(crate) fn delay(&self, operation: &str, delay: Duration) {
        self.delays.lock().insert(operation.to_string(), delay);
    }

    pub(crate) fn panic_on(&self, operation: &str) {
        self.panics.lock().insert(operation.to_string());
    }

    pub(crate) fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    pub(crate) fn calls(&self) -> Vec<ToolInvocation> {
        self.calls.lock().clone()
    }

    pub(crate) fn list_count(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ToolExecutor for FakeExecutor {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, anyhow::Error> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if !self.reachable.load(Ordering::SeqCst) {
            anyhow::bail!("connection refused");
        }
        Ok(self.tools.clone())
    }

    async fn call_tool(&self, operation: &str, arguments: &Arguments) -> Result<Value, anyhow::Error> {
        self.calls
            .lock()
            .push(ToolInvocation::new(operation, arguments.clone()));
        if !self.reachable.load(Ordering::SeqCst) {
            anyhow::bail!("connection refused");
        }

        let delay = self.delays.lock().get(operation).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.panics.lock().contains(operation) {
            panic!("executor blew up on {}", operation);
        }

        let response = self.responses.lock().get(operation).cloned();
        match response {
            Some(Ok(data)) => Ok(data),
            Some(Err(error)) => Err(anyhow::anyhow!(error)),
            None => Ok(json!([])),
        }
    }

    async fn health_check(&self) -> bool {
        self.reachable.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// FakeProvider
// ---------------------------------------------------------------------------

/// Scripted provider adapter.
pub(crate) struct FakeProvider {
    label: String,
    analysis: Mutex<Result<QueryAnalysis, ProviderError>>,
    reply: Result<String, ProviderError>,
    analyze_calls: AtomicUsize,
    generate_calls: AtomicUsize,
    resets: AtomicUsize,
    last_request: Mutex<Option<GenerateRequest>>,
}

impl FakeProvider {
    /// Answers every generation with `"[label] narrative"`; analysis says no data needed.
    pub(crate) fn working(label: &str) -> Self {
        Self {
            label: label.to_string(),
            analysis: Mutex::new(Ok(QueryAnalysis::default())),
            reply: Ok(format!("[{}] narrative", label)),
            analyze_calls: AtomicUsize::new(0),
            generate_calls: AtomicUsize::new(0),
            resets: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    /// Fails every call with `error`.
    pub(crate) fn failing(error: ProviderError) -> Self {
        let mut provider = Self::working("failing");
        provider.analysis = Mutex::new(Err(error.clone()));
        provider.reply = Err(error);
        provider
    }

    pub(crate) fn with_analysis(self, analysis: QueryAnalysis) -> Self {
        *self.analysis.lock() = Ok(analysis);
        self
    }

    pub(crate) fn analyze_count(&self) -> usize {
        self.analyze_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn generate_count(&self) -> usize {
        self.generate_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn reset_count(&self) -> usize {
        self.resets.load(Ordering::SeqCst)
    }

    pub(crate) fn last_request(&self) -> Option<GenerateRequest> {
        self.last_request.lock().clone()
    }
}

#[async_trait]
impl ProviderAdapter for FakeProvider {
    fn provider_id(&self) -> ProviderId {
        ProviderId::OpenAI
    }

    fn model(&self) -> &str {
        &self.label
    }

    async fn analyze_query(&self, _text: &str, _catalog: &[ToolDescriptor]) -> Result<QueryAnalysis, ProviderError> {
        self.analyze_calls.fetch_add(1, Ordering::SeqCst);
        self.analysis.lock().clone()
    }

    async fn generate_response(&self, request: GenerateRequest) -> Result<GeneratedReply, ProviderError> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock() = Some(request);
        self.reply.clone().map(|message| GeneratedReply {
            message,
            usage: Some(TokenUsage {
                input_tokens: 1,
                output_tokens: 1,
            }),
        })
    }

    fn usage(&self) -> UsageMetrics {
        UsageMetrics::new()
    }

    fn reset(&self) {
        self.resets.fetch_add(1, Ordering::SeqCst);
    }
}
