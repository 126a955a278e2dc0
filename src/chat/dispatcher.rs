//! Tool Dispatcher.
//!
//! Runs one turn's invocations concurrently and joins on all of them. Each
//! invocation is isolated: a failure, timeout or panic in one becomes that
//! invocation's failed result and never affects its siblings. Results come
//! back in invocation order. Nothing is retried: backend writes are not
//! idempotent.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use futures::FutureExt;

use crate::mcp::executor::ToolExecutor;
use crate::tools::{find_tool, ToolCallResult, ToolDescriptor, ToolInvocation};
use crate::utilities::errors::AssistantError;

/// Default per-invocation execution timeout.
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);

pub struct ToolDispatcher {
    executor: Arc<dyn ToolExecutor>,
    timeout: Duration,
}

impl ToolDispatcher {
    pub fn new(executor: Arc<dyn ToolExecutor>) -> Self {
        Self {
            executor,
            timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Execute `invocations`; the result list matches them in length and order.
    ///
    /// Operations absent from `catalog` fail without reaching the executor.
    pub async fn dispatch(
        &self,
        invocations: Vec<ToolInvocation>,
        catalog: &[ToolDescriptor],
    ) -> Vec<ToolCallResult> {
        let calls = invocations
            .into_iter()
            .map(|invocation| self.dispatch_one(invocation, catalog));
        join_all(calls).await
    }

    async fn dispatch_one(&self, invocation: ToolInvocation, catalog: &[ToolDescriptor]) -> ToolCallResult {
        if find_tool(catalog, &invocation.operation).is_none() {
            let err = AssistantError::UnknownOperation(invocation.operation.clone());
            log::error!("Refusing to dispatch: {}", err);
            return ToolCallResult::failed(invocation, err.to_string(), 0);
        }

        let started = Instant::now();
        let call = AssertUnwindSafe(
            self.executor
                .call_tool(&invocation.operation, &invocation.arguments),
        )
        .catch_unwind();
        let outcome = tokio::time::timeout(self.timeout, call).await;
        let latency_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(Ok(Ok(data))) => {
                log::debug!("{} succeeded in {}ms", invocation.operation, latency_ms);
                ToolCallResult::succeeded(invocation, data, latency_ms)
            }
            Ok(Ok(Err(e))) => {
                let err = AssistantError::ToolExecutionFailed {
                    operation: invocation.operation.clone(),
                    message: e.to_string(),
                };
                log::warn!("{}", err);
                ToolCallResult::failed(invocation, e.to_string(), latency_ms)
            }
            Ok(Err(panic)) => {
                let message = panic_message(panic.as_ref());
                log::error!("{} panicked: {}", invocation.operation, message);
                ToolCallResult::failed(invocation, format!("internal error: {}", message), latency_ms)
            }
            Err(_) => {
                log::warn!(
                    "{} timed out after {}s",
                    invocation.operation,
                    self.timeout.as_secs_f32()
                );
                ToolCallResult::timed_out(invocation, latency_ms)
            }
        }
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{hospital_catalog, FakeExecutor};
    use crate::tools::TIMEOUT_ERROR;
    use proptest::prelude::*;
    use serde_json::json;

    fn dispatcher(executor: Arc<FakeExecutor>) -> ToolDispatcher {
        ToolDispatcher::new(executor).with_timeout(Duration::from_millis(100))
    }

    #[tokio::test]
    async fn test_dispatch_returns_data() {
        let executor = Arc::new(FakeExecutor::new(hospital_catalog()));
        executor.respond("list_beds", json!({"beds": [{"bed_number": "A-1", "status": "available"}]}));

        let results = dispatcher(executor.clone())
            .dispatch(vec![ToolInvocation::without_arguments("list_beds")], &hospital_catalog())
            .await;

        assert_eq!(results.len(), 1);
        assert!(results[0].success);
        assert_eq!(results[0].data.as_ref().unwrap()["beds"][0]["bed_number"], json!("A-1"));
        assert_eq!(executor.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_failures_are_isolated() {
        let executor = Arc::new(FakeExecutor::new(hospital_catalog()));
        executor.fail("list_patients", "database locked");
        executor.panic_on("list_staff");
        executor.respond("list_beds", json!([]));

        let invocations = vec![
            ToolInvocation::without_arguments("list_patients"),
            ToolInvocation::without_arguments("list_staff"),
            ToolInvocation::without_arguments("list_beds"),
        ];
        let results = dispatcher(executor).dispatch(invocations, &hospital_catalog()).await;

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].error.as_deref(), Some("database locked"));
        assert!(results[1].error.as_deref().unwrap().contains("executor blew up"));
        assert!(results[2].success);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_marks_result() {
        let executor = Arc::new(FakeExecutor::new(hospital_catalog()));
        executor.delay("list_rooms", Duration::from_secs(5));

        let results = dispatcher(executor)
            .dispatch(
                vec![
                    ToolInvocation::without_arguments("list_rooms"),
                    ToolInvocation::without_arguments("list_beds"),
                ],
                &hospital_catalog(),
            )
            .await;

        assert!(results[0].is_timeout());
        assert_eq!(results[0].error.as_deref(), Some(TIMEOUT_ERROR));
        assert!(results[1].success);
    }

    #[tokio::test]
    async fn test_unknown_operation_never_reaches_executor() {
        let executor = Arc::new(FakeExecutor::new(hospital_catalog()));
        let results = dispatcher(executor.clone())
            .dispatch(vec![ToolInvocation::without_arguments("drop_tables")], &hospital_catalog())
            .await;
        assert!(!results[0].success);
        assert!(executor.calls().is_empty());
    }

    #[tokio::test]
    async fn test_repeated_list_is_structurally_identical() {
        let executor = Arc::new(FakeExecutor::new(hospital_catalog()));
        executor.respond("list_beds", json!({"beds": [{"bed_number": "A-1", "status": "occupied"}]}));
        let dispatcher = dispatcher(executor);

        let first = dispatcher
            .dispatch(vec![ToolInvocation::without_arguments("list_beds")], &hospital_catalog())
            .await;
        let second = dispatcher
            .dispatch(vec![ToolInvocation::without_arguments("list_beds")], &hospital_catalog())
            .await;
        assert_eq!(first[0].data, second[0].data);
    }

    #[derive(Debug, Clone)]
    enum Behaviour {
        Succeed,
        Fail,
        Hang,
        Unknown,
    }

    fn behaviour() -> impl Strategy<Value = Behaviour> {
        prop_oneof![
            Just(Behaviour::Succeed),
            Just(Behaviour::Fail),
            Just(Behaviour::Hang),
            Just(Behaviour::Unknown),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_results_match_invocations(behaviours in proptest::collection::vec(behaviour(), 0..8)) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .start_paused(true)
                .build()
                .unwrap();

            let mut catalog = Vec::new();
            let executor = Arc::new(FakeExecutor::new(Vec::new()));
            let mut invocations = Vec::new();
            for (i, b) in behaviours.iter().enumerate() {
                let name = format!("op_{}", i);
                match b {
                    Behaviour::Succeed => executor.respond(&name, json!({"i": i})),
                    Behaviour::Fail => executor.fail(&name, "boom"),
                    Behaviour::Hang => executor.delay(&name, Duration::from_secs(60)),
                    Behaviour::Unknown => {}
                }
                if !matches!(b, Behaviour::Unknown) {
                    catalog.push(ToolDescriptor::new(name.clone(), ""));
                }
                invocations.push(ToolInvocation::without_arguments(name));
            }

            let expected: Vec<String> = invocations.iter().map(|i| i.operation.clone()).collect();
            let results = runtime.block_on(dispatcher(executor).dispatch(invocations, &catalog));

            prop_assert_eq!(results.len(), expected.len());
            for ((result, name), b) in results.iter().zip(&expected).zip(&behaviours) {
                prop_assert_eq!(result.operation(), name.as_str());
                match b {
                    Behaviour::Succeed => {
                        prop_assert!(result.success);
                    }
                    Behaviour::Hang => {
                        prop_assert!(result.is_timeout());
                    }
                    Behaviour::Fail | Behaviour::Unknown => {
                        prop_assert!(!result.success);
                        prop_assert!(!result.is_timeout());
                    }
                }
            }
        }
    }
}
