//! Tool Catalog: the cached list of backend operations.
//!
//! The catalog is fetched at connection time and again when the health
//! monitor sees the backend recover; it is never refreshed per message.
//! Readers take a cheap `Arc` snapshot, so a refresh never disturbs a turn
//! that is already dispatching.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::mcp::executor::ToolExecutor;
use crate::mcp::filters::StaticToolFilter;
use crate::tools::ToolDescriptor;
use crate::utilities::errors::AssistantError;

/// Cached catalog plus the process-wide "operations available" flag.
pub struct ToolCatalog {
    executor: Arc<dyn ToolExecutor>,
    filter: StaticToolFilter,
    tools: RwLock<Arc<Vec<ToolDescriptor>>>,
    available: AtomicBool,
    last_refresh: RwLock<Option<DateTime<Utc>>>,
}

impl ToolCatalog {
    /// Create an empty, unavailable catalog backed by `executor`.
    pub fn new(executor: Arc<dyn ToolExecutor>) -> Self {
        Self {
            executor,
            filter: StaticToolFilter::default(),
            tools: RwLock::new(Arc::new(Vec::new())),
            available: AtomicBool::new(false),
            last_refresh: RwLock::new(None),
        }
    }

    /// Builder: apply an allow/block filter on every refresh.
    pub fn with_filter(mut self, filter: StaticToolFilter) -> Self {
        self.filter = filter;
        self
    }

    /// The executor the catalog was fetched from.
    pub fn executor(&self) -> Arc<dyn ToolExecutor> {
        Arc::clone(&self.executor)
    }

    /// Fetch the tool list from the backend.
    ///
    /// On failure the catalog is emptied and marked unavailable, so callers
    /// fall back to conversational replies.
    pub async fn refresh(&self) -> Result<Arc<Vec<ToolDescriptor>>, AssistantError> {
        match self.executor.list_tools().await {
            Ok(tools) => {
                let mut tools = self.filter.apply(tools);
                // Names are unique; the first definition wins.
                let mut seen = std::collections::HashSet::new();
                tools.retain(|t| seen.insert(t.name.clone()));

                let tools = Arc::new(tools);
                *self.tools.write() = Arc::clone(&tools);
                *self.last_refresh.write() = Some(Utc::now());
                self.available.store(true, Ordering::SeqCst);
                log::info!("Tool catalog refreshed: {} operations", tools.len());
                Ok(tools)
            }
            Err(e) => {
                *self.tools.write() = Arc::new(Vec::new());
                self.available.store(false, Ordering::SeqCst);
                log::warn!("Tool catalog refresh failed: {:#}", e);
                Err(AssistantError::CatalogUnavailable(e.to_string()))
            }
        }
    }

    /// Current catalog contents.
    pub fn snapshot(&self) -> Arc<Vec<ToolDescriptor>> {
        Arc::clone(&self.tools.read())
    }

    /// Whether the backend is considered reachable.
    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    /// Whether any data operation can be attempted at all.
    pub fn operations_available(&self) -> bool {
        self.is_available() && !self.tools.read().is_empty()
    }

    /// Flip the availability flag without touching the cached tools.
    pub fn set_available(&self, available: bool) {
        let previous = self.available.swap(available, Ordering::SeqCst);
        if previous != available {
            log::info!("Backend operations available: {}", available);
        }
    }

    pub fn tool_count(&self) -> usize {
        self.tools.read().len()
    }

    pub fn last_refresh(&self) -> Option<DateTime<Utc>> {
        *self.last_refresh.read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{hospital_catalog, FakeExecutor};

    #[tokio::test]
    async fn test_refresh_populates_and_flags_available() {
        let executor = Arc::new(FakeExecutor::new(hospital_catalog()));
        let catalog = ToolCatalog::new(executor);
        assert!(!catalog.operations_available());

        let tools = catalog.refresh().await.unwrap();
        assert!(!tools.is_empty());
        assert!(catalog.operations_available());
        assert_eq!(catalog.tool_count(), tools.len());
        assert!(catalog.last_refresh().is_some());
    }

    #[tokio::test]
    async fn test_refresh_failure_empties_catalog() {
        let executor = Arc::new(FakeExecutor::new(hospital_catalog()));
        let catalog = ToolCatalog::new(executor.clone());
        catalog.refresh().await.unwrap();

        executor.set_reachable(false);
        let err = catalog.refresh().await.unwrap_err();
        assert!(matches!(err, AssistantError::CatalogUnavailable(_)));
        assert_eq!(catalog.tool_count(), 0);
        assert!(!catalog.operations_available());
    }

    #[tokio::test]
    async fn test_refresh_applies_filter_and_dedupes() {
        let mut tools = hospital_catalog();
        tools.push(ToolDescriptor::new("list_beds", "duplicate"));
        let executor = Arc::new(FakeExecutor::new(tools));
        let catalog = ToolCatalog::new(executor)
            .with_filter(StaticToolFilter::new(None, Some(vec!["list_staff".into()])));

        let tools = catalog.refresh().await.unwrap();
        assert!(tools.iter().all(|t| t.name != "list_staff"));
        assert_eq!(tools.iter().filter(|t| t.name == "list_beds").count(), 1);
        assert_ne!(tools.iter().find(|t| t.name == "list_beds").unwrap().description, "duplicate");
    }

    #[test]
    fn test_set_available_keeps_stale_tools() {
        let executor = Arc::new(FakeExecutor::new(hospital_catalog()));
        let catalog = ToolCatalog::new(executor);
        tokio_test::assert_ok!(tokio_test::block_on(catalog.refresh()));

        catalog.set_available(false);
        assert!(!catalog.operations_available());
        assert!(catalog.tool_count() > 0);
    }
}
