//! Process-wide active provider.
//!
//! Exactly one provider is active at a time. Switching builds a fresh
//! adapter from the new [`ProviderConfig`] and resets the previous one;
//! the tool catalog is not involved.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::llms::adapter::{LlmAdapter, ProviderAdapter};
use crate::llms::provider_config::{ProviderConfig, ProviderId};
use crate::llms::providers::create_llm;
use crate::types::usage_metrics::UsageMetrics;
use crate::utilities::errors::ProviderError;

#[derive(Default)]
pub struct ProviderRegistry {
    active: RwLock<Option<Arc<dyn ProviderAdapter>>>,
}

impl ProviderRegistry {
    /// Registry with no active provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with `config` already active.
    pub fn with_config(config: ProviderConfig) -> Result<Self, ProviderError> {
        let registry = Self::new();
        registry.switch(config)?;
        Ok(registry)
    }

    /// Replace the active provider with one built from `config`.
    pub fn switch(&self, config: ProviderConfig) -> Result<ProviderId, ProviderError> {
        if !config.has_api_key() {
            return Err(ProviderError::NotConfigured);
        }
        let id = config.provider_id;
        log::info!("Switching LLM provider to {} (model {})", id, config.model);
        self.install(Arc::new(LlmAdapter::new(create_llm(config))));
        Ok(id)
    }

    /// Make `adapter` the active provider, resetting the one it replaces.
    pub fn install(&self, adapter: Arc<dyn ProviderAdapter>) {
        let previous = self.active.write().replace(adapter);
        if let Some(previous) = previous {
            previous.reset();
        }
    }

    /// Remove the active provider.
    pub fn clear(&self) {
        let previous = self.active.write().take();
        if let Some(previous) = previous {
            log::info!("LLM provider {} cleared", previous.provider_id());
            previous.reset();
        }
    }

    /// The active provider, if any.
    pub fn current(&self) -> Option<Arc<dyn ProviderAdapter>> {
        self.active.read().clone()
    }

    pub fn active_id(&self) -> Option<ProviderId> {
        self.active.read().as_ref().map(|a| a.provider_id())
    }

    pub fn usage(&self) -> Option<UsageMetrics> {
        self.active.read().as_ref().map(|a| a.usage())
    }
}
