//! Periodic backend health check.
//!
//! The monitor only mutates the catalog's availability flag (and refreshes
//! the catalog on recovery); it never touches in-flight turn state.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::catalog::ToolCatalog;

/// Binary backend status as last observed by the monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendStatus {
    /// No health check has completed yet.
    Unknown,
    Connected,
    Disconnected,
}

impl BackendStatus {
    pub fn is_connected(&self) -> bool {
        matches!(self, BackendStatus::Connected)
    }
}

/// Polls the catalog's executor on a fixed interval.
pub struct HealthMonitor {
    catalog: Arc<ToolCatalog>,
    interval: Duration,
    status_tx: watch::Sender<BackendStatus>,
}

impl HealthMonitor {
    pub fn new(catalog: Arc<ToolCatalog>, interval: Duration) -> Self {
        let (status_tx, _) = watch::channel(BackendStatus::Unknown);
        Self {
            catalog,
            interval,
            status_tx,
        }
    }

    /// Latest observed status.
    pub fn status(&self) -> BackendStatus {
        *self.status_tx.borrow()
    }

    /// Receive every status change.
    pub fn subscribe(&self) -> watch::Receiver<BackendStatus> {
        self.status_tx.subscribe()
    }

    /// Run one health check and apply the resulting transition.
    ///
    /// connected→disconnected marks the catalog unavailable;
    /// disconnected→connected refreshes it.
    pub async fn check_once(&self) -> BackendStatus {
        let previous = self.status();
        let healthy = self.catalog.executor().health_check().await;

        let current = if healthy {
            let recovered = previous == BackendStatus::Disconnected || !self.catalog.is_available();
            if recovered {
                log::info!("Backend reachable, refreshing tool catalog");
                if let Err(e) = self.catalog.refresh().await {
                    log::warn!("Catalog refresh after recovery failed: {}", e);
                }
            }
            // A refresh that failed right after a good check still counts as down.
            if self.catalog.is_available() {
                BackendStatus::Connected
            } else {
                BackendStatus::Disconnected
            }
        } else {
            if previous != BackendStatus::Disconnected {
                log::warn!("Backend health check failed; data operations disabled");
            }
            self.catalog.set_available(false);
            BackendStatus::Disconnected
        };

        self.status_tx.send_replace(current);
        current
    }

    /// Poll until `shutdown` turns true.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.check_once().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        log::debug!("Health monitor stopping");
                        return;
                    }
                }
            }
        }
    }

    /// Spawn [`run`](Self::run) on the runtime.
    pub fn spawn(self: Arc<Self>, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(shutdown).await })
    }
}
