//! Periodic scan for sagas stuck in one status.

use std::sync::Arc;
use std::time::Duration;

use order_saga::OrderStatus;
use saga_store::{SagaQuery, SagaStore};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::error::Result;
use crate::runtime::SagaRuntime;

/// Finds live sagas whose status is older than the configured dwell time
/// and has the runtime report each of them once.
pub struct StuckSagaMonitor<S: SagaStore> {
    runtime: Arc<SagaRuntime<S>>,
    scan_interval: Duration,
}

impl<S: SagaStore> StuckSagaMonitor<S> {
    pub fn new(runtime: Arc<SagaRuntime<S>>) -> Self {
        let scan_interval = runtime.config().stuck_scan_interval;
        Self {
            runtime,
            scan_interval,
        }
    }

    /// Runs one scan. Returns the number of sagas newly reported.
    pub async fn scan_once(&self) -> Result<usize> {
        let cutoff = self.runtime.clock().now() - self.runtime.config().stuck_after;
        let query = SagaQuery::stalled_since(cutoff)
            .exclude_status(OrderStatus::Delivered.as_str())
            .exclude_status(OrderStatus::Cancelled.as_str());

        let candidates = self.runtime.store().query_sagas(query).await?;
        let mut reported = 0;

        for record in candidates {
            match self.runtime.check_stuck(record.order_id).await {
                Ok(true) => reported += 1,
                Ok(false) => {}
                Err(err) => {
                    tracing::warn!(order_id = %record.order_id, error = %err, "stuck check failed");
                }
            }
        }

        if reported > 0 {
            tracing::info!(reported, "stuck saga scan finished");
        }
        Ok(reported)
    }

    /// Scans until `shutdown` turns true or its sender is dropped.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.scan_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(interval_secs = self.scan_interval.as_secs(), "stuck saga monitor started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(err) = self.scan_once().await {
                        tracing::error!(error = %err, "stuck saga scan failed");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!("stuck saga monitor stopped");
    }
}
