//! Outbox dispatcher: drains pending outbox messages onto the bus.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use saga_store::SagaStore;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::bus::MessageBus;
use crate::clock::{Clock, SystemClock};
use crate::config::RuntimeConfig;
use crate::error::Result;

/// Publishes outbox messages in the order they were written.
///
/// Each message is marked dispatched right after the bus accepts it. A
/// failed publish ends the batch; that message and everything after it
/// stay pending for the next poll.
pub struct OutboxDispatcher<S, B> {
    store: S,
    bus: B,
    clock: Arc<dyn Clock>,
    batch_size: usize,
    poll_interval: Duration,
}

impl<S: SagaStore, B: MessageBus> OutboxDispatcher<S, B> {
    pub fn new(store: S, bus: B, config: &RuntimeConfig) -> Self {
        Self::with_clock(store, bus, Arc::new(SystemClock), config)
    }

    pub fn with_clock(store: S, bus: B, clock: Arc<dyn Clock>, config: &RuntimeConfig) -> Self {
        Self {
            store,
            bus,
            clock,
            batch_size: config.outbox_batch_size,
            poll_interval: config.outbox_poll_interval,
        }
    }

    /// Publishes up to one batch of pending messages.
    ///
    /// Returns the number of messages dispatched.
    pub async fn dispatch_pending(&self) -> Result<usize> {
        let mut pending = self.store.pending_outbox(self.batch_size).await?;
        let mut dispatched = 0;

        while let Some(message) = pending.next().await {
            let message = message?;

            if let Err(err) = self.bus.publish(&message).await {
                tracing::warn!(
                    message_id = %message.message_id,
                    message_type = %message.message_type,
                    error = %err,
                    "publish failed, leaving the rest of the batch pending"
                );
                metrics::counter!("outbox_dispatched_total").increment(dispatched as u64);
                return Err(err);
            }

            self.store
                .mark_dispatched(&[message.message_id], self.clock.now())
                .await?;
            dispatched += 1;
        }

        metrics::counter!("outbox_dispatched_total").increment(dispatched as u64);
        if dispatched > 0 {
            tracing::debug!(dispatched, "outbox batch dispatched");
        }
        Ok(dispatched)
    }

    /// Polls the outbox until `shutdown` turns true or its sender is dropped.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(interval_ms = self.poll_interval.as_millis() as u64, "outbox dispatcher started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(err) = self.dispatch_pending().await {
                        tracing::error!(error = %err, "outbox dispatch failed");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!("outbox dispatcher stopped");
    }
}
