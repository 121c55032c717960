//! Saga runtime: loads a saga, runs the decider, persists the outcome.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use common::{MessageId, OrderId};
use order_saga::{
    Decision, Disposition, InboundEnvelope, Message, OrderSaga, OrderStatus, OutboundMessage,
};
use saga_store::{OutboxMessage, SagaRecord, SagaStore, Version};
use serde::Serialize;

use crate::clock::{Clock, SystemClock};
use crate::config::RuntimeConfig;
use crate::error::{Result, RuntimeError};

/// What handling one delivery did.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum HandleOutcome {
    /// The saga changed and was saved.
    Applied {
        status: OrderStatus,
        version: Version,
        emitted: usize,
    },

    /// The saga reached `Delivered` and was archived.
    Completed,

    /// This delivery was already applied.
    Duplicate,

    /// The message was valid but changed nothing.
    Ignored { reason: &'static str },

    /// The saga already finished; late messages are dropped.
    AlreadyArchived,
}

/// Applies inbound deliveries to order sagas.
///
/// Deliveries for one order are serialized only by the store's optimistic
/// concurrency check: a writer that loses the race reloads and decides
/// again. Different orders never contend.
pub struct SagaRuntime<S: SagaStore> {
    store: S,
    clock: Arc<dyn Clock>,
    config: RuntimeConfig,
}

impl<S: SagaStore> SagaRuntime<S> {
    /// Creates a runtime on the system clock.
    pub fn new(store: S, config: RuntimeConfig) -> Self {
        Self::with_clock(store, Arc::new(SystemClock), config)
    }

    /// Creates a runtime with an injected clock.
    pub fn with_clock(store: S, clock: Arc<dyn Clock>, config: RuntimeConfig) -> Self {
        Self {
            store,
            clock,
            config,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Handles one inbound delivery.
    #[tracing::instrument(
        skip(self, envelope),
        fields(
            order_id = %envelope.order_id(),
            message_type = envelope.message_type(),
            message_id = %envelope.message_id,
        )
    )]
    pub async fn handle(&self, envelope: InboundEnvelope) -> Result<HandleOutcome> {
        metrics::counter!("saga_messages_total", "message_type" => envelope.message_type())
            .increment(1);
        let started = Instant::now();

        let result = self.handle_with_retries(&envelope).await;

        metrics::histogram!("saga_handle_duration_seconds")
            .record(started.elapsed().as_secs_f64());
        result
    }

    async fn handle_with_retries(&self, envelope: &InboundEnvelope) -> Result<HandleOutcome> {
        let mut conflicts = 0;
        loop {
            match self.try_handle(envelope).await {
                Err(err) if err.is_conflict() => {
                    conflicts += 1;
                    metrics::counter!("saga_concurrency_conflicts_total").increment(1);

                    if conflicts > self.config.max_conflict_retries {
                        tracing::warn!(attempts = conflicts, "giving up after repeated conflicts");
                        return Err(RuntimeError::ConflictRetriesExhausted {
                            order_id: envelope.order_id(),
                            attempts: conflicts,
                        });
                    }
                    tracing::debug!(attempt = conflicts, "concurrency conflict, reloading saga");
                    tokio::task::yield_now().await;
                }
                other => return other,
            }
        }
    }

    async fn try_handle(&self, envelope: &InboundEnvelope) -> Result<HandleOutcome> {
        let order_id = envelope.order_id();

        let (current, expected) = match self.store.load(order_id).await? {
            Some(record) => (Some(record.state_as::<OrderSaga>()?), record.version),
            None => {
                if self.store.load_archived(order_id).await?.is_some() {
                    tracing::debug!("saga already archived, dropping message");
                    return Ok(HandleOutcome::AlreadyArchived);
                }
                (None, Version::initial())
            }
        };

        if let Some(saga) = &current
            && saga.has_processed(envelope.message_id)
        {
            metrics::counter!("saga_messages_duplicate_total").increment(1);
            tracing::debug!("duplicate delivery");
            return Ok(HandleOutcome::Duplicate);
        }

        let now = self.clock.now();
        let decision = order_saga::decide(
            current.as_ref(),
            envelope.message_id,
            &envelope.message,
            now,
        )
        .inspect_err(|err| tracing::warn!(error = %err, "message refused"))?;

        let previous = current.as_ref().map(OrderSaga::status);
        self.persist(decision, expected, previous, Some(envelope.message_id), now)
            .await
    }

    /// Reports the saga as stuck if it has sat in one status too long.
    ///
    /// Returns true if a report was written. A concurrent update wins over
    /// the report; the next scan looks again.
    #[tracing::instrument(skip_all, fields(order_id = %order_id))]
    pub async fn check_stuck(&self, order_id: OrderId) -> Result<bool> {
        let Some(record) = self.store.load(order_id).await? else {
            return Ok(false);
        };
        let saga: OrderSaga = record.state_as()?;

        let now = self.clock.now();
        let decision = order_saga::detect_stuck(&saga, self.config.stuck_after, now);
        if !decision.is_change() {
            return Ok(false);
        }

        match self
            .persist(decision, record.version, Some(saga.status()), None, now)
            .await
        {
            Ok(_) => {
                metrics::counter!("saga_stuck_total", "status" => saga.status().as_str())
                    .increment(1);
                tracing::warn!(
                    status = %saga.status(),
                    since = %saga.status_since(),
                    "saga stuck"
                );
                Ok(true)
            }
            Err(err) if err.is_conflict() => {
                tracing::debug!("saga changed during stuck check");
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }

    async fn persist(
        &self,
        decision: Decision,
        expected: Version,
        previous: Option<OrderStatus>,
        causation_id: Option<MessageId>,
        now: DateTime<Utc>,
    ) -> Result<HandleOutcome> {
        let Decision {
            saga,
            messages,
            disposition,
        } = decision;

        if let Disposition::Ignored { reason } = disposition {
            tracing::warn!(reason, status = %saga.status(), "message ignored");
            return Ok(HandleOutcome::Ignored { reason });
        }

        let order_id = saga.id();
        let outbox = messages
            .iter()
            .map(|message| outbox_message(order_id, message, causation_id, now))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let emitted = outbox.len();

        let record = SagaRecord::from_state(
            order_id,
            OrderSaga::SAGA_TYPE,
            saga.status().as_str(),
            saga.status_since(),
            &saga,
        )?;

        if disposition == Disposition::Completed {
            let version = self.store.archive(record, expected, outbox).await?;
            metrics::counter!("saga_completed_total").increment(1);
            tracing::info!(%version, "saga completed and archived");
            return Ok(HandleOutcome::Completed);
        }

        let version = self.store.save(record, expected, outbox).await?;
        let status = saga.status();

        if status == OrderStatus::Cancelled && previous != Some(OrderStatus::Cancelled) {
            metrics::counter!("saga_cancelled_total").increment(1);
            let reason = saga.failure().map(|f| f.reason.as_str()).unwrap_or_default();
            tracing::warn!(reason, "saga cancelled");
        }
        tracing::info!(%status, %version, emitted, "saga updated");

        Ok(HandleOutcome::Applied {
            status,
            version,
            emitted,
        })
    }
}

fn outbox_message(
    order_id: OrderId,
    message: &OutboundMessage,
    causation_id: Option<MessageId>,
    now: DateTime<Utc>,
) -> std::result::Result<OutboxMessage, serde_json::Error> {
    let mut builder = OutboxMessage::builder()
        .message_id(MessageId::new())
        .message_type(message.message_type())
        .correlation_id(order_id)
        .created_at(now)
        .payload(message)?
        .metadata("saga_type", serde_json::json!(OrderSaga::SAGA_TYPE));

    if let Some(causation_id) = causation_id {
        builder = builder.metadata("causation_id", serde_json::json!(causation_id));
    }
    Ok(builder.build())
}
