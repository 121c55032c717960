use std::collections::HashSet;
use std::pin::Pin;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_core::Stream;

use crate::{MessageId, OrderId, OutboxMessage, Result, SagaQuery, SagaRecord, SagaStoreError, Version};

/// A stream of outbox messages.
pub type OutboxStream = Pin<Box<dyn Stream<Item = Result<OutboxMessage>> + Send>>;

/// Core trait for saga store implementations.
///
/// A saga store keeps one live record per order, an archive of finished
/// sagas, and the outbox of messages the sagas produced.
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait SagaStore: Send + Sync {
    /// Loads the live record for an order.
    ///
    /// Returns None if no live saga exists.
    async fn load(&self, order_id: OrderId) -> Result<Option<SagaRecord>>;

    /// Writes a saga record together with the messages it produced.
    ///
    /// The write is atomic: either the record and every outbox message are
    /// stored, or nothing is. Fails with `ConcurrencyConflict` if the live
    /// version is not `expected`; `Version::initial()` means the saga must
    /// not exist yet.
    ///
    /// Returns the new version of the saga.
    async fn save(
        &self,
        record: SagaRecord,
        expected: Version,
        outbox: Vec<OutboxMessage>,
    ) -> Result<Version>;

    /// Moves a finished saga from the live set to the archive.
    ///
    /// Same atomicity and concurrency rules as [`SagaStore::save`]. After
    /// archiving, `load` returns None and `load_archived` returns the record.
    async fn archive(
        &self,
        record: SagaRecord,
        expected: Version,
        outbox: Vec<OutboxMessage>,
    ) -> Result<Version>;

    /// Loads an archived record.
    async fn load_archived(&self, order_id: OrderId) -> Result<Option<SagaRecord>>;

    /// Retrieves live records matching a query, oldest status first.
    async fn query_sagas(&self, query: SagaQuery) -> Result<Vec<SagaRecord>>;

    /// Streams undispatched outbox messages in the order they were written.
    async fn pending_outbox(&self, limit: usize) -> Result<OutboxStream>;

    /// Marks outbox messages as handed to the bus.
    async fn mark_dispatched(&self, message_ids: &[MessageId], at: DateTime<Utc>) -> Result<()>;

    /// Retrieves every outbox message a saga produced, dispatched or not.
    async fn outbox_for(&self, order_id: OrderId) -> Result<Vec<OutboxMessage>>;
}

/// Where a saga record was found.
#[derive(Debug, Clone, PartialEq)]
pub enum SagaLookup {
    /// The saga is still running (or was cancelled and kept for late messages).
    Live(SagaRecord),
    /// The saga finished and was archived.
    Archived(SagaRecord),
}

impl SagaLookup {
    /// Returns the record regardless of where it was found.
    pub fn into_record(self) -> SagaRecord {
        match self {
            Self::Live(record) | Self::Archived(record) => record,
        }
    }
}

/// Extension trait providing convenience methods for saga stores.
#[async_trait]
pub trait SagaStoreExt: SagaStore {
    /// Checks if a live saga exists for the order.
    async fn saga_exists(&self, order_id: OrderId) -> Result<bool> {
        Ok(self.load(order_id).await?.is_some())
    }

    /// Loads a live record, falling back to the archive.
    async fn lookup(&self, order_id: OrderId) -> Result<Option<SagaLookup>> {
        if let Some(record) = self.load(order_id).await? {
            return Ok(Some(SagaLookup::Live(record)));
        }
        Ok(self.load_archived(order_id).await?.map(SagaLookup::Archived))
    }

    /// Loads a live record, failing with `NotFound` if there is none.
    async fn load_required(&self, order_id: OrderId) -> Result<SagaRecord> {
        self.load(order_id)
            .await?
            .ok_or(SagaStoreError::NotFound(order_id))
    }
}

// Blanket implementation for all SagaStore implementations
impl<T: SagaStore + ?Sized> SagaStoreExt for T {}

/// Error returned when an outbox batch cannot be written with a record.
#[derive(Debug, Clone)]
pub struct OutboxValidationError {
    pub message: String,
}

impl std::fmt::Display for OutboxValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Outbox validation error: {}", self.message)
    }
}

impl std::error::Error for OutboxValidationError {}

impl From<OutboxValidationError> for SagaStoreError {
    fn from(err: OutboxValidationError) -> Self {
        SagaStoreError::InvalidOutbox(err.message)
    }
}

/// Validates an outbox batch before it is written with `record`.
pub fn validate_outbox(
    record: &SagaRecord,
    outbox: &[OutboxMessage],
) -> std::result::Result<(), OutboxValidationError> {
    let mut seen = HashSet::with_capacity(outbox.len());
    for message in outbox {
        if message.correlation_id != record.order_id {
            return Err(OutboxValidationError {
                message: format!(
                    "Message {} is correlated to {}, not to saga {}",
                    message.message_id, message.correlation_id, record.order_id
                ),
            });
        }
        if !seen.insert(message.message_id) {
            return Err(OutboxValidationError {
                message: format!("Duplicate message id {} in batch", message.message_id),
            });
        }
        if message.dispatched_at.is_some() {
            return Err(OutboxValidationError {
                message: format!("Message {} is already dispatched", message.message_id),
            });
        }
    }
    Ok(())
}
