use thiserror::Error;

use crate::{OrderId, Version};

/// Errors that can occur when reading or writing saga state.
#[derive(Debug, Error)]
pub enum SagaStoreError {
    /// The stored version did not match the version the writer read.
    /// The caller should reload the saga and decide again.
    #[error(
        "Concurrency conflict for saga {order_id}: expected version {expected}, found {actual}"
    )]
    ConcurrencyConflict {
        order_id: OrderId,
        expected: Version,
        actual: Version,
    },

    /// No live saga exists for the order.
    #[error("Saga not found: {0}")]
    NotFound(OrderId),

    /// The outbox batch does not belong to the saga being written.
    #[error("Invalid outbox batch: {0}")]
    InvalidOutbox(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SagaStoreError {
    /// Returns true if the write lost an optimistic concurrency race.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict { .. })
    }
}

/// Result type for saga store operations.
pub type Result<T> = std::result::Result<T, SagaStoreError>;
