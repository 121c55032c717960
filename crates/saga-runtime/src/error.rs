//! Runtime error types.

use common::{MessageId, OrderId};
use order_saga::{CheckoutRejection, OrderError};
use saga_store::SagaStoreError;
use thiserror::Error;

/// Errors that can occur while running sagas.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The originating checkout failed validation; nothing was stored.
    #[error("Checkout rejected: {0}")]
    Rejected(CheckoutRejection),

    /// A non-originating message arrived for an order with no saga.
    #[error("No saga exists for order {0}")]
    SagaNotFound(OrderId),

    /// No live or archived saga exists for the order.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// Every attempt lost the optimistic-concurrency race.
    #[error("Gave up on order {order_id} after {attempts} concurrency conflicts")]
    ConflictRetriesExhausted { order_id: OrderId, attempts: u32 },

    /// The bus did not accept an outbox message.
    #[error("Failed to publish message {message_id}: {reason}")]
    Publish {
        message_id: MessageId,
        reason: String,
    },

    /// The decider refused the message for a reason other than validation.
    #[error("Decider error: {0}")]
    Order(OrderError),

    /// Saga store error.
    #[error("Saga store error: {0}")]
    Store(#[from] SagaStoreError),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RuntimeError {
    /// Returns true if the error is a lost optimistic-concurrency race.
    pub fn is_conflict(&self) -> bool {
        matches!(self, RuntimeError::Store(err) if err.is_conflict())
    }
}

impl From<OrderError> for RuntimeError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::Rejected(rejection) => RuntimeError::Rejected(rejection),
            OrderError::NotStarted(order_id) => RuntimeError::SagaNotFound(order_id),
            other => RuntimeError::Order(other),
        }
    }
}

/// Convenience type alias for runtime results.
pub type Result<T> = std::result::Result<T, RuntimeError>;
