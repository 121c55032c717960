//! Message bus the outbox is drained into.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use saga_store::OutboxMessage;

use crate::error::{Result, RuntimeError};

/// Transport that delivers outbox messages to the other services.
///
/// Delivery is at-least-once: a message may be published again if marking
/// it dispatched fails, so consumers must deduplicate on `message_id`.
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Publishes one message.
    async fn publish(&self, message: &OutboxMessage) -> Result<()>;
}

#[async_trait]
impl<B: MessageBus + ?Sized> MessageBus for Arc<B> {
    async fn publish(&self, message: &OutboxMessage) -> Result<()> {
        (**self).publish(message).await
    }
}

#[derive(Debug, Default)]
struct InMemoryBusState {
    published: Vec<OutboxMessage>,
    failing_types: HashSet<String>,
}

/// In-memory bus for testing. Records every publication.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMessageBus {
    state: Arc<Mutex<InMemoryBusState>>,
}

impl InMemoryMessageBus {
    /// Creates a new in-memory bus.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, InMemoryBusState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Makes every publish of the given message type fail until cleared.
    pub fn fail_on(&self, message_type: impl Into<String>) {
        self.state().failing_types.insert(message_type.into());
    }

    /// Clears all configured failures.
    pub fn clear_failures(&self) {
        self.state().failing_types.clear();
    }

    /// Returns every published message, in publication order.
    pub fn published(&self) -> Vec<OutboxMessage> {
        self.state().published.clone()
    }

    /// Returns the types of every published message, in publication order.
    pub fn published_types(&self) -> Vec<String> {
        self.state()
            .published
            .iter()
            .map(|m| m.message_type.clone())
            .collect()
    }

    pub fn published_count(&self) -> usize {
        self.state().published.len()
    }
}

#[async_trait]
impl MessageBus for InMemoryMessageBus {
    async fn publish(&self, message: &OutboxMessage) -> Result<()> {
        let mut state = self.state();

        if state.failing_types.contains(&message.message_type) {
            return Err(RuntimeError::Publish {
                message_id: message.message_id,
                reason: format!("bus rejected {}", message.message_type),
            });
        }

        state.published.push(message.clone());
        Ok(())
    }
}

/// Bus that writes each message to the log. Used when no broker is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingMessageBus;

#[async_trait]
impl MessageBus for LoggingMessageBus {
    async fn publish(&self, message: &OutboxMessage) -> Result<()> {
        tracing::info!(
            message_id = %message.message_id,
            message_type = %message.message_type,
            order_id = %message.correlation_id,
            payload = %message.payload,
            "message published"
        );
        Ok(())
    }
}
