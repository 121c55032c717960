use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{MessageId, OrderId};

/// A message produced by a saga, waiting to be published.
///
/// Outbox messages are written in the same transaction as the saga state
/// that produced them and are published afterwards by a dispatcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxMessage {
    /// Unique identifier of the outgoing message.
    pub message_id: MessageId,

    /// The type of the message (e.g., "OrderPlaced").
    pub message_type: String,

    /// The saga that produced the message.
    pub correlation_id: OrderId,

    /// When the message was produced.
    pub created_at: DateTime<Utc>,

    /// The message body as JSON.
    pub payload: serde_json::Value,

    /// Additional metadata, such as the id of the message that caused it.
    pub metadata: HashMap<String, serde_json::Value>,

    /// When the message was handed to the bus. `None` while pending.
    pub dispatched_at: Option<DateTime<Utc>>,
}

impl OutboxMessage {
    /// Creates a new outbox message builder.
    pub fn builder() -> OutboxMessageBuilder {
        OutboxMessageBuilder::default()
    }

    /// Returns true if the message has not been published yet.
    pub fn is_pending(&self) -> bool {
        self.dispatched_at.is_none()
    }
}

/// Builder for constructing outbox messages.
#[derive(Debug, Default)]
pub struct OutboxMessageBuilder {
    message_id: Option<MessageId>,
    message_type: Option<String>,
    correlation_id: Option<OrderId>,
    created_at: Option<DateTime<Utc>>,
    payload: Option<serde_json::Value>,
    metadata: HashMap<String, serde_json::Value>,
}

impl OutboxMessageBuilder {
    /// Sets the message ID. If not set, a new ID will be generated.
    pub fn message_id(mut self, id: MessageId) -> Self {
        self.message_id = Some(id);
        self
    }

    /// Sets the message type.
    pub fn message_type(mut self, message_type: impl Into<String>) -> Self {
        self.message_type = Some(message_type.into());
        self
    }

    /// Sets the saga the message belongs to.
    pub fn correlation_id(mut self, id: OrderId) -> Self {
        self.correlation_id = Some(id);
        self
    }

    /// Sets the creation time. If not set, the current time will be used.
    pub fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    /// Sets the payload from a serializable value.
    pub fn payload<T: Serialize>(mut self, payload: &T) -> Result<Self, serde_json::Error> {
        self.payload = Some(serde_json::to_value(payload)?);
        Ok(self)
    }

    /// Sets the payload from a raw JSON value.
    pub fn payload_raw(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Adds a metadata entry.
    pub fn metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Builds the outbox message.
    ///
    /// # Panics
    ///
    /// Panics if message_type, correlation_id or payload are not set.
    pub fn build(self) -> OutboxMessage {
        OutboxMessage {
            message_id: self.message_id.unwrap_or_default(),
            message_type: self.message_type.expect("message_type is required"),
            correlation_id: self.correlation_id.expect("correlation_id is required"),
            created_at: self.created_at.unwrap_or_else(Utc::now),
            payload: self.payload.expect("payload is required"),
            metadata: self.metadata,
            dispatched_at: None,
        }
    }

    /// Tries to build the outbox message, returning None if required fields are missing.
    pub fn try_build(self) -> Option<OutboxMessage> {
        Some(OutboxMessage {
            message_id: self.message_id.unwrap_or_default(),
            message_type: self.message_type?,
            correlation_id: self.correlation_id?,
            created_at: self.created_at.unwrap_or_else(Utc::now),
            payload: self.payload?,
            metadata: self.metadata,
            dispatched_at: None,
        })
    }
}
