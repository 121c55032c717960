//! Common trait for saga message contracts.

use common::OrderId;
use serde::{Serialize, de::DeserializeOwned};

/// A message exchanged between the order saga and another service.
///
/// Every message names the order it concerns, which is how deliveries
/// are routed to the right saga instance.
pub trait Message: Serialize + DeserializeOwned + Send + Sync + Clone {
    /// Returns the message type name.
    ///
    /// This is used for routing and for the outbox `message_type` column.
    fn message_type(&self) -> &'static str;

    /// Returns the correlation key.
    fn order_id(&self) -> OrderId;
}
