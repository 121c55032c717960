//! Persistence for order sagas.
//!
//! A saga is stored as a single versioned JSON record keyed by its order id.
//! Every state change is written together with the messages it produced
//! (the outbox), so a crash can never persist one without the other.

pub mod error;
pub mod memory;
pub mod outbox;
pub mod postgres;
pub mod query;
pub mod record;
pub mod store;

pub use common::{MessageId, OrderId};
pub use error::{Result, SagaStoreError};
pub use memory::InMemorySagaStore;
pub use outbox::{OutboxMessage, OutboxMessageBuilder};
pub use postgres::PostgresSagaStore;
pub use query::SagaQuery;
pub use record::{SagaRecord, Version};
pub use store::{OutboxStream, SagaLookup, SagaStore, SagaStoreExt};
