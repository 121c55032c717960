//! Runtime for the order saga.
//!
//! This crate connects the pure decider to the outside world:
//! - `SagaRuntime` applies inbound deliveries with optimistic concurrency
//! - `OutboxDispatcher` publishes the outbox on a `MessageBus`
//! - `StuckSagaMonitor` reports sagas that stopped making progress
//! - `OrderQueries` serves order status lookups

pub mod bus;
pub mod clock;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod monitor;
pub mod query;
pub mod runtime;

pub use bus::{InMemoryMessageBus, LoggingMessageBus, MessageBus};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::RuntimeConfig;
pub use dispatcher::OutboxDispatcher;
pub use error::{Result, RuntimeError};
pub use monitor::StuckSagaMonitor;
pub use query::{OrderQueries, OrderView};
pub use runtime::{HandleOutcome, SagaRuntime};
