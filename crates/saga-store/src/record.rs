use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::OrderId;

/// Version of a saga record, used for optimistic concurrency control.
///
/// A saga that has never been written is at version 0. Each successful
/// write moves the record to the next version.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(i64);

impl Version {
    /// Creates a version from a raw value.
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the version of a saga that does not exist yet.
    pub fn initial() -> Self {
        Self(0)
    }

    /// Returns the version written by the first save.
    pub fn first() -> Self {
        Self(1)
    }

    /// Returns the next version.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns the raw version value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Version {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<Version> for i64 {
    fn from(version: Version) -> Self {
        version.0
    }
}

/// The persisted form of a saga.
///
/// The saga body is opaque JSON to the store. `status` and `status_since`
/// are duplicated out of the body so the store can filter on them without
/// understanding the saga type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SagaRecord {
    /// Correlation key of the saga.
    pub order_id: OrderId,

    /// The kind of saga (e.g., "OrderSaga").
    pub saga_type: String,

    /// Version of this record. Assigned by the store on write.
    pub version: Version,

    /// Current lifecycle status name.
    pub status: String,

    /// When the saga entered its current status.
    pub status_since: DateTime<Utc>,

    /// When the record was last written.
    pub updated_at: DateTime<Utc>,

    /// The serialized saga state.
    pub state: serde_json::Value,
}

impl SagaRecord {
    /// Creates a record from a serializable saga state.
    pub fn from_state<T: Serialize>(
        order_id: OrderId,
        saga_type: impl Into<String>,
        status: impl Into<String>,
        status_since: DateTime<Utc>,
        state: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            order_id,
            saga_type: saga_type.into(),
            version: Version::initial(),
            status: status.into(),
            status_since,
            updated_at: Utc::now(),
            state: serde_json::to_value(state)?,
        })
    }

    /// Deserializes the saga state into a concrete type.
    pub fn into_state<T: for<'de> Deserialize<'de>>(self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.state)
    }

    /// Deserializes the saga state without consuming the record.
    pub fn state_as<T: for<'de> Deserialize<'de>>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.state)
    }
}
