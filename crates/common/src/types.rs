use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Declares a UUID-backed identifier newtype.
///
/// Each identifier is a distinct type so an order id can never be passed
/// where a customer id is expected, even though both are UUIDs on the wire.
macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wraps an existing UUID.
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the underlying UUID.
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

uuid_id! {
    /// Identifies one order and its orchestration saga.
    ///
    /// This is the correlation key carried by every inbound and outbound
    /// message that concerns the order.
    OrderId
}

uuid_id! {
    /// Identifies the customer who placed an order.
    CustomerId
}

uuid_id! {
    /// Identity of a single message delivery.
    ///
    /// Redelivery of the same message keeps its id, which is what makes
    /// duplicate detection possible.
    MessageId
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_id_new_creates_unique_ids() {
        let id1 = OrderId::new();
        let id2 = OrderId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_from_uuid_preserves_value() {
        let uuid = Uuid::new_v4();
        assert_eq!(CustomerId::from_uuid(uuid).as_uuid(), uuid);
        assert_eq!(Uuid::from(MessageId::from(uuid)), uuid);
    }

    #[test]
    fn test_serializes_as_bare_uuid_string() {
        let uuid = Uuid::new_v4();
        let id = OrderId::from_uuid(uuid);

        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{uuid}\""));

        let back: OrderId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_parses_from_string() {
        let id = MessageId::new();
        let parsed: MessageId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);

        assert!("not-a-uuid".parse::<OrderId>().is_err());
    }
}
