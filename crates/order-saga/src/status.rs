//! Order lifecycle state machine.

use serde::{Deserialize, Serialize};

/// The lifecycle status of an order saga.
///
/// State transitions:
/// ```text
///          ┌──► PendingPayment ──┐
/// Placed ──┤                     ├──► PaymentConfirmed ──► InventoryCommitted ──► Fulfilling ──► Shipped ──► Delivered
///          └──► InventoryReserved┘
///
/// (any non-terminal) ──► PaymentFailed   ──┐
///                                          ├──► Cancelled
/// (any non-terminal) ──► InventoryFailed ──┘
/// ```
///
/// Happy-path statuses are ranked and only ever move forward; a message
/// that would move the saga to a lower rank leaves the status alone.
/// The failure statuses leave the ranking entirely and can only settle
/// into `Cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderStatus {
    /// Checkout completed, inventory and payment requested.
    #[default]
    Placed,

    /// Payment authorized, not yet captured.
    PendingPayment,

    /// At least one reservation confirmed, payment not yet captured.
    InventoryReserved,

    /// Payment captured.
    PaymentConfirmed,

    /// A reservation was hard-allocated.
    InventoryCommitted,

    /// Fulfillment requested.
    Fulfilling,

    /// Shipment left the warehouse.
    Shipped,

    /// Shipment delivered (terminal state).
    Delivered,

    /// Inventory could not be reserved; compensation in progress.
    InventoryFailed,

    /// Payment failed; compensation in progress.
    PaymentFailed,

    /// Compensation finished (terminal state).
    Cancelled,
}

impl OrderStatus {
    /// Position on the happy path, or None for failure statuses.
    pub fn rank(&self) -> Option<u8> {
        match self {
            OrderStatus::Placed => Some(0),
            OrderStatus::PendingPayment | OrderStatus::InventoryReserved => Some(1),
            OrderStatus::PaymentConfirmed => Some(2),
            OrderStatus::InventoryCommitted => Some(3),
            OrderStatus::Fulfilling => Some(4),
            OrderStatus::Shipped => Some(5),
            OrderStatus::Delivered => Some(6),
            OrderStatus::InventoryFailed | OrderStatus::PaymentFailed | OrderStatus::Cancelled => {
                None
            }
        }
    }

    /// Returns true if a happy-path transition to `target` is allowed.
    ///
    /// Statuses of equal rank replace each other, so a saga can move
    /// between `PendingPayment` and `InventoryReserved` as either side
    /// reports first.
    pub fn can_advance_to(&self, target: OrderStatus) -> bool {
        if *self == target || self.is_terminal() {
            return false;
        }
        match (self.rank(), target.rank()) {
            (Some(current), Some(next)) => next >= current,
            _ => false,
        }
    }

    /// Returns true if the saga is compensating a failure.
    pub fn is_failed(&self) -> bool {
        matches!(self, OrderStatus::InventoryFailed | OrderStatus::PaymentFailed)
    }

    /// Returns true if this is a terminal state (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Placed => "Placed",
            OrderStatus::PendingPayment => "PendingPayment",
            OrderStatus::InventoryReserved => "InventoryReserved",
            OrderStatus::PaymentConfirmed => "PaymentConfirmed",
            OrderStatus::InventoryCommitted => "InventoryCommitted",
            OrderStatus::Fulfilling => "Fulfilling",
            OrderStatus::Shipped => "Shipped",
            OrderStatus::Delivered => "Delivered",
            OrderStatus::InventoryFailed => "InventoryFailed",
            OrderStatus::PaymentFailed => "PaymentFailed",
            OrderStatus::Cancelled => "Cancelled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
