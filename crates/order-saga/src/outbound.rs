//! Messages the order saga produces.

use chrono::{DateTime, Utc};
use common::{CustomerId, OrderId};
use serde::{Deserialize, Serialize};

use crate::message::Message;
use crate::saga::OrderSaga;
use crate::status::OrderStatus;
use crate::value_objects::{
    LineItem, Money, PaymentId, PaymentMethodToken, ReservationId, ShippingAddress, ShippingMethod,
};

/// Commands and notifications addressed to the other services.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OutboundMessage {
    /// A new order exists; Inventory reserves stock and Payments charges.
    OrderPlaced(OrderPlacedData),

    /// Inventory should hard-allocate a held reservation.
    ReservationCommitRequested(ReservationCommitRequestedData),

    /// Inventory should return a held reservation to stock.
    ReservationReleaseRequested(ReservationReleaseRequestedData),

    /// Fulfillment should pick, pack and ship the order.
    FulfillmentRequested(FulfillmentRequestedData),

    /// Payments should return captured or authorized funds.
    RefundRequested(RefundRequestedData),

    /// The saga has sat in one non-terminal status for too long.
    OrderStuck(OrderStuckData),
}

impl Message for OutboundMessage {
    fn message_type(&self) -> &'static str {
        match self {
            OutboundMessage::OrderPlaced(_) => "OrderPlaced",
            OutboundMessage::ReservationCommitRequested(_) => "ReservationCommitRequested",
            OutboundMessage::ReservationReleaseRequested(_) => "ReservationReleaseRequested",
            OutboundMessage::FulfillmentRequested(_) => "FulfillmentRequested",
            OutboundMessage::RefundRequested(_) => "RefundRequested",
            OutboundMessage::OrderStuck(_) => "OrderStuck",
        }
    }

    fn order_id(&self) -> OrderId {
        match self {
            OutboundMessage::OrderPlaced(d) => d.order_id,
            OutboundMessage::ReservationCommitRequested(d) => d.order_id,
            OutboundMessage::ReservationReleaseRequested(d) => d.order_id,
            OutboundMessage::FulfillmentRequested(d) => d.order_id,
            OutboundMessage::RefundRequested(d) => d.order_id,
            OutboundMessage::OrderStuck(d) => d.order_id,
        }
    }
}

// Convenience constructors
impl OutboundMessage {
    pub(crate) fn order_placed(saga: &OrderSaga) -> Self {
        OutboundMessage::OrderPlaced(OrderPlacedData {
            order_id: saga.id(),
            customer_id: saga.customer_id(),
            line_items: saga.line_items().to_vec(),
            total_amount: saga.total_amount(),
            shipping_address: saga.shipping_address().clone(),
            shipping_method: saga.shipping_method(),
            payment_method_token: saga.payment_method_token().clone(),
            placed_at: saga.placed_at(),
        })
    }

    pub(crate) fn commit_requested(
        order_id: OrderId,
        reservation_id: ReservationId,
        now: DateTime<Utc>,
    ) -> Self {
        OutboundMessage::ReservationCommitRequested(ReservationCommitRequestedData {
            order_id,
            reservation_id,
            requested_at: now,
        })
    }

    pub(crate) fn release_requested(
        order_id: OrderId,
        reservation_id: ReservationId,
        reason: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        OutboundMessage::ReservationReleaseRequested(ReservationReleaseRequestedData {
            order_id,
            reservation_id,
            reason: reason.into(),
            requested_at: now,
        })
    }

    pub(crate) fn fulfillment_requested(saga: &OrderSaga, now: DateTime<Utc>) -> Self {
        OutboundMessage::FulfillmentRequested(FulfillmentRequestedData {
            order_id: saga.id(),
            customer_id: saga.customer_id(),
            shipping_address: saga.shipping_address().clone(),
            line_items: saga.line_items().to_vec(),
            shipping_method: saga.shipping_method(),
            requested_at: now,
        })
    }

    pub(crate) fn refund_requested(
        order_id: OrderId,
        payment_id: PaymentId,
        amount: Money,
        reason: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        OutboundMessage::RefundRequested(RefundRequestedData {
            order_id,
            payment_id,
            amount,
            reason: reason.into(),
            requested_at: now,
        })
    }

    pub(crate) fn order_stuck(saga: &OrderSaga, now: DateTime<Utc>) -> Self {
        OutboundMessage::OrderStuck(OrderStuckData {
            order_id: saga.id(),
            status: saga.status(),
            status_since: saga.status_since(),
            detected_at: now,
        })
    }
}

/// Data for OrderPlaced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderPlacedData {
    pub order_id: OrderId,
    pub customer_id: CustomerId,

    /// What Inventory must reserve.
    pub line_items: Vec<LineItem>,

    /// What Payments must charge.
    pub total_amount: Money,

    pub shipping_address: ShippingAddress,
    pub shipping_method: ShippingMethod,

    /// How Payments should charge.
    pub payment_method_token: PaymentMethodToken,

    pub placed_at: DateTime<Utc>,
}

/// Data for ReservationCommitRequested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReservationCommitRequestedData {
    pub order_id: OrderId,
    pub reservation_id: ReservationId,
    pub requested_at: DateTime<Utc>,
}

/// Data for ReservationReleaseRequested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReservationReleaseRequestedData {
    pub order_id: OrderId,
    pub reservation_id: ReservationId,

    /// Why the stock is being returned.
    pub reason: String,

    pub requested_at: DateTime<Utc>,
}

/// Data for FulfillmentRequested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FulfillmentRequestedData {
    pub order_id: OrderId,
    pub customer_id: CustomerId,
    pub shipping_address: ShippingAddress,
    pub line_items: Vec<LineItem>,
    pub shipping_method: ShippingMethod,
    pub requested_at: DateTime<Utc>,
}

/// Data for RefundRequested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefundRequestedData {
    pub order_id: OrderId,

    /// The payment to refund or void.
    pub payment_id: PaymentId,

    /// Captured amount, or the order total if only authorized.
    pub amount: Money,

    pub reason: String,
    pub requested_at: DateTime<Utc>,
}

/// Data for OrderStuck.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderStuckData {
    pub order_id: OrderId,

    /// The status the saga is stuck in.
    pub status: OrderStatus,

    /// When the saga entered that status.
    pub status_since: DateTime<Utc>,

    pub detected_at: DateTime<Utc>,
}
