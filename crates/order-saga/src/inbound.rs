//! Messages the order saga consumes.

use chrono::{DateTime, Utc};
use common::{CustomerId, MessageId, OrderId};
use serde::{Deserialize, Serialize};

use crate::message::Message;
use crate::value_objects::{
    Money, PaymentId, PaymentMethodToken, ReservationId, ShippingAddress, ShippingMethod, Sku,
};

/// Events from Checkout, Payments, Inventory and Fulfillment that drive the saga.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum InboundMessage {
    /// Checkout finished; originates the saga.
    CheckoutCompleted(CheckoutCompletedData),

    /// Funds were authorized (two-phase payments).
    PaymentAuthorized(PaymentAuthorizedData),

    /// Funds were captured.
    PaymentCaptured(PaymentCapturedData),

    /// The payment was declined or errored.
    PaymentFailed(PaymentFailedData),

    /// A refund went through.
    RefundCompleted(RefundCompletedData),

    /// A refund could not be made.
    RefundFailed(RefundFailedData),

    /// Stock was put on hold for one SKU.
    ReservationConfirmed(ReservationConfirmedData),

    /// Stock could not be held for one SKU.
    ReservationFailed(ReservationFailedData),

    /// A hold was turned into a hard allocation.
    ReservationCommitted(ReservationCommittedData),

    /// A hold was returned to the available pool.
    ReservationReleased(ReservationReleasedData),

    /// The order left the warehouse.
    ShipmentDispatched(ShipmentDispatchedData),

    /// The order reached the customer.
    ShipmentDelivered(ShipmentDeliveredData),

    /// A delivery attempt failed.
    ShipmentDeliveryFailed(ShipmentDeliveryFailedData),
}

impl Message for InboundMessage {
    fn message_type(&self) -> &'static str {
        match self {
            InboundMessage::CheckoutCompleted(_) => "CheckoutCompleted",
            InboundMessage::PaymentAuthorized(_) => "PaymentAuthorized",
            InboundMessage::PaymentCaptured(_) => "PaymentCaptured",
            InboundMessage::PaymentFailed(_) => "PaymentFailed",
            InboundMessage::RefundCompleted(_) => "RefundCompleted",
            InboundMessage::RefundFailed(_) => "RefundFailed",
            InboundMessage::ReservationConfirmed(_) => "ReservationConfirmed",
            InboundMessage::ReservationFailed(_) => "ReservationFailed",
            InboundMessage::ReservationCommitted(_) => "ReservationCommitted",
            InboundMessage::ReservationReleased(_) => "ReservationReleased",
            InboundMessage::ShipmentDispatched(_) => "ShipmentDispatched",
            InboundMessage::ShipmentDelivered(_) => "ShipmentDelivered",
            InboundMessage::ShipmentDeliveryFailed(_) => "ShipmentDeliveryFailed",
        }
    }

    fn order_id(&self) -> OrderId {
        match self {
            InboundMessage::CheckoutCompleted(d) => d.order_id,
            InboundMessage::PaymentAuthorized(d) => d.order_id,
            InboundMessage::PaymentCaptured(d) => d.order_id,
            InboundMessage::PaymentFailed(d) => d.order_id,
            InboundMessage::RefundCompleted(d) => d.order_id,
            InboundMessage::RefundFailed(d) => d.order_id,
            InboundMessage::ReservationConfirmed(d) => d.order_id,
            InboundMessage::ReservationFailed(d) => d.order_id,
            InboundMessage::ReservationCommitted(d) => d.order_id,
            InboundMessage::ReservationReleased(d) => d.order_id,
            InboundMessage::ShipmentDispatched(d) => d.order_id,
            InboundMessage::ShipmentDelivered(d) => d.order_id,
            InboundMessage::ShipmentDeliveryFailed(d) => d.order_id,
        }
    }
}

/// One delivery of an inbound message.
///
/// The transport assigns `message_id`; a redelivery carries the same id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundEnvelope {
    /// Delivery identity, used to detect duplicates.
    pub message_id: MessageId,

    /// The message itself.
    pub message: InboundMessage,
}

impl InboundEnvelope {
    /// Wraps a message with a fresh delivery id.
    pub fn new(message: InboundMessage) -> Self {
        Self {
            message_id: MessageId::new(),
            message,
        }
    }

    /// Wraps a message with a known delivery id.
    pub fn with_id(message_id: MessageId, message: InboundMessage) -> Self {
        Self {
            message_id,
            message,
        }
    }

    /// Returns the order the message concerns.
    pub fn order_id(&self) -> OrderId {
        self.message.order_id()
    }

    /// Returns the message type name.
    pub fn message_type(&self) -> &'static str {
        self.message.message_type()
    }
}

/// A line as submitted by Checkout, before validation.
///
/// Quantity is signed so that non-positive values reach validation
/// instead of failing to parse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutLineItem {
    pub sku: Sku,
    pub quantity: i64,
    pub unit_price: Money,
}

/// Data for CheckoutCompleted.
///
/// Optional fields are optional only on the wire; a message missing any
/// of them is rejected before a saga is created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutCompletedData {
    /// The order to create.
    pub order_id: OrderId,

    /// The customer placing the order.
    #[serde(default)]
    pub customer_id: Option<CustomerId>,

    /// Priced lines, in display order.
    #[serde(default)]
    pub line_items: Vec<CheckoutLineItem>,

    /// Delivery address.
    #[serde(default)]
    pub shipping_address: Option<ShippingAddress>,

    /// Chosen shipping speed.
    pub shipping_method: ShippingMethod,

    /// Shipping charge added to the order total.
    pub shipping_cost: Money,

    /// Reference to the stored payment method.
    #[serde(default)]
    pub payment_method_token: Option<PaymentMethodToken>,

    /// When checkout finished.
    pub completed_at: DateTime<Utc>,
}

/// Data for PaymentAuthorized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentAuthorizedData {
    pub payment_id: PaymentId,
    pub order_id: OrderId,
    pub amount: Money,
    pub authorization_id: String,
    pub authorized_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Data for PaymentCaptured.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentCapturedData {
    pub payment_id: PaymentId,
    pub order_id: OrderId,
    pub amount: Money,
    pub transaction_id: String,
    pub captured_at: DateTime<Utc>,
}

/// Data for PaymentFailed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentFailedData {
    pub payment_id: PaymentId,
    pub order_id: OrderId,

    /// Human-readable failure text, forwarded as the release reason.
    pub reason: String,

    /// Whether Payments considers the failure transient.
    #[serde(default)]
    pub is_retriable: bool,

    pub failed_at: DateTime<Utc>,
}

/// Data for RefundCompleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundCompletedData {
    pub payment_id: PaymentId,
    pub order_id: OrderId,
    pub amount: Money,
    pub refund_id: String,
    pub refunded_at: DateTime<Utc>,
}

/// Data for RefundFailed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundFailedData {
    pub payment_id: PaymentId,
    pub order_id: OrderId,
    pub reason: String,
    pub failed_at: DateTime<Utc>,
}

/// Data for ReservationConfirmed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationConfirmedData {
    pub order_id: OrderId,
    pub inventory_id: String,

    /// The hold to commit or release later.
    pub reservation_id: ReservationId,

    pub sku: Sku,
    pub warehouse_id: String,
    pub quantity: u32,
    pub confirmed_at: DateTime<Utc>,
}

/// Data for ReservationFailed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationFailedData {
    pub order_id: OrderId,
    pub reservation_id: ReservationId,
    pub sku: Sku,
    pub warehouse_id: String,

    /// Units the order asked for.
    pub requested: u32,

    /// Units the warehouse had.
    pub available: u32,

    pub reason: String,
    pub failed_at: DateTime<Utc>,
}

/// Data for ReservationCommitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationCommittedData {
    pub order_id: OrderId,
    pub inventory_id: String,
    pub reservation_id: ReservationId,
    pub sku: Sku,
    pub warehouse_id: String,
    pub quantity: u32,
    pub committed_at: DateTime<Utc>,
}

/// Data for ReservationReleased.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationReleasedData {
    pub order_id: OrderId,
    pub inventory_id: String,
    pub reservation_id: ReservationId,
    pub sku: Sku,
    pub warehouse_id: String,
    pub quantity: u32,
    pub reason: String,
    pub released_at: DateTime<Utc>,
}

/// Data for ShipmentDispatched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipmentDispatchedData {
    pub order_id: OrderId,
    pub shipment_id: String,
    pub carrier: String,
    pub tracking_number: String,
    pub dispatched_at: DateTime<Utc>,
}

/// Data for ShipmentDelivered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipmentDeliveredData {
    pub order_id: OrderId,
    pub shipment_id: String,
    pub delivered_at: DateTime<Utc>,
    #[serde(default)]
    pub signed_by: Option<String>,
}

/// Data for ShipmentDeliveryFailed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipmentDeliveryFailedData {
    pub order_id: OrderId,
    pub shipment_id: String,
    pub reason: String,
    pub failed_at: DateTime<Utc>,
}
