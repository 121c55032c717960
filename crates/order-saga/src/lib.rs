//! Order orchestration saga.
//!
//! This crate holds the pure part of the order saga:
//! - Message contracts consumed from and produced for the other services
//! - The `OrderSaga` record and its status ranking
//! - Checkout validation and pricing
//! - The decider, which maps `(saga, message, now)` to a new saga and
//!   the messages to publish
//!
//! Persistence, delivery and scheduling live in `saga-runtime`.

pub mod checkout;
pub mod decider;
pub mod error;
pub mod inbound;
pub mod message;
pub mod outbound;
pub mod saga;
pub mod status;
pub mod value_objects;

pub use checkout::{ValidatedCheckout, validate_checkout};
pub use common::{CustomerId, MessageId, OrderId};
pub use decider::{Decision, Disposition, decide, detect_stuck};
pub use error::{CheckoutRejection, OrderError};
pub use inbound::{
    CheckoutCompletedData, CheckoutLineItem, InboundEnvelope, InboundMessage,
    PaymentAuthorizedData, PaymentCapturedData, PaymentFailedData, RefundCompletedData,
    RefundFailedData, ReservationCommittedData, ReservationConfirmedData, ReservationFailedData,
    ReservationReleasedData, ShipmentDeliveredData, ShipmentDeliveryFailedData,
    ShipmentDispatchedData,
};
pub use message::Message;
pub use outbound::{
    FulfillmentRequestedData, OrderPlacedData, OrderStuckData, OutboundMessage,
    RefundRequestedData, ReservationCommitRequestedData, ReservationReleaseRequestedData,
};
pub use saga::{
    DeliveryAttempt, Failure, FailureKind, OrderSaga, RefundNotice, RefundState, Shipment,
    TrackedReservation,
};
pub use status::OrderStatus;
pub use value_objects::{
    LineItem, Money, PaymentId, PaymentMethodToken, ReservationId, ShippingAddress,
    ShippingMethod, Sku,
};
