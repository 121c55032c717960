//! Errors raised by the order decider.

use common::OrderId;
use thiserror::Error;

use crate::value_objects::{Money, Sku};

/// Reasons a `CheckoutCompleted` cannot originate a saga.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckoutRejection {
    /// The order has no lines.
    #[error("Order has no line items")]
    NoLineItems,

    /// A line has a zero, negative or out-of-range quantity.
    #[error("Invalid quantity for {sku}: {quantity} (must be greater than 0)")]
    InvalidQuantity { sku: Sku, quantity: i64 },

    /// A line has a zero or negative unit price.
    #[error("Invalid price for {sku}: {price} (must be greater than 0)")]
    InvalidPrice { sku: Sku, price: Money },

    /// Shipping cannot cost less than nothing.
    #[error("Invalid shipping cost: {0}")]
    NegativeShippingCost(Money),

    /// No customer id was supplied.
    #[error("Customer ID is required")]
    MissingCustomer,

    /// No shipping address, or one with blank mandatory fields.
    #[error("Shipping address is required")]
    MissingShippingAddress,

    /// No payment method token, or a blank one.
    #[error("Payment method token is required")]
    MissingPaymentToken,

    /// Line or order total does not fit in the money type.
    #[error("Order total is out of range")]
    AmountOverflow,
}

/// Errors that can occur when deciding on an inbound message.
#[derive(Debug, Error)]
pub enum OrderError {
    /// The originating checkout failed validation; nothing was created.
    #[error("Checkout rejected: {0}")]
    Rejected(#[from] CheckoutRejection),

    /// A non-originating message arrived for an order with no saga.
    #[error("No saga exists for order {0}")]
    NotStarted(OrderId),

    /// A message was routed to the wrong saga.
    #[error("Message for order {message_order} delivered to saga {saga_order}")]
    CorrelationMismatch {
        saga_order: OrderId,
        message_order: OrderId,
    },
}
