//! Validation of the originating checkout and creation of the saga.

use chrono::{DateTime, Utc};
use common::{CustomerId, MessageId, OrderId};

use crate::decider::{Decision, Disposition};
use crate::error::{CheckoutRejection, OrderError};
use crate::inbound::CheckoutCompletedData;
use crate::outbound::OutboundMessage;
use crate::saga::OrderSaga;
use crate::value_objects::{
    LineItem, Money, PaymentMethodToken, ShippingAddress, ShippingMethod,
};

/// A checkout that passed validation, with totals computed.
#[derive(Debug, Clone)]
pub struct ValidatedCheckout {
    pub(crate) order_id: OrderId,
    pub(crate) customer_id: CustomerId,
    pub(crate) line_items: Vec<LineItem>,
    pub(crate) shipping_address: ShippingAddress,
    pub(crate) shipping_method: ShippingMethod,
    pub(crate) shipping_cost: Money,
    pub(crate) payment_method_token: PaymentMethodToken,
    pub(crate) total_amount: Money,
}

impl ValidatedCheckout {
    pub fn line_items(&self) -> &[LineItem] {
        &self.line_items
    }

    pub fn total_amount(&self) -> Money {
        self.total_amount
    }
}

/// Checks a `CheckoutCompleted` and prices it.
///
/// Lines are checked first, in order, so the rejection names the first
/// offending SKU.
pub fn validate_checkout(
    data: &CheckoutCompletedData,
) -> Result<ValidatedCheckout, CheckoutRejection> {
    if data.line_items.is_empty() {
        return Err(CheckoutRejection::NoLineItems);
    }

    let mut line_items = Vec::with_capacity(data.line_items.len());
    for line in &data.line_items {
        let quantity = u32::try_from(line.quantity)
            .ok()
            .filter(|q| *q > 0)
            .ok_or_else(|| CheckoutRejection::InvalidQuantity {
                sku: line.sku.clone(),
                quantity: line.quantity,
            })?;

        if !line.unit_price.is_positive() {
            return Err(CheckoutRejection::InvalidPrice {
                sku: line.sku.clone(),
                price: line.unit_price,
            });
        }

        let item = LineItem::new(line.sku.clone(), quantity, line.unit_price)
            .ok_or(CheckoutRejection::AmountOverflow)?;
        line_items.push(item);
    }

    let customer_id = data.customer_id.ok_or(CheckoutRejection::MissingCustomer)?;

    let shipping_address = data
        .shipping_address
        .clone()
        .filter(ShippingAddress::is_complete)
        .ok_or(CheckoutRejection::MissingShippingAddress)?;

    let payment_method_token = data
        .payment_method_token
        .clone()
        .filter(|token| !token.is_blank())
        .ok_or(CheckoutRejection::MissingPaymentToken)?;

    if data.shipping_cost.is_negative() {
        return Err(CheckoutRejection::NegativeShippingCost(data.shipping_cost));
    }

    let total_amount = line_items
        .iter()
        .try_fold(data.shipping_cost, |acc, item| acc.checked_add(item.line_total))
        .ok_or(CheckoutRejection::AmountOverflow)?;

    Ok(ValidatedCheckout {
        order_id: data.order_id,
        customer_id,
        line_items,
        shipping_address,
        shipping_method: data.shipping_method,
        shipping_cost: data.shipping_cost,
        payment_method_token,
        total_amount,
    })
}

/// Creates a saga from a checkout and announces the order.
///
/// Nothing is created if validation fails.
pub fn start(
    message_id: MessageId,
    data: &CheckoutCompletedData,
    now: DateTime<Utc>,
) -> Result<Decision, OrderError> {
    let checkout = validate_checkout(data)?;

    let mut saga = OrderSaga::from_checkout(checkout, now);
    saga.mark_processed(message_id);
    let placed = OutboundMessage::order_placed(&saga);

    Ok(Decision {
        saga,
        messages: vec![placed],
        disposition: Disposition::Applied,
    })
}
