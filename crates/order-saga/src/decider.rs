//! The order decider.
//!
//! A pure function from `(saga, message, now)` to `(saga', messages)`.
//! It performs no I/O; persisting the new state and publishing the
//! messages is the caller's job.
//!
//! Ordering rules the decider relies on:
//! - Payment and inventory confirmations arrive in any order. Whichever
//!   side completes second emits the commit or fulfillment request, and
//!   the ready-to-fulfill check runs after both.
//! - The first failure starts compensation; any later failure is ignored.
//! - Work confirmed after a failure (a late reservation or capture) is
//!   compensated on arrival rather than dropped.

use chrono::{DateTime, Duration, Utc};
use common::MessageId;

use crate::checkout;
use crate::error::OrderError;
use crate::inbound::{
    InboundMessage, PaymentAuthorizedData, PaymentCapturedData, PaymentFailedData,
    RefundCompletedData, RefundFailedData, ReservationCommittedData, ReservationConfirmedData,
    ReservationFailedData, ReservationReleasedData, ShipmentDeliveredData,
    ShipmentDeliveryFailedData, ShipmentDispatchedData,
};
use crate::message::Message;
use crate::outbound::OutboundMessage;
use crate::saga::{
    DeliveryAttempt, Failure, FailureKind, OrderSaga, RefundNotice, RefundState, Shipment,
};
use crate::status::OrderStatus;
use crate::value_objects::ReservationId;

/// What the caller should do with a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Persist the new state and its messages.
    Applied,

    /// Persist the new state and its messages, then archive the saga.
    Completed,

    /// Nothing changed; persist nothing.
    Ignored { reason: &'static str },
}

/// The result of applying one message.
#[derive(Debug, Clone)]
pub struct Decision {
    /// The saga after the message.
    pub saga: OrderSaga,

    /// Messages to publish, in order.
    pub messages: Vec<OutboundMessage>,

    pub disposition: Disposition,
}

impl Decision {
    fn ignored(saga: &OrderSaga, reason: &'static str) -> Self {
        Self {
            saga: saga.clone(),
            messages: Vec::new(),
            disposition: Disposition::Ignored { reason },
        }
    }

    /// Returns true if the saga changed.
    pub fn is_change(&self) -> bool {
        !matches!(self.disposition, Disposition::Ignored { .. })
    }
}

type Handled = Result<(), &'static str>;

/// Applies one inbound message.
///
/// `current` is None when no saga exists for the message's order; only a
/// `CheckoutCompleted` may create one.
pub fn decide(
    current: Option<&OrderSaga>,
    message_id: MessageId,
    message: &InboundMessage,
    now: DateTime<Utc>,
) -> Result<Decision, OrderError> {
    let Some(current) = current else {
        return match message {
            InboundMessage::CheckoutCompleted(data) => checkout::start(message_id, data, now),
            other => Err(OrderError::NotStarted(other.order_id())),
        };
    };

    if message.order_id() != current.id() {
        return Err(OrderError::CorrelationMismatch {
            saga_order: current.id(),
            message_order: message.order_id(),
        });
    }

    if current.has_processed(message_id) {
        return Ok(Decision::ignored(current, "duplicate delivery"));
    }

    let mut step = Step {
        saga: current.clone(),
        messages: Vec::new(),
        now,
    };

    let handled = match message {
        InboundMessage::CheckoutCompleted(_) => Err("saga already started"),
        InboundMessage::PaymentAuthorized(d) => step.payment_authorized(d),
        InboundMessage::PaymentCaptured(d) => step.payment_captured(d),
        InboundMessage::PaymentFailed(d) => step.payment_failed(d),
        InboundMessage::RefundCompleted(d) => step.refund_completed(d),
        InboundMessage::RefundFailed(d) => step.refund_failed(d),
        InboundMessage::ReservationConfirmed(d) => step.reservation_confirmed(d),
        InboundMessage::ReservationFailed(d) => step.reservation_failed(d),
        InboundMessage::ReservationCommitted(d) => step.reservation_committed(d),
        InboundMessage::ReservationReleased(d) => step.reservation_released(d),
        InboundMessage::ShipmentDispatched(d) => step.shipment_dispatched(d),
        InboundMessage::ShipmentDelivered(d) => step.shipment_delivered(d),
        InboundMessage::ShipmentDeliveryFailed(d) => step.shipment_delivery_failed(d),
    };

    if let Err(reason) = handled {
        return Ok(Decision::ignored(current, reason));
    }

    step.saga.mark_processed(message_id);
    let disposition = if step.saga.status() == OrderStatus::Delivered {
        Disposition::Completed
    } else {
        Disposition::Applied
    };

    Ok(Decision {
        saga: step.saga,
        messages: step.messages,
        disposition,
    })
}

/// Reports a saga that has not changed status for `max_dwell`.
///
/// Reports once per status: the saga is reported again only after it
/// moves to another status and stalls there too.
pub fn detect_stuck(saga: &OrderSaga, max_dwell: Duration, now: DateTime<Utc>) -> Decision {
    if saga.is_terminal() {
        return Decision::ignored(saga, "saga is terminal");
    }
    if now - saga.status_since() < max_dwell {
        return Decision::ignored(saga, "within allowed dwell time");
    }
    if saga.stuck_reported_for == Some(saga.status_since()) {
        return Decision::ignored(saga, "already reported");
    }

    let mut saga = saga.clone();
    saga.stuck_reported_for = Some(saga.status_since());
    let stuck = OutboundMessage::order_stuck(&saga, now);

    Decision {
        saga,
        messages: vec![stuck],
        disposition: Disposition::Applied,
    }
}

/// Working copy of a saga while one message is applied.
struct Step {
    saga: OrderSaga,
    messages: Vec<OutboundMessage>,
    now: DateTime<Utc>,
}

// Payment handlers
impl Step {
    fn payment_authorized(&mut self, d: &PaymentAuthorizedData) -> Handled {
        if self.saga.is_payment_authorized || self.saga.is_payment_captured {
            return Err("payment already authorized");
        }

        self.saga.is_payment_authorized = true;
        if self.saga.payment_id.is_none() {
            self.saga.payment_id = Some(d.payment_id.clone());
        }

        if self.saga.failure.is_some() {
            self.request_refund("order cancelled before payment completed");
        } else {
            self.saga.advance_to(OrderStatus::PendingPayment, self.now);
        }
        Ok(())
    }

    fn payment_captured(&mut self, d: &PaymentCapturedData) -> Handled {
        if self.saga.is_payment_captured {
            return Err("payment already captured");
        }

        self.saga.is_payment_captured = true;
        self.saga.payment_id = Some(d.payment_id.clone());
        self.saga.captured_amount = Some(d.amount);

        if self.saga.failure.is_some() {
            self.request_refund("order cancelled after payment was captured");
            return Ok(());
        }

        self.saga.advance_to(OrderStatus::PaymentConfirmed, self.now);
        self.request_pending_commits();
        self.fulfill_if_ready();
        Ok(())
    }

    fn payment_failed(&mut self, d: &PaymentFailedData) -> Handled {
        if self.saga.failure.is_some() {
            return Err("compensation already in progress");
        }
        if self.saga.is_payment_captured {
            return Err("payment already captured");
        }
        if self.saga.is_terminal() {
            return Err("saga is terminal");
        }

        self.fail(FailureKind::Payment, &d.reason);
        self.release_all(&d.reason);
        self.cancel_if_settled();
        Ok(())
    }

    fn refund_completed(&mut self, d: &RefundCompletedData) -> Handled {
        if !matches!(self.saga.refund, RefundState::Requested { .. }) {
            if self.saga.has_recorded_refund(&d.refund_id) {
                return Err("refund already recorded");
            }
            self.saga.refund_notices.push(RefundNotice::Completed {
                refund_id: d.refund_id.clone(),
                amount: d.amount,
                received_at: d.refunded_at,
            });
            return Ok(());
        }

        self.saga.refund = RefundState::Completed {
            refund_id: d.refund_id.clone(),
            amount: d.amount,
        };
        self.cancel_if_settled();
        Ok(())
    }

    fn refund_failed(&mut self, d: &RefundFailedData) -> Handled {
        if !matches!(self.saga.refund, RefundState::Requested { .. }) {
            self.saga.refund_notices.push(RefundNotice::Failed {
                reason: d.reason.clone(),
                received_at: d.failed_at,
            });
            return Ok(());
        }

        self.saga.refund = RefundState::Failed {
            reason: d.reason.clone(),
        };
        self.cancel_if_settled();
        Ok(())
    }
}

// Inventory handlers
impl Step {
    fn reservation_confirmed(&mut self, d: &ReservationConfirmedData) -> Handled {
        if !self
            .saga
            .track_reservation(d.reservation_id.clone(), d.sku.clone())
        {
            return Err("reservation already tracked");
        }

        if let Some(reason) = self.compensation_reason() {
            self.release(&d.reservation_id, &reason);
            return Ok(());
        }

        self.saga.advance_to(OrderStatus::InventoryReserved, self.now);
        if self.saga.is_payment_captured {
            self.request_commit(&d.reservation_id);
        }
        Ok(())
    }

    fn reservation_failed(&mut self, d: &ReservationFailedData) -> Handled {
        if self.saga.failure.is_some() {
            return Err("compensation already in progress");
        }
        if self.saga.fulfillment_requested {
            return Err("fulfillment already requested");
        }
        if self.saga.is_terminal() {
            return Err("saga is terminal");
        }

        let reason = format!(
            "inventory unavailable for {}: requested {}, available {} ({})",
            d.sku, d.requested, d.available, d.reason
        );
        self.fail(FailureKind::Inventory, &reason);
        self.release_all(&reason);
        if self.saga.is_payment_authorized || self.saga.is_payment_captured {
            self.request_refund(&reason);
        }
        self.cancel_if_settled();
        Ok(())
    }

    fn reservation_committed(&mut self, d: &ReservationCommittedData) -> Handled {
        let Some(reservation) = self.saga.reservation_mut(&d.reservation_id) else {
            return Err("unknown reservation");
        };
        if reservation.committed {
            return Err("reservation already committed");
        }
        reservation.committed = true;

        if let Some(reason) = self.compensation_reason() {
            self.release(&d.reservation_id, &reason);
            return Ok(());
        }

        self.saga.advance_to(OrderStatus::InventoryCommitted, self.now);
        self.fulfill_if_ready();
        Ok(())
    }

    fn reservation_released(&mut self, d: &ReservationReleasedData) -> Handled {
        let Some(reservation) = self.saga.reservation_mut(&d.reservation_id) else {
            return Err("unknown reservation");
        };
        if reservation.released {
            return Err("reservation already released");
        }
        reservation.released = true;

        self.cancel_if_settled();
        Ok(())
    }
}

// Fulfillment handlers
impl Step {
    fn shipment_dispatched(&mut self, d: &ShipmentDispatchedData) -> Handled {
        if self.saga.failure.is_some() {
            return Err("order was cancelled");
        }
        if self
            .saga
            .shipment
            .as_ref()
            .is_some_and(|s| s.shipment_id == d.shipment_id && s.dispatched_at.is_some())
        {
            return Err("shipment already dispatched");
        }

        let shipment = self.shipment_mut(&d.shipment_id);
        shipment.carrier = Some(d.carrier.clone());
        shipment.tracking_number = Some(d.tracking_number.clone());
        shipment.dispatched_at = Some(d.dispatched_at);

        self.saga.advance_to(OrderStatus::Shipped, self.now);
        Ok(())
    }

    fn shipment_delivered(&mut self, d: &ShipmentDeliveredData) -> Handled {
        if self.saga.failure.is_some() {
            return Err("order was cancelled");
        }

        let shipment = self.shipment_mut(&d.shipment_id);
        shipment.delivered_at = Some(d.delivered_at);
        shipment.signed_by = d.signed_by.clone();

        self.saga.advance_to(OrderStatus::Delivered, self.now);
        Ok(())
    }

    fn shipment_delivery_failed(&mut self, d: &ShipmentDeliveryFailedData) -> Handled {
        self.saga.delivery_attempts.push(DeliveryAttempt {
            shipment_id: d.shipment_id.clone(),
            reason: d.reason.clone(),
            failed_at: d.failed_at,
        });
        Ok(())
    }

    fn shipment_mut(&mut self, shipment_id: &str) -> &mut Shipment {
        let shipment = self.saga.shipment.get_or_insert_with(|| Shipment {
            shipment_id: shipment_id.to_string(),
            carrier: None,
            tracking_number: None,
            dispatched_at: None,
            delivered_at: None,
            signed_by: None,
        });
        shipment.shipment_id = shipment_id.to_string();
        shipment
    }
}

// Emission and compensation helpers
impl Step {
    fn fail(&mut self, kind: FailureKind, reason: &str) {
        self.saga.failure = Some(Failure {
            kind,
            reason: reason.to_string(),
            failed_at: self.now,
        });
        let status = match kind {
            FailureKind::Payment => OrderStatus::PaymentFailed,
            FailureKind::Inventory => OrderStatus::InventoryFailed,
        };
        self.saga.set_status(status, self.now);
    }

    /// Reason to compensate newly confirmed work, if the saga has failed.
    fn compensation_reason(&self) -> Option<String> {
        self.saga
            .failure
            .as_ref()
            .map(|f| format!("order cancelled: {}", f.reason))
    }

    /// Asks Inventory to commit every held reservation not yet asked.
    fn request_pending_commits(&mut self) {
        let order_id = self.saga.id();
        for (id, reservation) in self.saga.reservations_mut() {
            if reservation.commit_requested || reservation.release_requested {
                continue;
            }
            reservation.commit_requested = true;
            self.messages
                .push(OutboundMessage::commit_requested(order_id, id.clone(), self.now));
        }
    }

    fn request_commit(&mut self, id: &ReservationId) {
        let order_id = self.saga.id();
        if let Some(reservation) = self.saga.reservation_mut(id)
            && !reservation.commit_requested
            && !reservation.release_requested
        {
            reservation.commit_requested = true;
            self.messages
                .push(OutboundMessage::commit_requested(order_id, id.clone(), self.now));
        }
    }

    /// Asks Inventory to release every held reservation not yet asked.
    fn release_all(&mut self, reason: &str) {
        let order_id = self.saga.id();
        for (id, reservation) in self.saga.reservations_mut() {
            if reservation.release_requested || reservation.released {
                continue;
            }
            reservation.release_requested = true;
            self.messages.push(OutboundMessage::release_requested(
                order_id,
                id.clone(),
                reason,
                self.now,
            ));
        }
    }

    fn release(&mut self, id: &ReservationId, reason: &str) {
        let order_id = self.saga.id();
        if let Some(reservation) = self.saga.reservation_mut(id)
            && !reservation.release_requested
            && !reservation.released
        {
            reservation.release_requested = true;
            self.messages.push(OutboundMessage::release_requested(
                order_id,
                id.clone(),
                reason,
                self.now,
            ));
        }
    }

    /// Asks Payments to return the money, at most once per saga.
    fn request_refund(&mut self, reason: &str) {
        if self.saga.refund != RefundState::NotRequested {
            return;
        }
        let Some(payment_id) = self.saga.payment_id.clone() else {
            return;
        };

        let amount = self.saga.refundable_amount();
        self.saga.refund = RefundState::Requested { amount };
        self.messages.push(OutboundMessage::refund_requested(
            self.saga.id(),
            payment_id,
            amount,
            reason,
            self.now,
        ));
    }

    fn fulfill_if_ready(&mut self) {
        if !self.saga.is_ready_to_fulfill() {
            return;
        }
        self.saga.fulfillment_requested = true;
        self.messages
            .push(OutboundMessage::fulfillment_requested(&self.saga, self.now));
        self.saga.advance_to(OrderStatus::Fulfilling, self.now);
    }

    /// A failed saga becomes `Cancelled` once nothing is outstanding.
    fn cancel_if_settled(&mut self) {
        if self.saga.status().is_failed() && !self.saga.has_outstanding_compensation() {
            self.saga.set_status(OrderStatus::Cancelled, self.now);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inbound::{CheckoutCompletedData, CheckoutLineItem};
    use crate::value_objects::{
        Money, PaymentId, PaymentMethodToken, ShippingAddress, ShippingMethod, Sku,
    };
    use chrono::TimeZone;
    use common::{CustomerId, OrderId};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
    }

    fn checkout(order_id: OrderId) -> InboundMessage {
        InboundMessage::CheckoutCompleted(CheckoutCompletedData {
            order_id,
            customer_id: Some(CustomerId::new()),
            line_items: vec![
                CheckoutLineItem {
                    sku: Sku::new("SKU-001"),
                    quantity: 2,
                    unit_price: Money::from_cents(1999),
                },
                CheckoutLineItem {
                    sku: Sku::new("SKU-002"),
                    quantity: 1,
                    unit_price: Money::from_cents(3999),
                },
            ],
            shipping_address: Some(ShippingAddress {
                recipient: "Ada Lovelace".to_string(),
                line1: "12 St James's Square".to_string(),
                line2: None,
                city: "London".to_string(),
                region: None,
                postal_code: "SW1Y 4JH".to_string(),
                country: "GB".to_string(),
            }),
            shipping_method: ShippingMethod::Standard,
            shipping_cost: Money::from_cents(599),
            payment_method_token: Some(PaymentMethodToken::new("tok_visa")),
            completed_at: now(),
        })
    }

    fn started() -> OrderSaga {
        let order_id = OrderId::new();
        decide(None, MessageId::new(), &checkout(order_id), now())
            .unwrap()
            .saga
    }

    fn apply(saga: &OrderSaga, message: InboundMessage) -> Decision {
        decide(Some(saga), MessageId::new(), &message, now()).unwrap()
    }

    fn captured(order_id: OrderId) -> InboundMessage {
        InboundMessage::PaymentCaptured(PaymentCapturedData {
            payment_id: PaymentId::new("pay-1"),
            order_id,
            amount: Money::from_cents(8596),
            transaction_id: "txn-1".to_string(),
            captured_at: now(),
        })
    }

    fn payment_failed(order_id: OrderId) -> InboundMessage {
        InboundMessage::PaymentFailed(PaymentFailedData {
            payment_id: PaymentId::new("pay-1"),
            order_id,
            reason: "card declined".to_string(),
            is_retriable: false,
            failed_at: now(),
        })
    }

    fn confirmed(order_id: OrderId, reservation: &str, sku: &str) -> InboundMessage {
        InboundMessage::ReservationConfirmed(ReservationConfirmedData {
            order_id,
            inventory_id: "inv-1".to_string(),
            reservation_id: ReservationId::new(reservation),
            sku: Sku::new(sku),
            warehouse_id: "wh-1".to_string(),
            quantity: 1,
            confirmed_at: now(),
        })
    }

    fn committed(order_id: OrderId, reservation: &str, sku: &str) -> InboundMessage {
        InboundMessage::ReservationCommitted(ReservationCommittedData {
            order_id,
            inventory_id: "inv-1".to_string(),
            reservation_id: ReservationId::new(reservation),
            sku: Sku::new(sku),
            warehouse_id: "wh-1".to_string(),
            quantity: 1,
            committed_at: now(),
        })
    }

    fn types(decision: &Decision) -> Vec<&'static str> {
        decision.messages.iter().map(|m| m.message_type()).collect()
    }

    #[test]
    fn test_non_checkout_message_needs_a_saga() {
        let order_id = OrderId::new();
        let result = decide(None, MessageId::new(), &captured(order_id), now());
        assert!(matches!(result, Err(OrderError::NotStarted(id)) if id == order_id));
    }

    #[test]
    fn test_invalid_checkout_creates_nothing() {
        let mut message = checkout(OrderId::new());
        if let InboundMessage::CheckoutCompleted(data) = &mut message {
            data.line_items.clear();
        }
        let result = decide(None, MessageId::new(), &message, now());
        assert!(matches!(result, Err(OrderError::Rejected(_))));
    }

    #[test]
    fn test_second_checkout_is_ignored() {
        let saga = started();
        let decision = apply(&saga, checkout(saga.id()));
        assert!(!decision.is_change());
        assert_eq!(decision.saga, saga);
    }

    #[test]
    fn test_redelivery_is_ignored() {
        let saga = started();
        let message_id = MessageId::new();
        let first = decide(Some(&saga), message_id, &captured(saga.id()), now()).unwrap();
        let again = decide(Some(&first.saga), message_id, &captured(saga.id()), now()).unwrap();

        assert_eq!(
            again.disposition,
            Disposition::Ignored {
                reason: "duplicate delivery"
            }
        );
        assert!(again.messages.is_empty());
        assert_eq!(again.saga, first.saga);
    }

    #[test]
    fn test_message_for_other_order_is_an_error() {
        let saga = started();
        let result = decide(Some(&saga), MessageId::new(), &captured(OrderId::new()), now());
        assert!(matches!(result, Err(OrderError::CorrelationMismatch { .. })));
    }

    #[test]
    fn test_capture_then_confirm_requests_commit() {
        let saga = started();
        let after_capture = apply(&saga, captured(saga.id()));
        assert_eq!(after_capture.saga.status(), OrderStatus::PaymentConfirmed);
        assert!(after_capture.messages.is_empty());

        let after_confirm = apply(&after_capture.saga, confirmed(saga.id(), "r1", "SKU-001"));
        assert_eq!(types(&after_confirm), vec!["ReservationCommitRequested"]);
        // A lower-ranked status never replaces a higher one.
        assert_eq!(after_confirm.saga.status(), OrderStatus::PaymentConfirmed);
    }

    #[test]
    fn test_confirm_then_capture_requests_commit_for_each_reservation() {
        let saga = started();
        let saga = apply(&saga, confirmed(saga.id(), "r1", "SKU-001")).saga;
        let saga = apply(&saga, confirmed(saga.id(), "r2", "SKU-002")).saga;
        assert_eq!(saga.status(), OrderStatus::InventoryReserved);

        let decision = apply(&saga, captured(saga.id()));
        assert_eq!(
            types(&decision),
            vec!["ReservationCommitRequested", "ReservationCommitRequested"]
        );
        assert_eq!(decision.saga.status(), OrderStatus::PaymentConfirmed);
    }

    #[test]
    fn test_last_commit_requests_fulfillment_once() {
        let saga = started();
        let saga = apply(&saga, confirmed(saga.id(), "r1", "SKU-001")).saga;
        let saga = apply(&saga, confirmed(saga.id(), "r2", "SKU-002")).saga;
        let saga = apply(&saga, captured(saga.id())).saga;

        let first = apply(&saga, committed(saga.id(), "r1", "SKU-001"));
        assert!(first.messages.is_empty());
        assert_eq!(first.saga.status(), OrderStatus::InventoryCommitted);

        let decision = apply(&first.saga, committed(saga.id(), "r2", "SKU-002"));
        assert_eq!(types(&decision), vec!["FulfillmentRequested"]);
        assert_eq!(decision.saga.status(), OrderStatus::Fulfilling);

        let again = apply(&decision.saga, committed(saga.id(), "r2", "SKU-002"));
        assert!(!again.is_change());
    }

    #[test]
    fn test_committed_sku_does_not_cover_an_unreserved_line() {
        let saga = started();
        let saga = apply(&saga, captured(saga.id())).saga;
        let saga = apply(&saga, confirmed(saga.id(), "r1", "SKU-001")).saga;

        let decision = apply(&saga, committed(saga.id(), "r1", "SKU-001"));
        assert!(decision.messages.is_empty());
        assert!(!decision.saga.is_fulfillment_requested());
        assert_eq!(decision.saga.status(), OrderStatus::InventoryCommitted);
    }

    #[test]
    fn test_payment_failure_releases_reservations() {
        let saga = started();
        let saga = apply(&saga, confirmed(saga.id(), "r1", "SKU-001")).saga;

        let decision = apply(&saga, payment_failed(saga.id()));
        assert_eq!(types(&decision), vec!["ReservationReleaseRequested"]);
        assert_eq!(decision.saga.status(), OrderStatus::PaymentFailed);
        match &decision.messages[0] {
            OutboundMessage::ReservationReleaseRequested(d) => assert_eq!(d.reason, "card declined"),
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn test_payment_failure_with_nothing_held_cancels() {
        let saga = started();
        let decision = apply(&saga, payment_failed(saga.id()));
        assert!(decision.messages.is_empty());
        assert_eq!(decision.saga.status(), OrderStatus::Cancelled);
    }

    #[test]
    fn test_stuck_reported_once_per_status() {
        let saga = started();
        let max_dwell = Duration::hours(6);

        let early = detect_stuck(&saga, max_dwell, now() + Duration::hours(1));
        assert!(!early.is_change());

        let late = detect_stuck(&saga, max_dwell, now() + Duration::hours(7));
        assert_eq!(types(&late), vec!["OrderStuck"]);

        let again = detect_stuck(&late.saga, max_dwell, now() + Duration::hours(8));
        assert!(!again.is_change());
    }

    #[test]
    fn test_terminal_saga_is_never_stuck() {
        let saga = started();
        let cancelled = apply(&saga, payment_failed(saga.id())).saga;
        let decision = detect_stuck(&cancelled, Duration::hours(6), now() + Duration::days(3));
        assert!(!decision.is_change());
    }
}
