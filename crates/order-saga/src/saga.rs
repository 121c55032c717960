//! The order saga record.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use common::{CustomerId, MessageId, OrderId};
use serde::{Deserialize, Serialize};

use crate::checkout::ValidatedCheckout;
use crate::status::OrderStatus;
use crate::value_objects::{
    LineItem, Money, PaymentId, PaymentMethodToken, ReservationId, ShippingAddress, ShippingMethod,
    Sku,
};

/// Progress of one inventory reservation held for the order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedReservation {
    /// The product the reservation holds.
    pub sku: Sku,
    pub commit_requested: bool,
    pub committed: bool,
    pub release_requested: bool,
    pub released: bool,
}

impl TrackedReservation {
    fn new(sku: Sku) -> Self {
        Self {
            sku,
            commit_requested: false,
            committed: false,
            release_requested: false,
            released: false,
        }
    }

    /// Returns true if a release was asked for and not yet confirmed.
    pub fn is_release_outstanding(&self) -> bool {
        self.release_requested && !self.released
    }
}

/// Which side failed first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    Payment,
    Inventory,
}

/// The failure that started compensation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub kind: FailureKind,
    pub reason: String,
    pub failed_at: DateTime<Utc>,
}

/// Refund bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum RefundState {
    #[default]
    NotRequested,
    Requested {
        amount: Money,
    },
    Completed {
        refund_id: String,
        amount: Money,
    },
    Failed {
        reason: String,
    },
}

/// A refund confirmation that arrived when no refund was outstanding.
///
/// Kept for the books only; it never settles compensation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RefundNotice {
    Completed {
        refund_id: String,
        amount: Money,
        received_at: DateTime<Utc>,
    },
    Failed {
        reason: String,
        received_at: DateTime<Utc>,
    },
}

/// Shipment details reported by Fulfillment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shipment {
    pub shipment_id: String,
    pub carrier: Option<String>,
    pub tracking_number: Option<String>,
    pub dispatched_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub signed_by: Option<String>,
}

/// A failed delivery attempt. Recorded, never acted on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryAttempt {
    pub shipment_id: String,
    pub reason: String,
    pub failed_at: DateTime<Utc>,
}

/// Orchestration state for one order.
///
/// Created only from a validated `CheckoutCompleted` and changed only by
/// the decider, one inbound message at a time. The checkout snapshot
/// (customer, lines, shipping, token, total) never changes after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderSaga {
    pub(crate) id: OrderId,
    pub(crate) customer_id: CustomerId,
    pub(crate) line_items: Vec<LineItem>,
    pub(crate) shipping_address: ShippingAddress,
    pub(crate) shipping_method: ShippingMethod,
    pub(crate) shipping_cost: Money,
    pub(crate) payment_method_token: PaymentMethodToken,
    pub(crate) total_amount: Money,
    pub(crate) placed_at: DateTime<Utc>,

    pub(crate) status: OrderStatus,
    pub(crate) status_since: DateTime<Utc>,

    /// Reservations by id, in id order.
    pub(crate) reservations: BTreeMap<ReservationId, TrackedReservation>,
    pub(crate) is_inventory_reserved: bool,

    pub(crate) payment_id: Option<PaymentId>,
    pub(crate) is_payment_authorized: bool,
    pub(crate) is_payment_captured: bool,
    pub(crate) captured_amount: Option<Money>,

    pub(crate) fulfillment_requested: bool,
    pub(crate) failure: Option<Failure>,
    pub(crate) refund: RefundState,
    #[serde(default)]
    pub(crate) refund_notices: Vec<RefundNotice>,
    pub(crate) shipment: Option<Shipment>,
    pub(crate) delivery_attempts: Vec<DeliveryAttempt>,

    /// `status_since` of the episode last reported as stuck.
    pub(crate) stuck_reported_for: Option<DateTime<Utc>>,

    /// Deliveries already applied to this saga.
    pub(crate) processed_messages: BTreeSet<MessageId>,
}

// Query methods
impl OrderSaga {
    /// Name under which the saga is persisted.
    pub const SAGA_TYPE: &'static str = "OrderSaga";

    pub fn id(&self) -> OrderId {
        self.id
    }

    pub fn customer_id(&self) -> CustomerId {
        self.customer_id
    }

    pub fn line_items(&self) -> &[LineItem] {
        &self.line_items
    }

    pub fn shipping_address(&self) -> &ShippingAddress {
        &self.shipping_address
    }

    pub fn shipping_method(&self) -> ShippingMethod {
        self.shipping_method
    }

    pub fn shipping_cost(&self) -> Money {
        self.shipping_cost
    }

    pub fn payment_method_token(&self) -> &PaymentMethodToken {
        &self.payment_method_token
    }

    /// Sum of line totals plus shipping, fixed at creation.
    pub fn total_amount(&self) -> Money {
        self.total_amount
    }

    pub fn placed_at(&self) -> DateTime<Utc> {
        self.placed_at
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    /// When the saga entered its current status.
    pub fn status_since(&self) -> DateTime<Utc> {
        self.status_since
    }

    /// Reservation id to SKU, for every reservation Inventory confirmed.
    pub fn reservation_ids(&self) -> impl Iterator<Item = (&ReservationId, &Sku)> {
        self.reservations.iter().map(|(id, r)| (id, &r.sku))
    }

    pub fn reservation(&self, id: &ReservationId) -> Option<&TrackedReservation> {
        self.reservations.get(id)
    }

    pub fn reservation_count(&self) -> usize {
        self.reservations.len()
    }

    pub fn is_inventory_reserved(&self) -> bool {
        self.is_inventory_reserved
    }

    /// True once every SKU on the order has a committed reservation and no
    /// tracked reservation is still waiting on its commit.
    pub fn is_inventory_committed(&self) -> bool {
        let every_sku_covered = self.line_items.iter().all(|line| {
            self.reservations
                .values()
                .any(|r| r.sku == line.sku && r.committed)
        });
        every_sku_covered && self.reservations.values().all(|r| r.committed)
    }

    pub fn payment_id(&self) -> Option<&PaymentId> {
        self.payment_id.as_ref()
    }

    pub fn is_payment_authorized(&self) -> bool {
        self.is_payment_authorized
    }

    pub fn is_payment_captured(&self) -> bool {
        self.is_payment_captured
    }

    pub fn is_fulfillment_requested(&self) -> bool {
        self.fulfillment_requested
    }

    pub fn failure(&self) -> Option<&Failure> {
        self.failure.as_ref()
    }

    pub fn refund(&self) -> &RefundState {
        &self.refund
    }

    /// Refund confirmations received while no refund was outstanding.
    pub fn refund_notices(&self) -> &[RefundNotice] {
        &self.refund_notices
    }

    /// Returns true if a completed refund with this id is already on the saga.
    pub fn has_recorded_refund(&self, refund_id: &str) -> bool {
        let settled = matches!(
            &self.refund,
            RefundState::Completed { refund_id: id, .. } if id == refund_id
        );
        settled
            || self.refund_notices.iter().any(|notice| {
                matches!(notice, RefundNotice::Completed { refund_id: id, .. } if id == refund_id)
            })
    }

    pub fn shipment(&self) -> Option<&Shipment> {
        self.shipment.as_ref()
    }

    pub fn delivery_attempts(&self) -> &[DeliveryAttempt] {
        &self.delivery_attempts
    }

    /// Returns true if the delivery was already applied.
    pub fn has_processed(&self, message_id: MessageId) -> bool {
        self.processed_messages.contains(&message_id)
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Both sides are confirmed and fulfillment has not been asked for yet.
    pub fn is_ready_to_fulfill(&self) -> bool {
        self.failure.is_none()
            && !self.fulfillment_requested
            && self.is_payment_captured
            && self.is_inventory_committed()
    }

    /// True while a release or refund has been requested and not answered.
    pub fn has_outstanding_compensation(&self) -> bool {
        self.reservations
            .values()
            .any(TrackedReservation::is_release_outstanding)
            || matches!(self.refund, RefundState::Requested { .. })
    }
}

// State helpers used by the decider
impl OrderSaga {
    pub(crate) fn from_checkout(checkout: ValidatedCheckout, now: DateTime<Utc>) -> Self {
        Self {
            id: checkout.order_id,
            customer_id: checkout.customer_id,
            line_items: checkout.line_items,
            shipping_address: checkout.shipping_address,
            shipping_method: checkout.shipping_method,
            shipping_cost: checkout.shipping_cost,
            payment_method_token: checkout.payment_method_token,
            total_amount: checkout.total_amount,
            placed_at: now,
            status: OrderStatus::Placed,
            status_since: now,
            reservations: BTreeMap::new(),
            is_inventory_reserved: false,
            payment_id: None,
            is_payment_authorized: false,
            is_payment_captured: false,
            captured_amount: None,
            fulfillment_requested: false,
            failure: None,
            refund: RefundState::NotRequested,
            refund_notices: Vec::new(),
            shipment: None,
            delivery_attempts: Vec::new(),
            stuck_reported_for: None,
            processed_messages: BTreeSet::new(),
        }
    }

    /// Moves along the happy path if the ranking allows it.
    pub(crate) fn advance_to(&mut self, target: OrderStatus, now: DateTime<Utc>) -> bool {
        if !self.status.can_advance_to(target) {
            return false;
        }
        self.set_status(target, now);
        true
    }

    pub(crate) fn set_status(&mut self, status: OrderStatus, now: DateTime<Utc>) {
        if self.status != status {
            self.status = status;
            self.status_since = now;
        }
    }

    /// Starts tracking a reservation. Returns false if it was already tracked.
    pub(crate) fn track_reservation(&mut self, id: ReservationId, sku: Sku) -> bool {
        if self.reservations.contains_key(&id) {
            return false;
        }
        self.reservations.insert(id, TrackedReservation::new(sku));
        self.is_inventory_reserved = true;
        true
    }

    pub(crate) fn reservation_mut(&mut self, id: &ReservationId) -> Option<&mut TrackedReservation> {
        self.reservations.get_mut(id)
    }

    pub(crate) fn reservations_mut(
        &mut self,
    ) -> impl Iterator<Item = (&ReservationId, &mut TrackedReservation)> {
        self.reservations.iter_mut()
    }

    /// Amount to hand back: what was captured, else the order total.
    pub(crate) fn refundable_amount(&self) -> Money {
        self.captured_amount.unwrap_or(self.total_amount)
    }

    pub(crate) fn mark_processed(&mut self, message_id: MessageId) {
        self.processed_messages.insert(message_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn saga() -> OrderSaga {
        let checkout = ValidatedCheckout {
            order_id: OrderId::new(),
            customer_id: CustomerId::new(),
            line_items: vec![LineItem::new("SKU-001", 1, Money::from_cents(1000)).unwrap()],
            shipping_address: ShippingAddress {
                recipient: "Grace Hopper".to_string(),
                line1: "1 Navy Way".to_string(),
                line2: None,
                city: "Arlington".to_string(),
                region: Some("VA".to_string()),
                postal_code: "22202".to_string(),
                country: "US".to_string(),
            },
            shipping_method: ShippingMethod::Standard,
            shipping_cost: Money::from_cents(500),
            payment_method_token: PaymentMethodToken::new("tok_1"),
            total_amount: Money::from_cents(1500),
        };
        OrderSaga::from_checkout(checkout, Utc::now())
    }

    #[test]
    fn test_new_saga_is_placed() {
        let saga = saga();
        assert_eq!(saga.status(), OrderStatus::Placed);
        assert_eq!(saga.status_since(), saga.placed_at());
        assert!(!saga.is_inventory_reserved());
        assert!(!saga.is_payment_captured());
        assert!(!saga.has_outstanding_compensation());
    }

    #[test]
    fn test_inventory_committed_needs_every_reservation() {
        let mut saga = saga();
        assert!(!saga.is_inventory_committed());

        saga.track_reservation(ReservationId::new("r1"), Sku::new("SKU-001"));
        saga.track_reservation(ReservationId::new("r2"), Sku::new("SKU-001"));
        saga.reservation_mut(&ReservationId::new("r1")).unwrap().committed = true;
        assert!(!saga.is_inventory_committed());

        saga.reservation_mut(&ReservationId::new("r2")).unwrap().committed = true;
        assert!(saga.is_inventory_committed());
    }

    #[test]
    fn test_inventory_committed_needs_every_sku() {
        let mut saga = saga();
        let extra_line = LineItem::new("SKU-002", 1, Money::from_cents(2000)).unwrap();
        saga.line_items.push(extra_line);

        saga.track_reservation(ReservationId::new("r1"), Sku::new("SKU-001"));
        saga.reservation_mut(&ReservationId::new("r1")).unwrap().committed = true;
        assert!(!saga.is_inventory_committed());

        saga.track_reservation(ReservationId::new("r2"), Sku::new("SKU-002"));
        saga.reservation_mut(&ReservationId::new("r2")).unwrap().committed = true;
        assert!(saga.is_inventory_committed());
    }

    #[test]
    fn test_unrelated_sku_does_not_cover_an_order_line() {
        let mut saga = saga();
        saga.track_reservation(ReservationId::new("r1"), Sku::new("SKU-999"));
        saga.reservation_mut(&ReservationId::new("r1")).unwrap().committed = true;
        assert!(!saga.is_inventory_committed());
    }

    #[test]
    fn test_track_reservation_is_idempotent() {
        let mut saga = saga();
        assert!(saga.track_reservation(ReservationId::new("r1"), Sku::new("SKU-001")));
        assert!(!saga.track_reservation(ReservationId::new("r1"), Sku::new("SKU-001")));
        assert_eq!(saga.reservation_count(), 1);
    }

    #[test]
    fn test_set_status_only_restamps_on_change() {
        let mut saga = saga();
        let later = saga.placed_at() + chrono::Duration::minutes(5);

        saga.set_status(OrderStatus::Placed, later);
        assert_eq!(saga.status_since(), saga.placed_at());

        assert!(saga.advance_to(OrderStatus::PendingPayment, later));
        assert_eq!(saga.status_since(), later);
    }

    #[test]
    fn test_refund_outstanding_counts_as_compensation() {
        let mut saga = saga();
        saga.refund = RefundState::Requested {
            amount: Money::from_cents(1500),
        };
        assert!(saga.has_outstanding_compensation());
    }

    #[test]
    fn test_round_trips_through_json() {
        let mut saga = saga();
        saga.track_reservation(ReservationId::new("r1"), Sku::new("SKU-001"));
        saga.mark_processed(MessageId::new());

        let json = serde_json::to_value(&saga).unwrap();
        let back: OrderSaga = serde_json::from_value(json).unwrap();
        assert_eq!(back, saga);
    }
}
