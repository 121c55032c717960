//! Read side: order status lookups.

use chrono::{DateTime, Utc};
use common::{CustomerId, OrderId};
use order_saga::{LineItem, Money, OrderSaga, OrderStatus, ShippingAddress, ShippingMethod};
use saga_store::{SagaStore, SagaStoreExt};
use serde::Serialize;

use crate::error::{Result, RuntimeError};

/// What the outside world sees of an order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderView {
    pub order_id: OrderId,
    pub customer_id: CustomerId,
    pub line_items: Vec<LineItem>,
    pub shipping_address: ShippingAddress,
    pub shipping_method: ShippingMethod,
    pub total_amount: Money,
    pub status: OrderStatus,
    pub status_since: DateTime<Utc>,
    pub placed_at: DateTime<Utc>,
}

impl From<&OrderSaga> for OrderView {
    fn from(saga: &OrderSaga) -> Self {
        Self {
            order_id: saga.id(),
            customer_id: saga.customer_id(),
            line_items: saga.line_items().to_vec(),
            shipping_address: saga.shipping_address().clone(),
            shipping_method: saga.shipping_method(),
            total_amount: saga.total_amount(),
            status: saga.status(),
            status_since: saga.status_since(),
            placed_at: saga.placed_at(),
        }
    }
}

/// Order lookups over the saga store.
#[derive(Debug, Clone)]
pub struct OrderQueries<S> {
    store: S,
}

impl<S: SagaStore> OrderQueries<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Looks up an order, live or archived.
    pub async fn get_order(&self, order_id: OrderId) -> Result<OrderView> {
        let record = self
            .store
            .lookup(order_id)
            .await?
            .ok_or(RuntimeError::OrderNotFound(order_id))?
            .into_record();

        let saga: OrderSaga = record.into_state()?;
        Ok(OrderView::from(&saga))
    }
}
