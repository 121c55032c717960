//! Order status endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use order_saga::OrderId;
use saga_runtime::OrderView;
use saga_store::SagaStore;

use crate::AppState;
use crate::error::ApiError;

/// GET /orders/{id}: current view of an order, live or archived.
#[tracing::instrument(skip(state))]
pub async fn get<S: SagaStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderView>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let view = state.queries.get_order(order_id).await?;
    Ok(Json(view))
}

fn parse_order_id(id: &str) -> Result<OrderId, ApiError> {
    id.parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid order ID '{id}': {e}")))
}
