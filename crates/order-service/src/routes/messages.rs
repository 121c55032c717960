//! Inbound message endpoint.
//!
//! Lets the other services (or an operator) hand a delivery to the saga
//! runtime over HTTP. The body is an `InboundEnvelope`.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use order_saga::InboundEnvelope;
use saga_runtime::HandleOutcome;
use saga_store::SagaStore;

use crate::AppState;
use crate::error::ApiError;

/// POST /messages: apply one delivery and report what it did.
///
/// Duplicates, ignored messages and late messages for archived sagas are
/// all accepted; only refused messages are errors.
#[tracing::instrument(skip_all)]
pub async fn post<S: SagaStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(envelope): Json<InboundEnvelope>,
) -> Result<(StatusCode, Json<HandleOutcome>), ApiError> {
    let outcome = state.runtime.handle(envelope).await?;
    Ok((StatusCode::ACCEPTED, Json(outcome)))
}
