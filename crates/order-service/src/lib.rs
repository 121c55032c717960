//! HTTP service hosting the order saga.
//!
//! Exposes order status lookups and an inbound message endpoint, with
//! structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use saga_runtime::{OrderQueries, RuntimeConfig, SagaRuntime};
use saga_store::SagaStore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state accessible from all handlers.
pub struct AppState<S: SagaStore> {
    pub runtime: Arc<SagaRuntime<S>>,
    pub queries: OrderQueries<S>,
}

/// Creates the application state over a saga store.
pub fn create_state<S: SagaStore + Clone + 'static>(
    store: S,
    config: RuntimeConfig,
) -> Arc<AppState<S>> {
    Arc::new(AppState {
        runtime: Arc::new(SagaRuntime::new(store.clone(), config)),
        queries: OrderQueries::new(store),
    })
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: SagaStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/orders/{id}", get(routes::orders::get::<S>))
        .route("/messages", post(routes::messages::post::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
