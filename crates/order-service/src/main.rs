//! Order service entry point.

use metrics_exporter_prometheus::PrometheusHandle;
use order_service::config::{LogFormat, ServiceConfig};
use saga_runtime::{LoggingMessageBus, OutboxDispatcher, StuckSagaMonitor};
use saga_store::{InMemorySagaStore, PostgresSagaStore, SagaStore};
use tokio::signal;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

fn init_tracing(config: &ServiceConfig) {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    match config.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

#[tokio::main]
async fn main() {
    let config = ServiceConfig::from_env();

    // 1. Initialize tracing
    init_tracing(&config);

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 3. Pick the saga store
    match config.database_url.clone() {
        Some(url) => {
            let store = PostgresSagaStore::connect(&url)
                .await
                .expect("failed to connect to database");
            store
                .run_migrations()
                .await
                .expect("failed to run migrations");
            tracing::info!("using Postgres saga store");
            serve(store, config, metrics_handle).await;
        }
        None => {
            tracing::warn!("DATABASE_URL not set, sagas are kept in memory only");
            serve(InMemorySagaStore::new(), config, metrics_handle).await;
        }
    }
}

async fn serve<S: SagaStore + Clone + 'static>(
    store: S,
    config: ServiceConfig,
    metrics_handle: PrometheusHandle,
) {
    let state = order_service::create_state(store.clone(), config.runtime.clone());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // 4. Start background workers
    let dispatcher = OutboxDispatcher::new(store, LoggingMessageBus, &config.runtime);
    let dispatcher_shutdown = shutdown_rx.clone();
    let dispatcher_task = tokio::spawn(async move { dispatcher.run(dispatcher_shutdown).await });

    let monitor = StuckSagaMonitor::new(state.runtime.clone());
    let monitor_task = tokio::spawn(async move { monitor.run(shutdown_rx).await });

    // 5. Build the application
    let app = order_service::create_app(state, metrics_handle);

    // 6. Start server
    let addr = config.addr();
    tracing::info!(%addr, "starting order service");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    // 7. Stop background workers
    let _ = shutdown_tx.send(true);
    let _ = tokio::join!(dispatcher_task, monitor_task);

    tracing::info!("server shut down gracefully");
}
