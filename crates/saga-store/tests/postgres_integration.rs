//! PostgreSQL integration tests
//!
//! These tests share one PostgreSQL container and need Docker, so they are
//! ignored by default. Run with:
//!
//! ```bash
//! cargo test -p saga-store --test postgres_integration -- --ignored
//! ```

use std::sync::Arc;

use chrono::{Duration, Utc};
use futures_util::StreamExt;
use saga_store::{
    OrderId, OutboxMessage, PostgresSagaStore, SagaQuery, SagaRecord, SagaStore, SagaStoreError,
    SagaStoreExt, Version,
};
use serial_test::serial;
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let store = PostgresSagaStore::connect(&connection_string).await.unwrap();
            store.run_migrations().await.unwrap();
            store.pool().close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh store with its own pool and cleared tables
async fn get_test_store() -> PostgresSagaStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    clear_tables(&pool).await;
    PostgresSagaStore::new(pool)
}

async fn clear_tables(pool: &PgPool) {
    sqlx::query("TRUNCATE TABLE order_sagas, archived_order_sagas, outbox_messages")
        .execute(pool)
        .await
        .unwrap();
}

fn create_record(order_id: OrderId, status: &str) -> SagaRecord {
    SagaRecord::from_state(
        order_id,
        "OrderSaga",
        status,
        Utc::now(),
        &serde_json::json!({"status": status}),
    )
    .unwrap()
}

fn create_message(order_id: OrderId, message_type: &str) -> OutboxMessage {
    OutboxMessage::builder()
        .message_type(message_type)
        .correlation_id(order_id)
        .payload_raw(serde_json::json!({"order_id": order_id}))
        .metadata("causation_id", serde_json::json!("test"))
        .build()
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn test_save_and_load_saga() {
    let store = get_test_store().await;
    let order_id = OrderId::new();

    let version = store
        .save(
            create_record(order_id, "Placed"),
            Version::initial(),
            vec![create_message(order_id, "OrderPlaced")],
        )
        .await
        .unwrap();
    assert_eq!(version, Version::first());

    let loaded = store.load_required(order_id).await.unwrap();
    assert_eq!(loaded.version, Version::first());
    assert_eq!(loaded.status, "Placed");
    assert_eq!(loaded.state["status"], "Placed");

    let outbox = store.outbox_for(order_id).await.unwrap();
    assert_eq!(outbox.len(), 1);
    assert_eq!(outbox[0].message_type, "OrderPlaced");
    assert_eq!(
        outbox[0].metadata.get("causation_id"),
        Some(&serde_json::json!("test"))
    );
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn test_stale_version_is_a_conflict_and_writes_nothing() {
    let store = get_test_store().await;
    let order_id = OrderId::new();

    store
        .save(create_record(order_id, "Placed"), Version::initial(), vec![])
        .await
        .unwrap();

    let result = store
        .save(
            create_record(order_id, "PendingPayment"),
            Version::initial(),
            vec![create_message(order_id, "Lost")],
        )
        .await;

    assert!(matches!(
        result,
        Err(SagaStoreError::ConcurrencyConflict { .. })
    ));
    assert!(store.outbox_for(order_id).await.unwrap().is_empty());
    assert_eq!(store.load_required(order_id).await.unwrap().status, "Placed");
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn test_concurrent_writers_only_one_wins() {
    let store = get_test_store().await;
    let order_id = OrderId::new();

    store
        .save(create_record(order_id, "Placed"), Version::initial(), vec![])
        .await
        .unwrap();

    let a = store.clone();
    let b = store.clone();
    let (ra, rb) = tokio::join!(
        a.save(create_record(order_id, "PendingPayment"), Version::first(), vec![]),
        b.save(create_record(order_id, "InventoryReserved"), Version::first(), vec![]),
    );

    let wins = [ra.is_ok(), rb.is_ok()].iter().filter(|ok| **ok).count();
    assert_eq!(wins, 1);
    assert_eq!(
        store.load_required(order_id).await.unwrap().version,
        Version::new(2)
    );
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn test_archive_moves_saga() {
    let store = get_test_store().await;
    let order_id = OrderId::new();

    store
        .save(create_record(order_id, "Shipped"), Version::initial(), vec![])
        .await
        .unwrap();
    store
        .archive(create_record(order_id, "Delivered"), Version::first(), vec![])
        .await
        .unwrap();

    assert!(store.load(order_id).await.unwrap().is_none());
    let archived = store.load_archived(order_id).await.unwrap().unwrap();
    assert_eq!(archived.status, "Delivered");
    assert_eq!(archived.version, Version::new(2));
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn test_query_stalled_sagas() {
    let store = get_test_store().await;
    let now = Utc::now();
    let stalled = OrderId::new();
    let fresh = OrderId::new();

    let mut old_record = create_record(stalled, "PendingPayment");
    old_record.status_since = now - Duration::hours(10);
    store.save(old_record, Version::initial(), vec![]).await.unwrap();
    store
        .save(create_record(fresh, "Placed"), Version::initial(), vec![])
        .await
        .unwrap();

    let results = store
        .query_sagas(
            SagaQuery::stalled_since(now - Duration::hours(6))
                .exclude_status("Cancelled")
                .limit(10),
        )
        .await
        .unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].order_id, stalled);
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn test_outbox_dispatch_cycle() {
    let store = get_test_store().await;
    let order_id = OrderId::new();
    let first = create_message(order_id, "First");
    let first_id = first.message_id;

    store
        .save(
            create_record(order_id, "Placed"),
            Version::initial(),
            vec![first, create_message(order_id, "Second")],
        )
        .await
        .unwrap();

    let pending: Vec<_> = store.pending_outbox(10).await.unwrap().collect().await;
    assert_eq!(pending.len(), 2);
    assert_eq!(pending[0].as_ref().unwrap().message_type, "First");

    store.mark_dispatched(&[first_id], Utc::now()).await.unwrap();

    let pending: Vec<_> = store.pending_outbox(10).await.unwrap().collect().await;
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].as_ref().unwrap().message_type, "Second");
}
