use chrono::Utc;
use criterion::{Criterion, criterion_group, criterion_main};
use futures_util::StreamExt;
use saga_store::{InMemorySagaStore, OrderId, OutboxMessage, SagaRecord, SagaStore, Version};

fn make_record(order_id: OrderId) -> SagaRecord {
    SagaRecord::from_state(
        order_id,
        "OrderSaga",
        "Placed",
        Utc::now(),
        &serde_json::json!({
            "id": order_id.to_string(),
            "status": "Placed",
            "line_items": [{"sku": "SKU-001", "quantity": 2, "unit_price": 1999}]
        }),
    )
    .unwrap()
}

fn make_message(order_id: OrderId) -> OutboxMessage {
    OutboxMessage::builder()
        .message_type("OrderPlaced")
        .correlation_id(order_id)
        .payload_raw(serde_json::json!({"order_id": order_id.to_string()}))
        .build()
}

fn bench_save_new_saga(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("saga_store/save_new_saga", |b| {
        b.iter(|| {
            rt.block_on(async {
                let store = InMemorySagaStore::new();
                let order_id = OrderId::new();
                store
                    .save(
                        make_record(order_id),
                        Version::initial(),
                        vec![make_message(order_id)],
                    )
                    .await
                    .unwrap();
            });
        });
    });
}

fn bench_save_existing_saga(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemorySagaStore::new();
    let order_id = OrderId::new();
    let mut version = rt.block_on(async {
        store
            .save(make_record(order_id), Version::initial(), vec![])
            .await
            .unwrap()
    });

    c.bench_function("saga_store/save_existing_saga", |b| {
        b.iter(|| {
            version = rt.block_on(async {
                store
                    .save(make_record(order_id), version, vec![make_message(order_id)])
                    .await
                    .unwrap()
            });
        });
    });
}

fn bench_drain_pending_outbox(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemorySagaStore::new();

    rt.block_on(async {
        for _ in 0..1000 {
            let order_id = OrderId::new();
            store
                .save(
                    make_record(order_id),
                    Version::initial(),
                    vec![make_message(order_id)],
                )
                .await
                .unwrap();
        }
    });

    c.bench_function("saga_store/stream_1000_pending", |b| {
        b.iter(|| {
            rt.block_on(async {
                let mut stream = store.pending_outbox(1000).await.unwrap();
                let mut count = 0;
                while let Some(result) = stream.next().await {
                    result.unwrap();
                    count += 1;
                }
                assert_eq!(count, 1000);
            });
        });
    });
}

criterion_group!(
    benches,
    bench_save_new_saga,
    bench_save_existing_saga,
    bench_drain_pending_outbox,
);
criterion_main!(benches);
