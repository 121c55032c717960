use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::{
    MessageId, OrderId, OutboxMessage, Result, SagaQuery, SagaRecord, SagaStoreError, Version,
    store::{OutboxStream, SagaStore, validate_outbox},
};

#[derive(Default)]
struct Tables {
    live: HashMap<OrderId, SagaRecord>,
    archived: HashMap<OrderId, SagaRecord>,
    outbox: Vec<OutboxMessage>,
}

impl Tables {
    fn check_version(&self, order_id: OrderId, expected: Version) -> Result<()> {
        let actual = self
            .live
            .get(&order_id)
            .map(|r| r.version)
            .unwrap_or(Version::initial());

        if actual != expected {
            return Err(SagaStoreError::ConcurrencyConflict {
                order_id,
                expected,
                actual,
            });
        }
        Ok(())
    }
}

/// In-memory saga store.
///
/// Provides the same interface and atomicity as the PostgreSQL store.
/// All tables sit behind one lock so a save is a single critical section.
#[derive(Clone, Default)]
pub struct InMemorySagaStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemorySagaStore {
    /// Creates a new empty in-memory saga store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of live sagas.
    pub async fn live_count(&self) -> usize {
        self.tables.read().await.live.len()
    }

    /// Returns the number of outbox messages, dispatched or not.
    pub async fn outbox_len(&self) -> usize {
        self.tables.read().await.outbox.len()
    }

    /// Clears all sagas and outbox messages.
    pub async fn clear(&self) {
        let mut tables = self.tables.write().await;
        tables.live.clear();
        tables.archived.clear();
        tables.outbox.clear();
    }
}

#[async_trait]
impl SagaStore for InMemorySagaStore {
    async fn load(&self, order_id: OrderId) -> Result<Option<SagaRecord>> {
        Ok(self.tables.read().await.live.get(&order_id).cloned())
    }

    async fn save(
        &self,
        mut record: SagaRecord,
        expected: Version,
        outbox: Vec<OutboxMessage>,
    ) -> Result<Version> {
        validate_outbox(&record, &outbox)?;

        let mut tables = self.tables.write().await;
        tables.check_version(record.order_id, expected)?;

        let version = expected.next();
        record.version = version;
        record.updated_at = Utc::now();
        tables.live.insert(record.order_id, record);
        tables.outbox.extend(outbox);

        Ok(version)
    }

    async fn archive(
        &self,
        mut record: SagaRecord,
        expected: Version,
        outbox: Vec<OutboxMessage>,
    ) -> Result<Version> {
        validate_outbox(&record, &outbox)?;

        let mut tables = self.tables.write().await;
        tables.check_version(record.order_id, expected)?;

        let version = expected.next();
        record.version = version;
        record.updated_at = Utc::now();
        tables.live.remove(&record.order_id);
        tables.archived.insert(record.order_id, record);
        tables.outbox.extend(outbox);

        Ok(version)
    }

    async fn load_archived(&self, order_id: OrderId) -> Result<Option<SagaRecord>> {
        Ok(self.tables.read().await.archived.get(&order_id).cloned())
    }

    async fn query_sagas(&self, query: SagaQuery) -> Result<Vec<SagaRecord>> {
        let tables = self.tables.read().await;
        let mut records: Vec<_> = tables
            .live
            .values()
            .filter(|r| query.matches(&r.status, r.status_since))
            .cloned()
            .collect();

        records.sort_by(|a, b| {
            a.status_since
                .cmp(&b.status_since)
                .then(a.order_id.cmp(&b.order_id))
        });

        let records = records.into_iter().skip(query.offset.unwrap_or(0));
        let records = match query.limit {
            Some(limit) => records.take(limit).collect(),
            None => records.collect(),
        };

        Ok(records)
    }

    async fn pending_outbox(&self, limit: usize) -> Result<OutboxStream> {
        use futures_util::stream;

        let tables = self.tables.read().await;
        let pending: Vec<_> = tables
            .outbox
            .iter()
            .filter(|m| m.is_pending())
            .take(limit)
            .cloned()
            .collect();

        Ok(Box::pin(stream::iter(pending.into_iter().map(Ok))))
    }

    async fn mark_dispatched(&self, message_ids: &[MessageId], at: DateTime<Utc>) -> Result<()> {
        let mut tables = self.tables.write().await;
        for message in tables
            .outbox
            .iter_mut()
            .filter(|m| m.is_pending() && message_ids.contains(&m.message_id))
        {
            message.dispatched_at = Some(at);
        }
        Ok(())
    }

    async fn outbox_for(&self, order_id: OrderId) -> Result<Vec<OutboxMessage>> {
        let tables = self.tables.read().await;
        Ok(tables
            .outbox
            .iter()
            .filter(|m| m.correlation_id == order_id)
            .cloned()
            .collect())
    }
}
