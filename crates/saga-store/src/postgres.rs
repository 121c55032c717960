use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use uuid::Uuid;

use crate::{
    MessageId, OrderId, OutboxMessage, Result, SagaQuery, SagaRecord, SagaStoreError, Version,
    store::{OutboxStream, SagaStore, validate_outbox},
};

const SAGA_COLUMNS: &str =
    "order_id, saga_type, version, status, status_since, updated_at, state";

/// PostgreSQL-backed saga store.
///
/// Live sagas live in `order_sagas`, finished ones in `archived_order_sagas`,
/// and produced messages in `outbox_messages`. Every write takes a row lock
/// on the live saga before checking its version.
#[derive(Clone)]
pub struct PostgresSagaStore {
    pool: PgPool,
}

impl PostgresSagaStore {
    /// Creates a new PostgreSQL saga store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects to `database_url` and returns a store over the new pool.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_record(row: PgRow) -> Result<SagaRecord> {
        Ok(SagaRecord {
            order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
            saga_type: row.try_get("saga_type")?,
            version: Version::new(row.try_get("version")?),
            status: row.try_get("status")?,
            status_since: row.try_get::<DateTime<Utc>, _>("status_since")?,
            updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
            state: row.try_get("state")?,
        })
    }

    fn row_to_message(row: PgRow) -> Result<OutboxMessage> {
        let metadata_json: serde_json::Value = row.try_get("metadata")?;
        let metadata: HashMap<String, serde_json::Value> = serde_json::from_value(metadata_json)?;

        Ok(OutboxMessage {
            message_id: MessageId::from_uuid(row.try_get::<Uuid, _>("message_id")?),
            message_type: row.try_get("message_type")?,
            correlation_id: OrderId::from_uuid(row.try_get::<Uuid, _>("correlation_id")?),
            created_at: row.try_get("created_at")?,
            payload: row.try_get("payload")?,
            metadata,
            dispatched_at: row.try_get("dispatched_at")?,
        })
    }

    /// Locks the live row and verifies its version.
    async fn check_version(
        tx: &mut Transaction<'_, Postgres>,
        order_id: OrderId,
        expected: Version,
    ) -> Result<()> {
        let current: Option<i64> =
            sqlx::query_scalar("SELECT version FROM order_sagas WHERE order_id = $1 FOR UPDATE")
                .bind(order_id.as_uuid())
                .fetch_optional(&mut **tx)
                .await?;

        let actual = Version::new(current.unwrap_or(0));
        if actual != expected {
            return Err(SagaStoreError::ConcurrencyConflict {
                order_id,
                expected,
                actual,
            });
        }
        Ok(())
    }

    async fn insert_outbox(
        tx: &mut Transaction<'_, Postgres>,
        outbox: &[OutboxMessage],
    ) -> Result<()> {
        for message in outbox {
            let metadata_json = serde_json::to_value(&message.metadata)?;

            sqlx::query(
                r#"
                INSERT INTO outbox_messages (message_id, message_type, correlation_id, created_at, payload, metadata)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(message.message_id.as_uuid())
            .bind(&message.message_type)
            .bind(message.correlation_id.as_uuid())
            .bind(message.created_at)
            .bind(&message.payload)
            .bind(metadata_json)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }

    /// Maps a primary-key violation on insert of a new saga to a conflict.
    fn map_insert_error(e: sqlx::Error, order_id: OrderId, expected: Version) -> SagaStoreError {
        if let sqlx::Error::Database(ref db_err) = e
            && db_err.constraint() == Some("order_sagas_pkey")
        {
            return SagaStoreError::ConcurrencyConflict {
                order_id,
                expected,
                actual: Version::first(),
            };
        }
        SagaStoreError::Database(e)
    }
}

#[async_trait]
impl SagaStore for PostgresSagaStore {
    async fn load(&self, order_id: OrderId) -> Result<Option<SagaRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {SAGA_COLUMNS} FROM order_sagas WHERE order_id = $1"
        ))
        .bind(order_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_record).transpose()
    }

    async fn save(
        &self,
        record: SagaRecord,
        expected: Version,
        outbox: Vec<OutboxMessage>,
    ) -> Result<Version> {
        validate_outbox(&record, &outbox)?;

        let order_id = record.order_id;
        let version = expected.next();
        let mut tx = self.pool.begin().await?;

        Self::check_version(&mut tx, order_id, expected).await?;

        if expected == Version::initial() {
            sqlx::query(
                r#"
                INSERT INTO order_sagas (order_id, saga_type, version, status, status_since, updated_at, state)
                VALUES ($1, $2, $3, $4, $5, NOW(), $6)
                "#,
            )
            .bind(order_id.as_uuid())
            .bind(&record.saga_type)
            .bind(version.as_i64())
            .bind(&record.status)
            .bind(record.status_since)
            .bind(&record.state)
            .execute(&mut *tx)
            .await
            .map_err(|e| Self::map_insert_error(e, order_id, expected))?;
        } else {
            sqlx::query(
                r#"
                UPDATE order_sagas
                SET version = $2, status = $3, status_since = $4, updated_at = NOW(), state = $5
                WHERE order_id = $1
                "#,
            )
            .bind(order_id.as_uuid())
            .bind(version.as_i64())
            .bind(&record.status)
            .bind(record.status_since)
            .bind(&record.state)
            .execute(&mut *tx)
            .await?;
        }

        Self::insert_outbox(&mut tx, &outbox).await?;
        tx.commit().await?;

        tracing::debug!(%order_id, %version, outbox = outbox.len(), "Saved saga");
        Ok(version)
    }

    async fn archive(
        &self,
        record: SagaRecord,
        expected: Version,
        outbox: Vec<OutboxMessage>,
    ) -> Result<Version> {
        validate_outbox(&record, &outbox)?;

        let order_id = record.order_id;
        let version = expected.next();
        let mut tx = self.pool.begin().await?;

        Self::check_version(&mut tx, order_id, expected).await?;

        sqlx::query("DELETE FROM order_sagas WHERE order_id = $1")
            .bind(order_id.as_uuid())
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO archived_order_sagas (order_id, saga_type, version, status, status_since, updated_at, state)
            VALUES ($1, $2, $3, $4, $5, NOW(), $6)
            ON CONFLICT (order_id) DO UPDATE SET
                version = EXCLUDED.version,
                status = EXCLUDED.status,
                status_since = EXCLUDED.status_since,
                updated_at = EXCLUDED.updated_at,
                state = EXCLUDED.state
            "#,
        )
        .bind(order_id.as_uuid())
        .bind(&record.saga_type)
        .bind(version.as_i64())
        .bind(&record.status)
        .bind(record.status_since)
        .bind(&record.state)
        .execute(&mut *tx)
        .await?;

        Self::insert_outbox(&mut tx, &outbox).await?;
        tx.commit().await?;

        tracing::debug!(%order_id, %version, "Archived saga");
        Ok(version)
    }

    async fn load_archived(&self, order_id: OrderId) -> Result<Option<SagaRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {SAGA_COLUMNS} FROM archived_order_sagas WHERE order_id = $1"
        ))
        .bind(order_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_record).transpose()
    }

    async fn query_sagas(&self, query: SagaQuery) -> Result<Vec<SagaRecord>> {
        let mut sql = format!("SELECT {SAGA_COLUMNS} FROM order_sagas WHERE 1=1");
        let mut param_count = 0;

        // Build dynamic query
        if query.statuses.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND status = ANY(${param_count})"));
        }
        if !query.excluded_statuses.is_empty() {
            param_count += 1;
            sql.push_str(&format!(" AND NOT (status = ANY(${param_count}))"));
        }
        if query.status_since_before.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND status_since <= ${param_count}"));
        }

        sql.push_str(" ORDER BY status_since ASC, order_id ASC");

        if query.limit.is_some() {
            param_count += 1;
            sql.push_str(&format!(" LIMIT ${param_count}"));
        }
        if query.offset.is_some() {
            param_count += 1;
            sql.push_str(&format!(" OFFSET ${param_count}"));
        }

        let mut sqlx_query = sqlx::query(&sql);

        if let Some(statuses) = query.statuses {
            sqlx_query = sqlx_query.bind(statuses);
        }
        if !query.excluded_statuses.is_empty() {
            sqlx_query = sqlx_query.bind(query.excluded_statuses);
        }
        if let Some(cutoff) = query.status_since_before {
            sqlx_query = sqlx_query.bind(cutoff);
        }
        if let Some(limit) = query.limit {
            sqlx_query = sqlx_query.bind(limit as i64);
        }
        if let Some(offset) = query.offset {
            sqlx_query = sqlx_query.bind(offset as i64);
        }

        let rows = sqlx_query.fetch_all(&self.pool).await?;
        rows.into_iter().map(Self::row_to_record).collect()
    }

    async fn pending_outbox(&self, limit: usize) -> Result<OutboxStream> {
        use futures_util::stream;

        let rows = sqlx::query(
            r#"
            SELECT message_id, message_type, correlation_id, created_at, payload, metadata, dispatched_at
            FROM outbox_messages
            WHERE dispatched_at IS NULL
            ORDER BY sequence ASC
            LIMIT $1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        // Rows are materialized so the stream does not borrow the pool
        let messages: Vec<Result<OutboxMessage>> =
            rows.into_iter().map(Self::row_to_message).collect();
        Ok(Box::pin(stream::iter(messages)))
    }

    async fn mark_dispatched(&self, message_ids: &[MessageId], at: DateTime<Utc>) -> Result<()> {
        let ids: Vec<Uuid> = message_ids.iter().map(MessageId::as_uuid).collect();

        sqlx::query(
            "UPDATE outbox_messages SET dispatched_at = $2 WHERE message_id = ANY($1) AND dispatched_at IS NULL",
        )
        .bind(ids)
        .bind(at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn outbox_for(&self, order_id: OrderId) -> Result<Vec<OutboxMessage>> {
        let rows = sqlx::query(
            r#"
            SELECT message_id, message_type, correlation_id, created_at, payload, metadata, dispatched_at
            FROM outbox_messages
            WHERE correlation_id = $1
            ORDER BY sequence ASC
            "#,
        )
        .bind(order_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_message).collect()
    }
}
