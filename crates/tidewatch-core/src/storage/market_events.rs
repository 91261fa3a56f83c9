//! Repository for marketplace event rows.

use std::sync::Arc;

use sqlx::PgPool;

use crate::{
    error::Result,
    models::{CollectionKey, EventId, EventKind, MarketEvent},
};

/// Database access for observed marketplace events.
#[derive(Debug)]
pub struct Repository {
    pool: Arc<PgPool>,
}

impl Repository {
    /// Creates a new repository over the shared pool.
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Most recently created event persisted for a (collection, kind) pair.
    ///
    /// This is the watermark query: the returned event's `created_at` becomes
    /// the lower bound of the next sync window.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails or a stored payload does not decode.
    pub async fn most_recent(
        &self,
        collection: &CollectionKey,
        kind: EventKind,
    ) -> Result<Option<MarketEvent>> {
        let row: Option<(serde_json::Value,)> = sqlx::query_as(
            r#"
            SELECT payload FROM market_events
            WHERE collection_key = $1 AND event_kind = $2
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(collection.as_str())
        .bind(kind.as_str())
        .fetch_optional(&*self.pool)
        .await?;

        row.map(|(payload,)| serde_json::from_value(payload).map_err(Into::into)).transpose()
    }

    /// Fetches the stored events whose ids appear in `ids`.
    ///
    /// Used for cross-run dedup: the engine drops any fetched event whose id
    /// comes back from this lookup.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails or a stored payload does not decode.
    pub async fn find_by_ids(&self, ids: &[EventId]) -> Result<Vec<MarketEvent>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let raw: Vec<String> = ids.iter().map(|id| id.0.clone()).collect();
        let rows: Vec<(serde_json::Value,)> =
            sqlx::query_as("SELECT payload FROM market_events WHERE id = ANY($1)")
                .bind(&raw)
                .fetch_all(&*self.pool)
                .await?;

        rows.into_iter().map(|(payload,)| serde_json::from_value(payload).map_err(Into::into)).collect()
    }

    /// Upserts a batch of events in one transaction.
    ///
    /// Idempotent by id: re-upserting an already-stored event overwrites its
    /// row in place and never duplicates it.
    ///
    /// # Errors
    ///
    /// Returns error if the transaction fails; no partial batch is committed.
    pub async fn upsert_all(&self, events: &[MarketEvent]) -> Result<()> {
        if events.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;

        for event in events {
            let payload = serde_json::to_value(event)?;
            sqlx::query(
                r#"
                INSERT INTO market_events (id, collection_key, event_kind, created_at, payload)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (id) DO UPDATE
                SET created_at = EXCLUDED.created_at, payload = EXCLUDED.payload
                "#,
            )
            .bind(event.id.as_str())
            .bind(event.collection.as_str())
            .bind(event.kind.as_str())
            .bind(event.created_at)
            .bind(payload)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}
