//! PostgreSQL implementation of the watermark store.
//!
//! Stores one row per index and entity in `search_watermarks`. Writes are
//! upserts that keep the later of the stored and the new timestamp.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::errors::WatermarkStoreError;
use crate::interfaces::WatermarkStore;

/// PostgreSQL-backed watermark store.
pub struct PostgresWatermarkStore {
    /// PostgreSQL connection pool
    pool: sqlx::PgPool,
}

impl PostgresWatermarkStore {
    /// Creates a store on an existing pool.
    ///
    /// # Arguments
    ///
    /// * `pool` - Configured PostgreSQL connection pool with the `search_watermarks` table
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }

    /// Connects to `url` and applies the bundled migrations.
    ///
    /// # Returns
    ///
    /// * `Ok(PostgresWatermarkStore)` - Ready-to-use store
    /// * `Err(WatermarkStoreError)` - If the connection or a migration fails
    pub async fn connect(url: &str) -> Result<Self, WatermarkStoreError> {
        let pool = sqlx::PgPool::connect(url).await?;
        let store = Self::new(pool);
        store.migrate().await?;
        Ok(store)
    }

    /// Applies the bundled migrations.
    pub async fn migrate(&self) -> Result<(), WatermarkStoreError> {
        sqlx::migrate!("src/postgres/migrations")
            .run(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl WatermarkStore for PostgresWatermarkStore {
    async fn get(
        &self,
        index: &str,
        ids: &[String],
    ) -> Result<HashMap<String, Option<DateTime<Utc>>>, WatermarkStoreError> {
        let mut watermarks: HashMap<String, Option<DateTime<Utc>>> =
            ids.iter().map(|id| (id.clone(), None)).collect();
        if ids.is_empty() {
            return Ok(watermarks);
        }

        let rows: Vec<(String, DateTime<Utc>)> = sqlx::query_as(
            "SELECT entity_id, last_indexed_at FROM search_watermarks \
             WHERE index_name = $1 AND entity_id = ANY($2)",
        )
        .bind(index)
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        debug!(index = %index, requested = ids.len(), found = rows.len(), "Read watermarks");

        for (entity_id, last_indexed_at) in rows {
            watermarks.insert(entity_id, Some(last_indexed_at));
        }
        Ok(watermarks)
    }

    async fn set(
        &self,
        index: &str,
        ids: &[String],
        at: DateTime<Utc>,
    ) -> Result<(), WatermarkStoreError> {
        // a row may only be touched once per upsert statement
        let unique: Vec<String> = ids
            .iter()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if unique.is_empty() {
            return Ok(());
        }

        sqlx::query(
            "INSERT INTO search_watermarks (index_name, entity_id, last_indexed_at) \
             SELECT $1, id, $3 FROM UNNEST($2::text[]) AS t(id) \
             ON CONFLICT (index_name, entity_id) DO UPDATE \
             SET last_indexed_at = GREATEST(search_watermarks.last_indexed_at, EXCLUDED.last_indexed_at)",
        )
        .bind(index)
        .bind(&unique)
        .bind(at)
        .execute(&self.pool)
        .await?;

        debug!(index = %index, count = unique.len(), at = %at, "Advanced watermarks");
        Ok(())
    }
}
