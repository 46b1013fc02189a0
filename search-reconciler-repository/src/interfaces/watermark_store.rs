//! Watermark store trait definition.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::errors::WatermarkStoreError;

/// Persists, per index and entity id, the time of the last successful write
/// of that entity to that index.
///
/// Watermarks of different indexes are independent: writing an entity to a
/// new index version never makes it fresh in the index currently served.
/// Both operations are batched over the ids touched by one reconciliation
/// pass. Implementations lock per id at most; reconciling disjoint id sets
/// must not block.
#[async_trait]
pub trait WatermarkStore: Send + Sync {
    /// Read the watermarks of `ids` in `index`.
    ///
    /// # Returns
    ///
    /// A map containing every requested id; ids that were never indexed map
    /// to `None`.
    async fn get(
        &self,
        index: &str,
        ids: &[String],
    ) -> Result<HashMap<String, Option<DateTime<Utc>>>, WatermarkStoreError>;

    /// Set the watermark of every id in `ids` in `index` to `at`.
    ///
    /// A watermark never moves backwards: an id whose stored watermark is
    /// already later than `at` keeps it.
    async fn set(
        &self,
        index: &str,
        ids: &[String],
        at: DateTime<Utc>,
    ) -> Result<(), WatermarkStoreError>;
}
