//! In-memory watermark store.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::errors::WatermarkStoreError;
use crate::interfaces::WatermarkStore;

/// Watermark store kept in process memory.
///
/// Used by tests and by deployments that rebuild the index on every start.
#[derive(Debug, Default)]
pub struct InMemoryWatermarkStore {
    /// Keyed by (index name, entity id).
    watermarks: RwLock<HashMap<(String, String), DateTime<Utc>>>,
}

impl InMemoryWatermarkStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of a single watermark.
    pub async fn watermark(&self, index: &str, id: &str) -> Option<DateTime<Utc>> {
        self.watermarks
            .read()
            .await
            .get(&(index.to_string(), id.to_string()))
            .copied()
    }

    /// Number of (index, entity) pairs with a watermark.
    pub async fn len(&self) -> usize {
        self.watermarks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.watermarks.read().await.is_empty()
    }
}

#[async_trait]
impl WatermarkStore for InMemoryWatermarkStore {
    async fn get(
        &self,
        index: &str,
        ids: &[String],
    ) -> Result<HashMap<String, Option<DateTime<Utc>>>, WatermarkStoreError> {
        let watermarks = self.watermarks.read().await;
        Ok(ids
            .iter()
            .map(|id| {
                let key = (index.to_string(), id.clone());
                (id.clone(), watermarks.get(&key).copied())
            })
            .collect())
    }

    async fn set(
        &self,
        index: &str,
        ids: &[String],
        at: DateTime<Utc>,
    ) -> Result<(), WatermarkStoreError> {
        let mut watermarks = self.watermarks.write().await;
        for id in ids {
            watermarks
                .entry((index.to_string(), id.clone()))
                .and_modify(|current| {
                    if at > *current {
                        *current = at;
                    }
                })
                .or_insert(at);
        }
        Ok(())
    }
}
