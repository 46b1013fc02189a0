//! Static configuration for the reconciler.

use std::env;

use search_reconciler_repository::{BulkEngineConfig, IndexConfig};
use tracing::warn;

/// Feature flag that routes a whole pass to the next index version.
pub const NEXT_INDEX_FLAG: &str = "conversation_search_next_index";

/// Default number of conflict retries per item.
const DEFAULT_CONFLICT_RETRY_BUDGET: u32 = 3;

/// Configuration shared by every reconciliation pass.
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Alias and current version of the conversation index.
    pub index: IndexConfig,
    /// Conflict retries allowed per upserted document.
    pub conflict_retry_budget: u32,
    /// Batching thresholds for the bulk write path.
    pub engine: BulkEngineConfig,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            index: IndexConfig::default(),
            conflict_retry_budget: DEFAULT_CONFLICT_RETRY_BUDGET,
            engine: BulkEngineConfig::default(),
        }
    }
}

impl ReconcilerConfig {
    /// Load the configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `SEARCH_INDEX_ALIAS`: Index alias name (default: "conversations")
    /// - `SEARCH_INDEX_VERSION`: Index version number (default: 0)
    /// - `SEARCH_CONFLICT_RETRY_BUDGET`: Conflict retries per item (default: 3)
    /// - `SEARCH_BULK_BATCH_SIZE`: Items per bulk request (default: 100)
    /// - `SEARCH_BULK_BATCH_BYTES`: Bytes per bulk request (default: 5 MiB)
    ///
    /// Unparseable values fall back to the default with a warning.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let alias = env::var("SEARCH_INDEX_ALIAS").unwrap_or(defaults.index.alias);
        let version = parse_var("SEARCH_INDEX_VERSION", defaults.index.version);
        let conflict_retry_budget =
            parse_var("SEARCH_CONFLICT_RETRY_BUDGET", defaults.conflict_retry_budget);
        let batch_size = parse_var("SEARCH_BULK_BATCH_SIZE", defaults.engine.max_batch_items);
        let batch_bytes = parse_var("SEARCH_BULK_BATCH_BYTES", defaults.engine.max_batch_bytes);

        Self {
            index: IndexConfig::new(alias, version),
            conflict_retry_budget,
            engine: BulkEngineConfig::with_max_batch_items(batch_size).max_batch_bytes(batch_bytes),
        }
    }
}

fn parse_var<T: std::str::FromStr + Copy>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!(variable = name, value = %raw, "Invalid value, using default");
            default
        }),
        Err(_) => default,
    }
}
