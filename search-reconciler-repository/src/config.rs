//! Configuration types for the BulkUpsertEngine.

use std::time::Duration;

/// Default number of items per bulk request.
pub const DEFAULT_MAX_BATCH_ITEMS: usize = 100;

/// Default encoded size of one bulk request (5 MiB).
pub const DEFAULT_MAX_BATCH_BYTES: usize = 5 * 1024 * 1024;

/// Default capacity of the outcome channel between flush worker and collector.
pub const DEFAULT_OUTCOME_CHANNEL_CAPACITY: usize = 256;

/// Configuration for the BulkUpsertEngine.
///
/// Controls when buffered items are flushed to the search backend and how
/// much backpressure the outcome channel applies to the flush worker.
#[derive(Debug, Clone)]
pub struct BulkEngineConfig {
    /// Flush once this many items are buffered.
    pub max_batch_items: usize,

    /// Flush once the buffered bodies reach this many bytes. A single item
    /// larger than this is refused at submission.
    pub max_batch_bytes: usize,

    /// Flush a partial batch after this long without reaching a threshold.
    ///
    /// `None` flushes only on thresholds and on close.
    pub flush_interval: Option<Duration>,

    /// Capacity of the bounded outcome channel.
    pub failure_channel_capacity: usize,
}

impl Default for BulkEngineConfig {
    fn default() -> Self {
        Self {
            max_batch_items: DEFAULT_MAX_BATCH_ITEMS,
            max_batch_bytes: DEFAULT_MAX_BATCH_BYTES,
            flush_interval: None,
            failure_channel_capacity: DEFAULT_OUTCOME_CHANNEL_CAPACITY,
        }
    }
}

impl BulkEngineConfig {
    /// Create a config with a custom item threshold.
    ///
    /// # Arguments
    ///
    /// * `max_batch_items` - Number of items that triggers a flush (minimum 1)
    pub fn with_max_batch_items(max_batch_items: usize) -> Self {
        Self {
            max_batch_items: max_batch_items.max(1),
            ..Self::default()
        }
    }

    /// Set the byte threshold.
    pub fn max_batch_bytes(mut self, max_batch_bytes: usize) -> Self {
        self.max_batch_bytes = max_batch_bytes.max(1);
        self
    }

    /// Set the periodic flush interval.
    pub fn flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = Some(interval);
        self
    }
}
