//! Error types for the search reconciler repository.
//!
//! This module provides the unified error type for search engine operations,
//! the per-item failure causes reported by the bulk engine, and the watermark
//! store error.

mod item_failure;
mod search_index_error;
mod watermark_store_error;

pub use item_failure::ItemFailureCause;
pub use search_index_error::SearchIndexError;
pub use watermark_store_error::WatermarkStoreError;
