//! Utility functions for the search reconciler repository.

use search_reconciler_shared::IndexItem;

use crate::errors::SearchIndexError;

/// Structural admission check for a bulk item.
///
/// This is the check `BulkUpsertEngine::submit` runs before queueing. It
/// never touches the network.
///
/// # Arguments
///
/// * `item` - The item to check
/// * `max_item_bytes` - Largest encoded item a single batch may carry
///
/// # Returns
///
/// * `Ok(())` - If the item may be queued
/// * `Err(SearchIndexError::ValidationError)` - If the id, index or body is unusable
/// * `Err(SearchIndexError::BatchSizeExceeded)` - If the item alone exceeds the byte limit
///
/// # Example
///
/// ```
/// use search_reconciler_repository::validate_index_item;
/// use search_reconciler_shared::IndexItem;
///
/// let item = IndexItem::delete("conv-1", "conversations");
/// assert!(validate_index_item(&item, 1024).is_ok());
/// ```
pub fn validate_index_item(item: &IndexItem, max_item_bytes: usize) -> Result<(), SearchIndexError> {
    if item.id.trim().is_empty() {
        return Err(SearchIndexError::validation("Item id cannot be empty"));
    }

    if item.index.trim().is_empty() {
        return Err(SearchIndexError::validation(format!(
            "Item {} has no target index",
            item.id
        )));
    }

    if item.action.has_body() && item.body.is_empty() {
        return Err(SearchIndexError::validation(format!(
            "Item {} requires a body for action {}",
            item.id, item.action
        )));
    }

    let size = item.encoded_len();
    if size > max_item_bytes {
        return Err(SearchIndexError::batch_size_exceeded(size, max_item_bytes));
    }

    Ok(())
}
