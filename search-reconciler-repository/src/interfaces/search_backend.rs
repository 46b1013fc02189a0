//! Search backend trait definition.
//!
//! This module defines the narrow wire-level interface the bulk upsert
//! engine and the read path need from a search engine.

use async_trait::async_trait;
use search_reconciler_shared::IndexItem;
use serde_json::Value;

use crate::errors::SearchIndexError;
use crate::opensearch::IndexConfig;
use crate::types::BulkItemResponse;

/// Abstracts the underlying search engine (OpenSearch, Elasticsearch, etc.).
///
/// Implementations perform exactly one network round trip per call and never
/// retry. Retry decisions belong to the bulk upsert engine (conflicts only)
/// or to the caller.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Ensure the versioned index of `index` exists with the conversation
    /// mapping, creating it if necessary.
    ///
    /// # Arguments
    ///
    /// * `index` - Alias and version of the index
    /// * `attach_alias` - Whether a newly created index joins the alias; an
    ///   index that is still being backfilled must not
    ///
    /// # Returns
    ///
    /// * `Ok(())` - If the index is ready for use
    /// * `Err(SearchIndexError)` - If initialization fails
    async fn ensure_index_exists(
        &self,
        index: &IndexConfig,
        attach_alias: bool,
    ) -> Result<(), SearchIndexError>;

    /// Send one batched write request.
    ///
    /// # Arguments
    ///
    /// * `items` - The items to write, each carrying its own target index
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<BulkItemResponse>)` - One response per item, in request order
    /// * `Err(SearchIndexError::TransportError)` - Non-2xx framing or undecodable body
    /// * `Err(SearchIndexError::EngineError)` - The request as a whole was refused
    async fn bulk(&self, items: &[IndexItem]) -> Result<Vec<BulkItemResponse>, SearchIndexError>;

    /// Run a query and return the raw response body for the response parser.
    ///
    /// # Arguments
    ///
    /// * `index` - Index or alias to query
    /// * `body` - The query payload
    async fn search(&self, index: &str, body: &Value) -> Result<Vec<u8>, SearchIndexError>;
}
