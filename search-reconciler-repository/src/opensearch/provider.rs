//! OpenSearch backend implementation.
//!
//! This module provides the concrete implementation of `SearchBackend`
//! using the OpenSearch Rust crate.

use async_trait::async_trait;
use opensearch::{
    http::transport::{SingleNodeConnectionPool, TransportBuilder},
    indices::{IndicesCreateParts, IndicesExistsParts},
    BulkParts, OpenSearch, SearchParts,
};
use search_reconciler_shared::{IndexAction, IndexItem};
use serde::Serialize;
use serde_json::{json, value::RawValue, Value};
use tracing::{debug, error, info, instrument};
use url::Url;

use crate::errors::SearchIndexError;
use crate::interfaces::SearchBackend;
use crate::opensearch::index_config::{get_create_index_body, IndexConfig};
use crate::response_parser::{parse_bulk_response, parse_query_response};
use crate::types::BulkItemResponse;

#[derive(Serialize)]
struct UpsertLine<'a> {
    doc: &'a RawValue,
    doc_as_upsert: bool,
}

/// OpenSearch backend implementation.
///
/// # Example
///
/// ```ignore
/// use search_reconciler_repository::opensearch::{IndexConfig, OpenSearchProvider};
///
/// let provider = OpenSearchProvider::new("http://localhost:9200").await?;
/// provider.ensure_index_exists(&IndexConfig::default(), true).await?;
/// ```
pub struct OpenSearchProvider {
    client: OpenSearch,
}

impl OpenSearchProvider {
    /// Create a new OpenSearch provider connected to the specified URL.
    ///
    /// # Arguments
    ///
    /// * `url` - The OpenSearch server URL (e.g., "http://localhost:9200")
    ///
    /// # Returns
    ///
    /// * `Ok(OpenSearchProvider)` - A new provider instance
    /// * `Err(SearchIndexError)` - If connection setup fails
    pub async fn new(url: &str) -> Result<Self, SearchIndexError> {
        let parsed_url = Url::parse(url).map_err(|e| SearchIndexError::transport(e.to_string()))?;

        let conn_pool = SingleNodeConnectionPool::new(parsed_url);
        let transport = TransportBuilder::new(conn_pool)
            .disable_proxy()
            .build()
            .map_err(|e| SearchIndexError::transport(e.to_string()))?;

        let client = OpenSearch::new(transport);

        info!(url = %url, "Created OpenSearch provider");

        Ok(Self { client })
    }

    /// Encode items as bulk NDJSON lines: one action line per item, followed
    /// by a body line for creates and upserts.
    fn encode_bulk_lines(items: &[IndexItem]) -> Result<Vec<Vec<u8>>, SearchIndexError> {
        let mut lines = Vec::with_capacity(items.len() * 2);

        for item in items {
            let action = json!({
                item.action.as_str(): {
                    "_index": item.index,
                    "_id": item.id,
                }
            });
            lines.push(serde_json::to_vec(&action).map_err(|e| {
                SearchIndexError::encoding(format!("action line for {}: {}", item.id, e))
            })?);

            match item.action {
                IndexAction::Create => lines.push(item.body.clone()),
                IndexAction::Update => {
                    let doc: &RawValue = serde_json::from_slice(&item.body).map_err(|e| {
                        SearchIndexError::encoding(format!("body of {}: {}", item.id, e))
                    })?;
                    let line = serde_json::to_vec(&UpsertLine {
                        doc,
                        doc_as_upsert: true,
                    })
                    .map_err(|e| {
                        SearchIndexError::encoding(format!("upsert line for {}: {}", item.id, e))
                    })?;
                    lines.push(line);
                }
                IndexAction::Delete => {}
            }
        }

        Ok(lines)
    }
}

#[async_trait]
impl SearchBackend for OpenSearchProvider {
    /// Create the versioned index, optionally with the alias pointing at it,
    /// unless it already exists.
    #[instrument(skip(self, index), fields(alias = %index.alias, version = index.version))]
    async fn ensure_index_exists(
        &self,
        index: &IndexConfig,
        attach_alias: bool,
    ) -> Result<(), SearchIndexError> {
        let index_name = index.versioned_name();

        let exists = self
            .client
            .indices()
            .exists(IndicesExistsParts::Index(&[index_name.as_str()]))
            .send()
            .await
            .map_err(|e| SearchIndexError::transport(e.to_string()))?;

        if exists.status_code().is_success() {
            debug!(index = %index_name, "Index already exists");
            return Ok(());
        }

        let response = self
            .client
            .indices()
            .create(IndicesCreateParts::Index(&index_name))
            .body(get_create_index_body(index, attach_alias))
            .send()
            .await
            .map_err(|e| SearchIndexError::index_creation(e.to_string()))?;

        let status = response.status_code();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            // lost a creation race with another instance
            if error_body.contains("resource_already_exists_exception") {
                debug!(index = %index_name, "Index created concurrently");
                return Ok(());
            }
            error!(status = %status, body = %error_body, "Index creation failed");
            return Err(SearchIndexError::index_creation(format!(
                "Creating {} failed with status {}: {}",
                index_name, status, error_body
            )));
        }

        info!(
            index = %index_name,
            alias = %index.alias,
            attached = attach_alias,
            "Created search index"
        );
        Ok(())
    }

    async fn bulk(&self, items: &[IndexItem]) -> Result<Vec<BulkItemResponse>, SearchIndexError> {
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let lines = Self::encode_bulk_lines(items)?;

        let response = self
            .client
            .bulk(BulkParts::None)
            .body(lines)
            .send()
            .await
            .map_err(|e| SearchIndexError::transport(e.to_string()))?;

        let status = response.status_code();
        let body = response
            .text()
            .await
            .map_err(|e| SearchIndexError::transport(e.to_string()))?;

        if !status.is_success() {
            error!(status = %status, body = %body, "Bulk request failed");
            return Err(SearchIndexError::transport(format!(
                "Bulk request failed with status {}: {}",
                status, body
            )));
        }

        let responses = parse_bulk_response(body.as_bytes())?;
        debug!(count = responses.len(), "Bulk request completed");
        Ok(responses)
    }

    async fn search(&self, index: &str, body: &Value) -> Result<Vec<u8>, SearchIndexError> {
        let response = self
            .client
            .search(SearchParts::Index(&[index]))
            .body(body)
            .send()
            .await
            .map_err(|e| SearchIndexError::transport(e.to_string()))?;

        let status = response.status_code();
        let text = response
            .text()
            .await
            .map_err(|e| SearchIndexError::transport(e.to_string()))?;

        if !status.is_success() {
            // engine errors arrive with 4xx/5xx framing and a decodable envelope
            if let Err(engine_error @ SearchIndexError::EngineError { .. }) =
                parse_query_response(text.as_bytes())
            {
                return Err(engine_error);
            }
            error!(status = %status, body = %text, "Search request failed");
            return Err(SearchIndexError::transport(format!(
                "Search failed with status {}: {}",
                status, text
            )));
        }

        Ok(text.into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(bytes: &[u8]) -> Value {
        serde_json::from_slice(bytes).unwrap()
    }

    #[test]
    fn test_encode_upsert_lines() {
        let items = vec![IndexItem::upsert(
            "conv-1",
            "conversations_v0",
            br#"{"resource_path":"org-1","owner":"school-1"}"#.to_vec(),
            3,
        )];

        let lines = OpenSearchProvider::encode_bulk_lines(&items).unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            line(&lines[0]),
            json!({"update": {"_index": "conversations_v0", "_id": "conv-1"}})
        );
        assert_eq!(
            line(&lines[1]),
            json!({
                "doc": {"resource_path": "org-1", "owner": "school-1"},
                "doc_as_upsert": true
            })
        );
    }

    #[test]
    fn test_encode_delete_has_no_body_line() {
        let items = vec![
            IndexItem::delete("conv-1", "conversations_v0"),
            IndexItem::create("conv-2", "conversations_v0", br#"{"resource_path":"org-1"}"#.to_vec()),
        ];

        let lines = OpenSearchProvider::encode_bulk_lines(&items).unwrap();
        assert_eq!(lines.len(), 3);
        assert_eq!(
            line(&lines[0]),
            json!({"delete": {"_index": "conversations_v0", "_id": "conv-1"}})
        );
        assert_eq!(
            line(&lines[1]),
            json!({"create": {"_index": "conversations_v0", "_id": "conv-2"}})
        );
        assert_eq!(line(&lines[2]), json!({"resource_path": "org-1"}));
    }

    #[test]
    fn test_encode_rejects_invalid_upsert_body() {
        let items = vec![IndexItem::upsert("conv-1", "conversations_v0", b"not json".to_vec(), 0)];
        let err = OpenSearchProvider::encode_bulk_lines(&items).unwrap_err();
        assert!(matches!(err, SearchIndexError::EncodingError(_)));
    }
}
