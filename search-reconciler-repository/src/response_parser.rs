//! Decoding of search engine query and bulk responses.
//!
//! Three failure kinds are kept apart:
//! - a body that cannot be decoded at all is a transport failure and yields
//!   no partial result;
//! - a decoded envelope carrying an `error` object is an engine error, even
//!   under 2xx framing;
//! - a hit or item that fails to decode is reported individually while the
//!   rest of the response is still delivered.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::errors::SearchIndexError;
use crate::types::{BulkItemResponse, EngineErrorBody};

/// The `error` field of a response envelope. Older engines send a bare string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorField {
    Structured(EngineErrorBody),
    Message(String),
}

impl ErrorField {
    fn into_error(self) -> SearchIndexError {
        match self {
            ErrorField::Structured(body) => body.into_error(),
            ErrorField::Message(message) => {
                SearchIndexError::engine("unknown", message.clone(), message)
            }
        }
    }

    fn into_body(self) -> EngineErrorBody {
        match self {
            ErrorField::Structured(body) => body,
            ErrorField::Message(message) => EngineErrorBody {
                error_type: "unknown".to_string(),
                reason: message,
                ..Default::default()
            },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TotalHits {
    Count(u64),
    Object { value: u64 },
}

#[derive(Debug, Default, Deserialize)]
struct HitsEnvelope {
    #[serde(default)]
    total: Option<TotalHits>,
    #[serde(default)]
    hits: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct QueryEnvelope {
    #[serde(default)]
    took: u64,
    #[serde(default)]
    hits: Option<HitsEnvelope>,
    #[serde(default)]
    error: Option<ErrorField>,
}

#[derive(Debug, Deserialize)]
struct BulkItemBody {
    #[serde(rename = "_id", default)]
    id: Option<String>,
    #[serde(default)]
    status: u16,
    #[serde(default)]
    error: Option<ErrorField>,
}

#[derive(Debug, Deserialize)]
struct BulkEnvelope {
    #[serde(default)]
    items: Vec<serde_json::Map<String, Value>>,
    #[serde(default)]
    error: Option<ErrorField>,
}

/// A single search hit, kept undecoded until the caller asks for it.
#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    raw: Value,
}

impl Hit {
    pub fn new(raw: Value) -> Self {
        Self { raw }
    }

    /// The document id (`_id`), if present.
    pub fn id(&self) -> Option<&str> {
        self.raw.get("_id").and_then(Value::as_str)
    }

    /// The relevance score (`_score`), if present.
    pub fn score(&self) -> Option<f64> {
        self.raw.get("_score").and_then(Value::as_f64)
    }

    /// The stored document (`_source`), if present.
    pub fn source(&self) -> Option<&Value> {
        self.raw.get("_source")
    }

    /// Sort values for search-after paging.
    pub fn sort(&self) -> &[Value] {
        self.raw
            .get("sort")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Decode `_source` into `T`.
    pub fn decode_source<T: DeserializeOwned>(&self) -> Result<T, SearchIndexError> {
        let source = self.source().ok_or_else(|| {
            SearchIndexError::parse(format!(
                "hit {} has no _source",
                self.id().unwrap_or("<unknown>")
            ))
        })?;
        T::deserialize(source).map_err(|e| {
            SearchIndexError::parse(format!(
                "hit {}: {}",
                self.id().unwrap_or("<unknown>"),
                e
            ))
        })
    }
}

/// A decoded query response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    pub total: u64,
    pub took_ms: u64,
    pub hits: Vec<Hit>,
}

impl QueryResult {
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }
}

/// Decode a query response body.
///
/// # Returns
///
/// * `Ok(QueryResult)` - Possibly empty; zero total hits is not an error
/// * `Err(SearchIndexError::TransportError)` - If the body cannot be decoded
/// * `Err(SearchIndexError::EngineError)` - If the envelope carries an error object
pub fn parse_query_response(body: &[u8]) -> Result<QueryResult, SearchIndexError> {
    let envelope: QueryEnvelope = serde_json::from_slice(body)
        .map_err(|e| SearchIndexError::transport(format!("malformed query response: {}", e)))?;

    if let Some(error) = envelope.error {
        return Err(error.into_error());
    }

    let hits = envelope.hits.unwrap_or_default();
    let total = match hits.total {
        Some(TotalHits::Count(count)) => count,
        Some(TotalHits::Object { value }) => value,
        None => hits.hits.len() as u64,
    };

    debug!(total = total, returned = hits.hits.len(), "Parsed query response");

    Ok(QueryResult {
        total,
        took_ms: envelope.took,
        hits: hits.hits.into_iter().map(Hit::new).collect(),
    })
}

/// Visit every hit, never stopping early.
///
/// Failures from `per_hit` are collected and returned as one combined error
/// after all hits have been visited. Side effects of successful calls are
/// kept regardless of failures elsewhere.
pub fn parse_hits<F>(result: &QueryResult, mut per_hit: F) -> Result<(), SearchIndexError>
where
    F: FnMut(&Hit) -> Result<(), SearchIndexError>,
{
    let mut errors = Vec::new();
    for hit in &result.hits {
        if let Err(e) = per_hit(hit) {
            errors.push(e);
        }
    }

    match SearchIndexError::combine(errors) {
        Some(error) => Err(error),
        None => Ok(()),
    }
}

/// Decode a bulk response body into per-item results, in request order.
///
/// # Returns
///
/// * `Ok(Vec<BulkItemResponse>)` - One entry per item in the response
/// * `Err(SearchIndexError::TransportError)` - If the body cannot be decoded
/// * `Err(SearchIndexError::EngineError)` - If the whole request was refused
pub fn parse_bulk_response(body: &[u8]) -> Result<Vec<BulkItemResponse>, SearchIndexError> {
    let envelope: BulkEnvelope = serde_json::from_slice(body)
        .map_err(|e| SearchIndexError::transport(format!("malformed bulk response: {}", e)))?;

    if let Some(error) = envelope.error {
        return Err(error.into_error());
    }

    let mut items = Vec::with_capacity(envelope.items.len());
    for (position, entry) in envelope.items.into_iter().enumerate() {
        let (action, value) = entry.into_iter().next().ok_or_else(|| {
            SearchIndexError::transport(format!("bulk response item {} is empty", position))
        })?;
        let item: BulkItemBody = serde_json::from_value(value).map_err(|e| {
            SearchIndexError::transport(format!(
                "malformed bulk response item {}: {}",
                position, e
            ))
        })?;
        items.push(BulkItemResponse {
            action,
            id: item.id.unwrap_or_default(),
            status: item.status,
            error: item.error.map(ErrorField::into_body),
        });
    }

    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Doc {
        conversation_id: String,
        owner: String,
    }

    const SEARCH_ERROR: &str = r#"{
        "error": {
            "root_cause": [
                {"type": "query_shard_exception", "reason": "failed to create query: For input string: \"abc\"", "index": "conversations"}
            ],
            "type": "search_phase_execution_exception",
            "reason": "all shards failed",
            "phase": "query",
            "grouped": true,
            "failed_shards": []
        },
        "status": 400
    }"#;

    #[test]
    fn test_engine_error_is_surfaced() {
        let err = parse_query_response(SEARCH_ERROR.as_bytes()).unwrap_err();
        match err {
            SearchIndexError::EngineError {
                error_type,
                reason,
                message,
            } => {
                assert_eq!(error_type, "search_phase_execution_exception");
                assert_eq!(reason, "all shards failed");
                assert!(message.contains("query_shard_exception"));
                assert!(message.starts_with("search_phase_execution_exception: all shards failed"));
            }
            other => panic!("Expected EngineError, got {:?}", other),
        }
    }

    #[test]
    fn test_string_error_is_engine_error() {
        let err = parse_query_response(br#"{"error": "IndexMissingException[[conversations] missing]"}"#)
            .unwrap_err();
        assert!(matches!(err, SearchIndexError::EngineError { .. }));
    }

    #[test]
    fn test_malformed_body_is_transport_error() {
        let err = parse_query_response(b"<html>Bad gateway</html>").unwrap_err();
        assert!(matches!(err, SearchIndexError::TransportError(_)));
    }

    #[test]
    fn test_zero_hits_is_empty_result() {
        let result = parse_query_response(
            br#"{"took": 3, "hits": {"total": {"value": 0, "relation": "eq"}, "hits": []}}"#,
        )
        .unwrap();
        assert_eq!(result.total, 0);
        assert_eq!(result.took_ms, 3);
        assert!(result.is_empty());
    }

    #[test]
    fn test_legacy_numeric_total() {
        let result = parse_query_response(
            br#"{"hits": {"total": 7, "hits": [{"_id": "a", "_source": {}}]}}"#,
        )
        .unwrap();
        assert_eq!(result.total, 7);
        assert_eq!(result.hits.len(), 1);
        assert_eq!(result.hits[0].id(), Some("a"));
    }

    #[test]
    fn test_parse_hits_visits_every_hit() {
        let body = json!({
            "took": 1,
            "hits": {
                "total": {"value": 3, "relation": "eq"},
                "hits": [
                    {"_id": "h1", "_score": 1.0, "_source": {"conversation_id": "h1", "owner": "s1"}, "sort": [1635403773000i64, "h1"]},
                    {"_id": "h2", "_score": 0.8, "_source": {"conversation_id": 42}},
                    {"_id": "h3", "_score": 0.5, "_source": {"conversation_id": "h3", "owner": "s3"}}
                ]
            }
        });
        let result = parse_query_response(&serde_json::to_vec(&body).unwrap()).unwrap();

        let mut sink: Vec<Doc> = Vec::new();
        let err = parse_hits(&result, |hit| {
            sink.push(hit.decode_source::<Doc>()?);
            Ok(())
        })
        .unwrap_err();

        assert_eq!(err.failure_count(), 1);
        assert!(err.to_string().contains("h2"));
        assert_eq!(
            sink,
            vec![
                Doc {
                    conversation_id: "h1".to_string(),
                    owner: "s1".to_string()
                },
                Doc {
                    conversation_id: "h3".to_string(),
                    owner: "s3".to_string()
                },
            ]
        );
        assert_eq!(result.hits[0].sort().len(), 2);
        assert_eq!(result.hits[0].score(), Some(1.0));
    }

    #[test]
    fn test_parse_hits_collects_all_failures() {
        let result = QueryResult {
            total: 2,
            took_ms: 0,
            hits: vec![Hit::new(json!({"_id": "x"})), Hit::new(json!({"_id": "y"}))],
        };

        let mut visited = 0;
        let err = parse_hits(&result, |hit| {
            visited += 1;
            hit.decode_source::<Doc>().map(|_| ())
        })
        .unwrap_err();

        assert_eq!(visited, 2);
        assert_eq!(err.failure_count(), 2);
    }

    #[test]
    fn test_parse_bulk_response() {
        let body = json!({
            "took": 30,
            "errors": true,
            "items": [
                {"update": {"_index": "conversations", "_id": "a", "status": 200, "result": "updated"}},
                {"update": {"_index": "conversations", "_id": "b", "status": 409,
                    "error": {"type": "version_conflict_engine_exception", "reason": "[b]: version conflict"}}},
                {"delete": {"_index": "conversations", "_id": "c", "status": 404, "result": "not_found"}}
            ]
        });

        let items = parse_bulk_response(&serde_json::to_vec(&body).unwrap()).unwrap();
        assert_eq!(items.len(), 3);

        assert_eq!(items[0].id, "a");
        assert!(items[0].is_success());

        assert_eq!(items[1].id, "b");
        assert!(items[1].is_conflict());
        assert_eq!(
            items[1].error.as_ref().unwrap().error_type,
            "version_conflict_engine_exception"
        );

        assert_eq!(items[2].action, "delete");
        assert!(items[2].is_success());
    }

    #[test]
    fn test_bulk_request_level_error() {
        let body = br#"{"error": {"type": "illegal_argument_exception", "reason": "Malformed action/metadata line [1]"}, "status": 400}"#;
        let err = parse_bulk_response(body).unwrap_err();
        assert!(matches!(err, SearchIndexError::EngineError { .. }));
    }

    #[test]
    fn test_malformed_bulk_response() {
        let err = parse_bulk_response(b"{\"items\": 12}").unwrap_err();
        assert!(matches!(err, SearchIndexError::TransportError(_)));
    }
}
