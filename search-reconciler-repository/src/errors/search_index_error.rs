//! Search index error types.
//!
//! This module defines the unified error type for all search engine
//! operations, distinguishing transport failures, engine-reported logical
//! errors and per-item write failures.

use thiserror::Error;

use crate::errors::ItemFailureCause;

/// Unified errors from search index operations.
///
/// Used by the `SearchBackend` trait, the response parser and the bulk
/// upsert engine.
#[derive(Debug, Clone, Error)]
pub enum SearchIndexError {
    /// Validation error (e.g., empty document id, oversized item).
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// The search engine could not be reached or its response could not be decoded.
    #[error("Transport error: {0}")]
    TransportError(String),

    /// The search engine responded but reported a logical error.
    #[error("Engine error [{error_type}]: {message}")]
    EngineError {
        error_type: String,
        reason: String,
        /// Reason plus all nested root causes, flattened.
        message: String,
    },

    /// One bulk item failed.
    #[error("Item write error for {id}: {cause}")]
    ItemWriteError { id: String, cause: ItemFailureCause },

    /// Several independent failures, none of which short-circuited the others.
    #[error("{} errors occurred: {}", .0.len(), join_messages(.0))]
    Aggregate(Vec<SearchIndexError>),

    /// Failed to parse a document or hit.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Failed to encode data for the search engine.
    #[error("Encoding error: {0}")]
    EncodingError(String),

    /// Failed to create the search index.
    #[error("Index creation error: {0}")]
    IndexCreationError(String),

    /// The operation was cancelled by the caller.
    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// Batch size exceeds configured maximum.
    #[error("Batch size {provided} exceeds maximum {max}")]
    BatchSizeExceeded { provided: usize, max: usize },
}

fn join_messages(errors: &[SearchIndexError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl SearchIndexError {
    /// Create a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }

    /// Create a transport error.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::TransportError(msg.into())
    }

    /// Create an engine error.
    pub fn engine(
        error_type: impl Into<String>,
        reason: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::EngineError {
            error_type: error_type.into(),
            reason: reason.into(),
            message: message.into(),
        }
    }

    /// Create an item write error.
    pub fn item_write(id: impl Into<String>, cause: ItemFailureCause) -> Self {
        Self::ItemWriteError {
            id: id.into(),
            cause,
        }
    }

    /// Create a parse error.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::ParseError(msg.into())
    }

    /// Create an encoding error.
    pub fn encoding(msg: impl Into<String>) -> Self {
        Self::EncodingError(msg.into())
    }

    /// Create an index creation error.
    pub fn index_creation(msg: impl Into<String>) -> Self {
        Self::IndexCreationError(msg.into())
    }

    /// Create a cancellation error.
    pub fn cancelled(msg: impl Into<String>) -> Self {
        Self::Cancelled(msg.into())
    }

    /// Create a batch size exceeded error.
    pub fn batch_size_exceeded(provided: usize, max: usize) -> Self {
        Self::BatchSizeExceeded { provided, max }
    }

    /// Combine independent errors without dropping any.
    ///
    /// Returns `None` for no errors, the error itself for one, and
    /// `Aggregate` otherwise. Nested aggregates are flattened.
    pub fn combine(errors: Vec<SearchIndexError>) -> Option<SearchIndexError> {
        let mut flat = Vec::with_capacity(errors.len());
        for error in errors {
            match error {
                SearchIndexError::Aggregate(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }

        match flat.len() {
            0 => None,
            1 => flat.pop(),
            _ => Some(SearchIndexError::Aggregate(flat)),
        }
    }

    /// Number of individual failures this error represents.
    pub fn failure_count(&self) -> usize {
        match self {
            SearchIndexError::Aggregate(errors) => errors.len(),
            _ => 1,
        }
    }

    /// Individual failures this error represents.
    pub fn failures(&self) -> Vec<&SearchIndexError> {
        match self {
            SearchIndexError::Aggregate(errors) => errors.iter().collect(),
            other => vec![other],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combine_empty_is_none() {
        assert!(SearchIndexError::combine(vec![]).is_none());
    }

    #[test]
    fn test_combine_single_is_unwrapped() {
        let combined = SearchIndexError::combine(vec![SearchIndexError::parse("bad hit")]).unwrap();
        assert!(matches!(combined, SearchIndexError::ParseError(_)));
        assert_eq!(combined.failure_count(), 1);
    }

    #[test]
    fn test_combine_keeps_every_error() {
        let combined = SearchIndexError::combine(vec![
            SearchIndexError::parse("first"),
            SearchIndexError::combine(vec![
                SearchIndexError::parse("second"),
                SearchIndexError::parse("third"),
            ])
            .unwrap(),
        ])
        .unwrap();

        assert_eq!(combined.failure_count(), 3);
        let message = combined.to_string();
        assert!(message.starts_with("3 errors occurred"));
        assert!(message.contains("first"));
        assert!(message.contains("second"));
        assert!(message.contains("third"));
    }

    #[test]
    fn test_item_write_error_message() {
        let error = SearchIndexError::item_write(
            "conv-1",
            ItemFailureCause::ConflictExhausted { attempts: 4 },
        );
        assert_eq!(
            error.to_string(),
            "Item write error for conv-1: version conflict after 4 attempts"
        );
    }
}
