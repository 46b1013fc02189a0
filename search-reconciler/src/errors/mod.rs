//! Error types for the search reconciler pipeline.

use search_reconciler_repository::{SearchIndexError, WatermarkStoreError};
use thiserror::Error;

/// Failure reported by an upstream collaborator call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct UpstreamError {
    pub message: String,
}

impl UpstreamError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Errors that can occur during a reconciliation pass or a search.
#[derive(Error, Debug)]
pub enum ReconcileError {
    /// A required collaborator call failed; nothing was assembled.
    #[error("Upstream error from {collaborator}: {message}")]
    Upstream {
        collaborator: &'static str,
        message: String,
    },

    /// The search engine could not be reached or its response decoded.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The search engine reported a logical error.
    #[error("Engine error [{error_type}]: {message}")]
    Engine { error_type: String, message: String },

    /// Reading or advancing watermarks failed.
    #[error("Watermark error: {0}")]
    Watermark(#[from] WatermarkStoreError),

    /// The request itself is invalid.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The caller cancelled the operation.
    #[error("Cancelled: {0}")]
    Cancelled(String),
}

impl ReconcileError {
    /// Create an upstream error attributed to `collaborator`.
    pub fn upstream(collaborator: &'static str, error: UpstreamError) -> Self {
        Self::Upstream {
            collaborator,
            message: error.message,
        }
    }

    /// Create a transport error.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a cancellation error.
    pub fn cancelled(msg: impl Into<String>) -> Self {
        Self::Cancelled(msg.into())
    }
}

impl From<SearchIndexError> for ReconcileError {
    fn from(err: SearchIndexError) -> Self {
        match err {
            SearchIndexError::EngineError {
                error_type,
                message,
                ..
            } => Self::Engine {
                error_type,
                message,
            },
            SearchIndexError::ValidationError(msg) => Self::Validation(msg),
            SearchIndexError::Cancelled(msg) => Self::Cancelled(msg),
            other => Self::Transport(other.to_string()),
        }
    }
}
