//! Search result page returned by the conversation read path.

use serde::{Deserialize, Serialize};

use crate::types::conversation_document::ConversationDocument;

/// One page of conversation search results.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SearchPage {
    /// Successfully decoded documents, in engine order.
    pub documents: Vec<ConversationDocument>,

    /// Total number of matching documents.
    /// May be greater than the number of returned documents due to paging.
    pub total: u64,

    /// Time taken to execute the search in milliseconds.
    pub took_ms: u64,
}

impl SearchPage {
    /// Create an empty page.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(documents: Vec<ConversationDocument>, total: u64, took_ms: u64) -> Self {
        Self {
            documents,
            total,
            took_ms,
        }
    }

    /// Returns true if there are no documents.
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Returns the number of documents in this page.
    pub fn len(&self) -> usize {
        self.documents.len()
    }
}
