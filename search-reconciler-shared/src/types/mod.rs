//! This module defines the core data structures used across the search reconciler.
//! It re-exports the document wrapper, index document, bulk item and filter types.

pub mod conversation_document;
pub mod index_item;
pub mod search_filter;
pub mod search_page;
pub mod tenant_document;

pub use conversation_document::{ConversationDocument, IndexDocument, LastMessage};
pub use index_item::{IndexAction, IndexItem};
pub use search_filter::{ConversationFilter, SearchAfter};
pub use search_page::SearchPage;
pub use tenant_document::{EncodingError, TenantDocument, TenantId, TENANT_FIELD};
