//! # Search Reconciler Shared
//!
//! This crate defines the data structures shared across the search reconciler
//! ecosystem: the tenant-isolating document wrapper, the conversation index
//! document, bulk index items and the conversation search filter.

pub mod types;

pub use types::conversation_document::{ConversationDocument, IndexDocument, LastMessage};
pub use types::index_item::{IndexAction, IndexItem};
pub use types::search_filter::{ConversationFilter, SearchAfter};
pub use types::search_page::SearchPage;
pub use types::tenant_document::{EncodingError, TenantDocument, TenantId, TENANT_FIELD};
