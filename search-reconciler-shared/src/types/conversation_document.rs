//! Conversation document types for the search index.
//!
//! This module defines the document structure indexed in the search engine
//! and the assembled document handed to the write path.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::tenant_document::TenantId;

/// Summary of the last activity in a conversation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LastMessage {
    pub updated_at: Option<DateTime<Utc>>,
}

/// Document representation of a support-chat conversation in the search index.
///
/// This struct never carries the tenant field: it is injected by
/// [`TenantDocument`](crate::TenantDocument) at write time. When decoding
/// search hits the tenant field is ignored.
///
/// # Fields
///
/// - `conversation_id`: Unique identifier for the conversation
/// - `conversation_name_english` / `conversation_name_japanese`: Searchable display names
/// - `course_ids`: Courses the conversation's student is enrolled in
/// - `user_ids`: Current members of the conversation
/// - `last_message`: Last-activity summary
/// - `is_replied`: Whether staff replied to the latest message
/// - `owner`: School owning the conversation
/// - `conversation_type`: e.g. `CONVERSATION_STUDENT`, `CONVERSATION_PARENT`
/// - `access_paths`: Location access paths scoping who may see the conversation
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ConversationDocument {
    pub conversation_id: String,
    #[serde(rename = "conversation_name.english", default)]
    pub conversation_name_english: String,
    #[serde(rename = "conversation_name.japanese", default)]
    pub conversation_name_japanese: String,
    #[serde(default)]
    pub course_ids: Vec<String>,
    #[serde(default)]
    pub user_ids: Vec<String>,
    #[serde(default)]
    pub last_message: LastMessage,
    #[serde(default)]
    pub is_replied: bool,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub conversation_type: String,
    #[serde(default)]
    pub access_paths: Vec<String>,
}

impl ConversationDocument {
    /// Create a document with empty cross-referenced fields.
    pub fn new(conversation_id: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            ..Default::default()
        }
    }
}

/// A freshly assembled document together with the tenant that owns it.
///
/// Built from scratch on every reconciliation pass; never patched in place.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexDocument {
    pub tenant: TenantId,
    pub document: ConversationDocument,
}

impl IndexDocument {
    pub fn new(tenant: TenantId, document: ConversationDocument) -> Self {
        Self { tenant, document }
    }

    /// The document ID used in the search index.
    pub fn id(&self) -> &str {
        &self.document.conversation_id
    }
}
