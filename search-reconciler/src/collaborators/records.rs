//! Records returned by the upstream collaborators.

use chrono::{DateTime, Utc};
use search_reconciler_shared::TenantId;

/// A conversation as stored in the source of truth.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationRecord {
    pub conversation_id: String,
    pub name: String,
    pub conversation_type: String,
    /// School owning the conversation.
    pub owner: String,
    /// Tenant the conversation belongs to.
    pub resource_path: TenantId,
    /// Student the conversation is about; the key for enrollment lookups.
    pub student_id: Option<String>,
    /// Locations the conversation is visible from.
    pub location_ids: Vec<String>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub is_replied: bool,
}

impl ConversationRecord {
    /// A record with only identity and tenant set.
    pub fn new(conversation_id: impl Into<String>, resource_path: TenantId) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            name: String::new(),
            conversation_type: String::new(),
            owner: String::new(),
            resource_path,
            student_id: None,
            location_ids: Vec::new(),
            last_message_at: None,
            is_replied: false,
        }
    }
}

/// Current members of one conversation.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberRecord {
    pub conversation_id: String,
    pub user_ids: Vec<String>,
}

/// Courses one student is enrolled in.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrollmentRecord {
    pub student_id: String,
    pub course_ids: Vec<String>,
}

/// The access path of one location.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationRecord {
    pub location_id: String,
    pub access_path: String,
}
