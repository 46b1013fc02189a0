//! Search filter types for the conversation read path.
//!
//! This module defines the filter structure used to query the index. Every
//! filter is bound to exactly one tenant; the read path always scopes the
//! query to it.

use serde::{Deserialize, Serialize};

use crate::types::tenant_document::TenantId;

/// Maximum page size accepted by the read path.
pub const MAX_LIMIT: usize = 100;

fn default_limit() -> usize {
    20
}

/// Cursor for search-after paging, ordered by last message time then id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchAfter {
    /// Epoch milliseconds of the last message of the previous page's tail.
    pub last_message_at_ms: i64,
    pub conversation_id: String,
}

/// Conversation search parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationFilter {
    /// The tenant whose documents may be returned.
    pub tenant: TenantId,

    /// Free-text match on the conversation names.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Member to filter on; combined with `joined`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub member_id: Option<String>,

    /// `Some(true)` keeps conversations `member_id` belongs to,
    /// `Some(false)` keeps the ones they do not.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub joined: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub replied: Option<bool>,

    #[serde(default)]
    pub owners: Vec<String>,

    #[serde(default)]
    pub conversation_types: Vec<String>,

    #[serde(default)]
    pub course_ids: Vec<String>,

    /// Allowed location access paths, supplied by the permission layer.
    #[serde(default)]
    pub access_paths: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_after: Option<SearchAfter>,

    #[serde(default = "default_limit")]
    pub limit: usize,
}

impl ConversationFilter {
    /// Create an unrestricted filter for a tenant.
    ///
    /// # Example
    ///
    /// ```
    /// use search_reconciler_shared::{ConversationFilter, TenantId};
    ///
    /// let filter = ConversationFilter::for_tenant(TenantId::new("org-1"))
    ///     .with_name("john")
    ///     .with_limit(50);
    /// assert!(filter.validate().is_ok());
    /// ```
    pub fn for_tenant(tenant: TenantId) -> Self {
        Self {
            tenant,
            name: None,
            member_id: None,
            joined: None,
            replied: None,
            owners: Vec::new(),
            conversation_types: Vec::new(),
            course_ids: Vec::new(),
            access_paths: Vec::new(),
            search_after: None,
            limit: default_limit(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_access_paths(mut self, access_paths: Vec<String>) -> Self {
        self.access_paths = access_paths;
        self
    }

    /// Set the page size, capped at [`MAX_LIMIT`].
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit.min(MAX_LIMIT);
        self
    }

    pub fn with_search_after(mut self, cursor: SearchAfter) -> Self {
        self.search_after = Some(cursor);
        self
    }

    /// Validate the filter parameters.
    ///
    /// Returns an error message if validation fails.
    pub fn validate(&self) -> Result<(), String> {
        if self.tenant.is_empty() {
            return Err("tenant is required".to_string());
        }

        if self.joined.is_some() && self.member_id.is_none() {
            return Err("joined requires member_id".to_string());
        }

        if self.limit == 0 {
            return Err("limit must be greater than zero".to_string());
        }

        if self.limit > MAX_LIMIT {
            return Err(format!("limit must not exceed {}", MAX_LIMIT));
        }

        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err("name cannot be blank".to_string());
            }
        }

        Ok(())
    }
}
