//! Bulk index items submitted to the bulk upsert engine.

use std::fmt;

/// Write action performed for a single bulk item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexAction {
    /// Create the document; fails with a conflict if it already exists.
    Create,
    /// Create-or-update the document (upsert).
    Update,
    /// Delete the document. A missing document counts as deleted.
    Delete,
}

impl IndexAction {
    /// The bulk API action name.
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexAction::Create => "create",
            IndexAction::Update => "update",
            IndexAction::Delete => "delete",
        }
    }

    /// Whether the action carries a document body line.
    pub fn has_body(&self) -> bool {
        !matches!(self, IndexAction::Delete)
    }
}

impl fmt::Display for IndexAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One write request for the search index.
///
/// `body` holds the already-encoded document (see
/// [`TenantDocument`](crate::TenantDocument)); it is empty for deletes.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexItem {
    pub id: String,
    pub index: String,
    pub action: IndexAction,
    pub body: Vec<u8>,
    /// Number of times an optimistic-concurrency conflict is retried before
    /// the item is reported as a permanent failure.
    pub conflict_retry_budget: u32,
}

impl IndexItem {
    /// Create-or-update item.
    pub fn upsert(
        id: impl Into<String>,
        index: impl Into<String>,
        body: Vec<u8>,
        conflict_retry_budget: u32,
    ) -> Self {
        Self {
            id: id.into(),
            index: index.into(),
            action: IndexAction::Update,
            body,
            conflict_retry_budget,
        }
    }

    /// Create-only item.
    pub fn create(id: impl Into<String>, index: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            id: id.into(),
            index: index.into(),
            action: IndexAction::Create,
            body,
            conflict_retry_budget: 0,
        }
    }

    /// Delete item.
    pub fn delete(id: impl Into<String>, index: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            index: index.into(),
            action: IndexAction::Delete,
            body: Vec::new(),
            conflict_retry_budget: 0,
        }
    }

    /// Approximate encoded size used for byte-threshold batching.
    pub fn encoded_len(&self) -> usize {
        // action line overhead plus the body line
        self.id.len() + self.index.len() + self.body.len() + 48
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_names() {
        assert_eq!(IndexAction::Create.as_str(), "create");
        assert_eq!(IndexAction::Update.as_str(), "update");
        assert_eq!(IndexAction::Delete.as_str(), "delete");
        assert!(!IndexAction::Delete.has_body());
        assert!(IndexAction::Update.has_body());
    }

    #[test]
    fn test_delete_has_no_body() {
        let item = IndexItem::delete("conv-1", "conversations");
        assert!(item.body.is_empty());
        assert_eq!(item.action, IndexAction::Delete);
    }

    #[test]
    fn test_encoded_len_grows_with_body() {
        let small = IndexItem::upsert("a", "conversations", b"{}".to_vec(), 3);
        let large = IndexItem::upsert("a", "conversations", vec![b'x'; 1024], 3);
        assert!(large.encoded_len() > small.encoded_len());
    }
}
