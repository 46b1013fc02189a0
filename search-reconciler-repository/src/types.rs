//! Request and response types for search index operations.

use serde::Deserialize;

use crate::errors::{ItemFailureCause, SearchIndexError};

/// Structured error object returned by the search engine.
///
/// Nested `root_cause` entries and the `caused_by` chain are kept so they
/// can be flattened into one message.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct EngineErrorBody {
    #[serde(rename = "type", default)]
    pub error_type: String,
    #[serde(default)]
    pub reason: String,
    #[serde(default, alias = "root_causes")]
    pub root_cause: Vec<EngineErrorBody>,
    #[serde(default)]
    pub caused_by: Option<Box<EngineErrorBody>>,
}

impl EngineErrorBody {
    /// Flatten this error, its root causes and its cause chain into one
    /// human-readable message. Duplicate entries are reported once.
    pub fn flatten(&self) -> String {
        let mut entries: Vec<String> = Vec::new();
        self.collect_entries(&mut entries);
        entries.join("; ")
    }

    fn collect_entries(&self, entries: &mut Vec<String>) {
        let entry = match (self.error_type.is_empty(), self.reason.is_empty()) {
            (true, true) => None,
            (false, true) => Some(self.error_type.clone()),
            (true, false) => Some(self.reason.clone()),
            (false, false) => Some(format!("{}: {}", self.error_type, self.reason)),
        };
        if let Some(entry) = entry {
            if !entries.contains(&entry) {
                entries.push(entry);
            }
        }
        for cause in &self.root_cause {
            cause.collect_entries(entries);
        }
        if let Some(cause) = &self.caused_by {
            cause.collect_entries(entries);
        }
    }

    /// Convert into the unified error type.
    pub fn into_error(self) -> SearchIndexError {
        let message = self.flatten();
        SearchIndexError::engine(self.error_type, self.reason, message)
    }
}

/// Per-item result of one bulk request, in request order.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkItemResponse {
    /// The action key the engine answered under (`index`, `create`, `update`, `delete`).
    pub action: String,
    pub id: String,
    pub status: u16,
    pub error: Option<EngineErrorBody>,
}

impl BulkItemResponse {
    /// Whether the item was written. A delete of a missing document counts
    /// as written.
    pub fn is_success(&self) -> bool {
        if self.error.is_some() && !self.is_missing_delete() {
            return false;
        }
        (200..300).contains(&self.status) || self.is_missing_delete()
    }

    /// Whether the item failed on an optimistic-concurrency conflict.
    pub fn is_conflict(&self) -> bool {
        self.status == 409
            || self
                .error
                .as_ref()
                .is_some_and(|e| e.error_type == "version_conflict_engine_exception")
    }

    fn is_missing_delete(&self) -> bool {
        self.action == "delete" && self.status == 404
    }

    /// Failure cause for a non-conflict rejection.
    pub fn rejection(&self) -> ItemFailureCause {
        let (error_type, reason) = match &self.error {
            Some(error) => (error.error_type.clone(), error.flatten()),
            None => ("unknown".to_string(), format!("status {}", self.status)),
        };
        ItemFailureCause::Rejected {
            status: self.status,
            error_type,
            reason,
        }
    }
}

/// The outcome of one bulk item, as delivered on the engine's outcome channel.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemOutcome {
    pub id: String,
    pub result: Result<(), ItemFailureCause>,
}

impl ItemOutcome {
    pub fn succeeded(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            result: Ok(()),
        }
    }

    pub fn failed(id: impl Into<String>, cause: ItemFailureCause) -> Self {
        Self {
            id: id.into(),
            result: Err(cause),
        }
    }
}

/// A failed bulk item attributed to its id.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemFailure {
    pub id: String,
    pub cause: ItemFailureCause,
}

/// Summary of one bulk engine cycle.
///
/// `success_count + errors.len()` equals the number of accepted items.
/// Items refused at submission are counted in `rejected` only.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkResult {
    pub success_count: usize,
    /// Ids written successfully, in the order outcomes were observed.
    pub succeeded: Vec<String>,
    /// Failed items, in the order outcomes were observed.
    pub errors: Vec<ItemFailure>,
    /// Items refused by the submission check.
    pub rejected: usize,
}

impl BulkResult {
    /// Number of items that reached the flush path.
    pub fn attempted(&self) -> usize {
        self.success_count + self.errors.len()
    }

    pub fn is_complete_success(&self) -> bool {
        self.errors.is_empty()
    }

    /// All item failures combined into one error, if any.
    pub fn error(&self) -> Option<SearchIndexError> {
        SearchIndexError::combine(
            self.errors
                .iter()
                .map(|f| SearchIndexError::item_write(f.id.clone(), f.cause.clone()))
                .collect(),
        )
    }

    pub(crate) fn record(&mut self, outcome: ItemOutcome) {
        match outcome.result {
            Ok(()) => {
                self.success_count += 1;
                self.succeeded.push(outcome.id);
            }
            Err(cause) => self.errors.push(ItemFailure {
                id: outcome.id,
                cause,
            }),
        }
    }
}
