//! Searcher module.
//!
//! The read path: turns a [`ConversationFilter`] into a tenant-scoped query,
//! runs it and decodes every hit it can.

mod query;

use std::sync::Arc;

use search_reconciler_repository::{
    parse_hits, parse_query_response, Hit, IndexConfig, SearchBackend, SearchIndexError,
};
use search_reconciler_shared::{ConversationDocument, ConversationFilter, SearchAfter, SearchPage};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::collaborators::FeatureFlags;
use crate::config::NEXT_INDEX_FLAG;
use crate::errors::ReconcileError;

pub use query::build_search_body;

/// One page of search results.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub page: SearchPage,
    /// Combined error for the hits that could not be decoded; the others are
    /// still in `page`.
    pub hit_error: Option<SearchIndexError>,
    /// Cursor for the page after this one, taken from the last hit.
    pub next: Option<SearchAfter>,
}

/// Runs conversation searches.
pub struct ConversationSearcher {
    backend: Arc<dyn SearchBackend>,
    flags: Arc<dyn FeatureFlags>,
    index: IndexConfig,
}

impl ConversationSearcher {
    pub fn new(
        backend: Arc<dyn SearchBackend>,
        flags: Arc<dyn FeatureFlags>,
        index: IndexConfig,
    ) -> Self {
        Self {
            backend,
            flags,
            index,
        }
    }

    /// Search the conversations of the filter's tenant.
    ///
    /// # Returns
    ///
    /// * `Ok(SearchOutcome)` - Possibly empty page, plus any per-hit decode error
    /// * `Err(ReconcileError::Validation)` - If the filter is invalid
    /// * `Err(ReconcileError::Engine)` - If the engine rejected the query
    /// * `Err(ReconcileError::Transport)` - If the engine could not be reached
    #[instrument(skip(self, filter, cancel), fields(tenant = %filter.tenant))]
    pub async fn search(
        &self,
        filter: &ConversationFilter,
        cancel: &CancellationToken,
    ) -> Result<SearchOutcome, ReconcileError> {
        filter.validate().map_err(ReconcileError::validation)?;

        let index = self.resolve_index().await?;
        let body = build_search_body(filter);

        let raw = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(ReconcileError::cancelled("search cancelled"));
            }
            raw = self.backend.search(&index, &body) => raw?,
        };

        let result = parse_query_response(&raw)?;

        let mut documents = Vec::with_capacity(result.hits.len());
        let hit_error = parse_hits(&result, |hit| {
            documents.push(hit.decode_source::<ConversationDocument>()?);
            Ok(())
        })
        .err();

        if let Some(error) = &hit_error {
            warn!(error = %error, "Some search hits could not be decoded");
        }

        let next = result.hits.last().and_then(cursor_of);
        debug!(
            index = %index,
            total = result.total,
            returned = documents.len(),
            "Search finished"
        );

        Ok(SearchOutcome {
            page: SearchPage::new(documents, result.total, result.took_ms),
            hit_error,
            next,
        })
    }

    /// The alias by default; the next index version while it is being
    /// backfilled under the next-index flag.
    async fn resolve_index(&self) -> Result<String, ReconcileError> {
        let next_index = self
            .flags
            .is_enabled(NEXT_INDEX_FLAG)
            .await
            .map_err(|e| ReconcileError::upstream("feature flags", e))?;

        Ok(if next_index {
            self.index.next_version().versioned_name()
        } else {
            self.index.alias.clone()
        })
    }
}

fn cursor_of(hit: &Hit) -> Option<SearchAfter> {
    match hit.sort() {
        [time, id] => Some(SearchAfter {
            last_message_at_ms: time.as_i64()?,
            conversation_id: id.as_str()?.to_string(),
        }),
        _ => None,
    }
}
