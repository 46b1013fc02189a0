//! Reconciler module.
//!
//! Decides which conversations are stale relative to their watermark,
//! rebuilds and writes the stale ones, and advances the watermark of every
//! conversation whose write succeeded.
//!
//! Watermarks are kept per versioned index, so a pass writing the next
//! index version never marks a conversation fresh in the served one.

mod clock;

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use search_reconciler_repository::{
    BulkEngineConfig, BulkUpsertEngine, IndexConfig, ItemFailure, ItemFailureCause, SearchBackend,
    WatermarkStore,
};
use search_reconciler_shared::{IndexItem, TenantDocument};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::assembler::SourceAssembler;
use crate::collaborators::FeatureFlags;
use crate::config::{ReconcilerConfig, NEXT_INDEX_FLAG};
use crate::errors::ReconcileError;

pub use clock::{Clock, SystemClock};

/// Settings fixed for the whole of one pass.
#[derive(Debug, Clone)]
pub struct PassSettings {
    /// Index the pass writes to.
    pub index: IndexConfig,
    /// Whether `index` is the next version rather than the served one.
    pub next_index: bool,
    pub conflict_retry_budget: u32,
    pub engine: BulkEngineConfig,
}

/// What one reconciliation pass did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcileReport {
    /// Ids judged stale and rebuilt.
    pub selected: Vec<String>,
    /// Ids skipped because their watermark is not before the cutoff.
    pub fresh: Vec<String>,
    /// Ids written successfully; their watermark was advanced.
    pub indexed: Vec<String>,
    /// Ids that were not written; their watermark is unchanged.
    pub failed: Vec<ItemFailure>,
}

/// Keeps the conversation index consistent with the upstream sources.
pub struct Reconciler {
    assembler: SourceAssembler,
    backend: Arc<dyn SearchBackend>,
    watermarks: Arc<dyn WatermarkStore>,
    flags: Arc<dyn FeatureFlags>,
    config: ReconcilerConfig,
    clock: Arc<dyn Clock>,
}

impl Reconciler {
    pub fn new(
        assembler: SourceAssembler,
        backend: Arc<dyn SearchBackend>,
        watermarks: Arc<dyn WatermarkStore>,
        flags: Arc<dyn FeatureFlags>,
        config: ReconcilerConfig,
    ) -> Self {
        Self {
            assembler,
            backend,
            watermarks,
            flags,
            config,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the clock used to stamp watermarks.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Rebuild every given conversation regardless of its watermark.
    ///
    /// # Returns
    ///
    /// * `Ok(usize)` - Number of conversations written
    /// * `Err(ReconcileError)` - If assembly, the write transport or the watermark store failed
    #[instrument(skip(self, ids, cancel), fields(requested = ids.len()))]
    pub async fn reindex(
        &self,
        ids: &[String],
        cancel: &CancellationToken,
    ) -> Result<usize, ReconcileError> {
        let settings = self.resolve_settings().await?;
        let ids = distinct(ids);
        if ids.is_empty() {
            return Ok(0);
        }

        let mut report = ReconcileReport {
            selected: ids.clone(),
            ..Default::default()
        };
        self.rebuild(&ids, &settings, cancel, &mut report).await?;
        Ok(report.indexed.len())
    }

    /// Rebuild the conversations whose watermark is absent or before `cutoff`.
    ///
    /// A partial write failure is not an error: the failed ids keep their
    /// old watermark and are selected again by the next pass.
    pub async fn reconcile_if_stale(
        &self,
        ids: &[String],
        cutoff: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<(), ReconcileError> {
        self.reconcile_if_stale_with_report(ids, cutoff, cancel)
            .await
            .map(|_| ())
    }

    /// Same as [`reconcile_if_stale`](Self::reconcile_if_stale), returning
    /// what the pass did.
    #[instrument(skip(self, ids, cancel), fields(requested = ids.len(), cutoff = %cutoff))]
    pub async fn reconcile_if_stale_with_report(
        &self,
        ids: &[String],
        cutoff: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<ReconcileReport, ReconcileError> {
        let settings = self.resolve_settings().await?;
        let ids = distinct(ids);
        let mut report = ReconcileReport::default();
        if ids.is_empty() {
            return Ok(report);
        }

        let index_name = settings.index.versioned_name();
        let watermarks = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(ReconcileError::cancelled("watermark read cancelled"));
            }
            watermarks = self.watermarks.get(&index_name, &ids) => watermarks?,
        };

        for id in ids {
            match watermarks.get(&id).copied().flatten() {
                Some(last_indexed_at) if last_indexed_at >= cutoff => report.fresh.push(id),
                _ => report.selected.push(id),
            }
        }

        if report.selected.is_empty() {
            debug!(fresh = report.fresh.len(), "Nothing stale");
            return Ok(report);
        }

        let stale = report.selected.clone();
        self.rebuild(&stale, &settings, cancel, &mut report).await?;
        Ok(report)
    }

    /// Resolve the per-pass settings once, before any other work.
    async fn resolve_settings(&self) -> Result<PassSettings, ReconcileError> {
        let next_index = self
            .flags
            .is_enabled(NEXT_INDEX_FLAG)
            .await
            .map_err(|e| ReconcileError::upstream("feature flags", e))?;

        let index = if next_index {
            self.config.index.next_version()
        } else {
            self.config.index.clone()
        };

        Ok(PassSettings {
            index,
            next_index,
            conflict_retry_budget: self.config.conflict_retry_budget,
            engine: self.config.engine.clone(),
        })
    }

    async fn rebuild(
        &self,
        ids: &[String],
        settings: &PassSettings,
        cancel: &CancellationToken,
        report: &mut ReconcileReport,
    ) -> Result<(), ReconcileError> {
        // must precede every source read of this pass
        let started_at = self.clock.now();

        let documents = self.assembler.assemble(ids, cancel).await?;
        if documents.len() < ids.len() {
            debug!(
                omitted = ids.len() - documents.len(),
                "Conversations no longer exist in the source"
            );
        }

        let index_name = settings.index.versioned_name();
        if !documents.is_empty() {
            // the served version carries the alias; the next one stays off it
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(ReconcileError::cancelled("index creation cancelled"));
                }
                created = self
                    .backend
                    .ensure_index_exists(&settings.index, !settings.next_index) => created?,
            }
        }

        let engine = BulkUpsertEngine::open(self.backend.clone(), settings.engine.clone());

        for document in &documents {
            let body = match TenantDocument::new(&document.document)
                .with_tenant(document.tenant.clone())
                .to_json_bytes()
            {
                Ok(body) => body,
                Err(e) => {
                    warn!(id = %document.id(), error = %e, "Failed to encode conversation document");
                    report.failed.push(refused(document.id(), "encoding_error", e.to_string()));
                    continue;
                }
            };

            let item = IndexItem::upsert(
                document.id(),
                index_name.as_str(),
                body,
                settings.conflict_retry_budget,
            );
            if let Err(e) = engine.submit(item) {
                warn!(id = %document.id(), error = %e, "Bulk engine refused conversation document");
                report.failed.push(refused(document.id(), "validation_error", e.to_string()));
            }
        }

        let result = engine.close(cancel).await;

        if !result.succeeded.is_empty() {
            self.watermarks
                .set(&index_name, &result.succeeded, started_at)
                .await?;
        }

        let cancelled = result.errors.iter().any(|f| f.cause.is_cancelled());
        let transport_failures: Vec<String> = result
            .errors
            .iter()
            .filter(|f| f.cause.is_transport())
            .map(|f| format!("{}: {}", f.id, f.cause))
            .collect();

        let write_error = result.error();
        report.indexed.extend(result.succeeded);
        report.failed.extend(result.errors);

        info!(
            index = %index_name,
            indexed = report.indexed.len(),
            failed = report.failed.len(),
            "Reconciliation pass finished"
        );
        if let Some(error) = write_error {
            warn!(
                failed = error.failure_count(),
                error = %error,
                "Some conversations were not written and stay stale"
            );
        }

        if cancelled {
            return Err(ReconcileError::cancelled(format!(
                "pass cancelled after writing {} conversations",
                report.indexed.len()
            )));
        }
        if !transport_failures.is_empty() {
            return Err(ReconcileError::transport(transport_failures.join("; ")));
        }
        Ok(())
    }
}

fn refused(id: &str, error_type: &str, reason: String) -> ItemFailure {
    ItemFailure {
        id: id.to_string(),
        cause: ItemFailureCause::Rejected {
            status: 0,
            error_type: error_type.to_string(),
            reason,
        },
    }
}

fn distinct(ids: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.iter()
        .filter(|id| seen.insert(id.as_str()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distinct_keeps_first_seen_order() {
        let ids: Vec<String> = ["b", "a", "b", "c", "a"].iter().map(|s| s.to_string()).collect();
        assert_eq!(distinct(&ids), vec!["b", "a", "c"]);
    }

    #[test]
    fn test_refused_failure_is_a_rejection() {
        let failure = refused("conv-1", "encoding_error", "Tenant is not set".to_string());
        assert_eq!(failure.id, "conv-1");
        assert!(!failure.cause.is_transport());
        assert!(failure.cause.to_string().contains("encoding_error"));
    }
}
