//! Bulk upsert engine implementation.

use std::future::pending;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use search_reconciler_shared::IndexItem;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::config::BulkEngineConfig;
use crate::errors::{ItemFailureCause, SearchIndexError};
use crate::interfaces::SearchBackend;
use crate::types::{BulkResult, ItemOutcome};
use crate::utils::validate_index_item;

/// Batches index items and reports exactly one outcome per accepted item.
///
/// # Example
///
/// ```ignore
/// let engine = BulkUpsertEngine::open(backend, BulkEngineConfig::default());
/// engine.submit(IndexItem::upsert("conv-1", "conversations", body, 3))?;
/// let result = engine.close(&cancel).await;
/// assert_eq!(result.attempted(), 1);
/// ```
pub struct BulkUpsertEngine {
    sender: Option<mpsc::UnboundedSender<IndexItem>>,
    max_item_bytes: usize,
    rejected: AtomicUsize,
    shutdown: CancellationToken,
    worker: JoinHandle<()>,
    collector: JoinHandle<BulkResult>,
}

impl BulkUpsertEngine {
    /// Open an engine writing through `backend`.
    ///
    /// Spawns the flush worker and the outcome collector on the current
    /// tokio runtime.
    pub fn open(backend: Arc<dyn SearchBackend>, config: BulkEngineConfig) -> Self {
        let (sender, items) = mpsc::unbounded_channel();
        let (outcomes_tx, outcomes_rx) = mpsc::channel(config.failure_channel_capacity.max(1));
        let shutdown = CancellationToken::new();
        let max_item_bytes = config.max_batch_bytes;

        let worker = FlushWorker {
            backend,
            config,
            outcomes: outcomes_tx,
            shutdown: shutdown.clone(),
        };

        Self {
            sender: Some(sender),
            max_item_bytes,
            rejected: AtomicUsize::new(0),
            shutdown,
            worker: tokio::spawn(worker.run(items)),
            collector: tokio::spawn(collect_outcomes(outcomes_rx)),
        }
    }

    /// Queue an item for the next flush.
    ///
    /// Only the structural admission check runs here; the network round trip
    /// happens on the flush worker. A refused item is counted in
    /// [`BulkResult::rejected`] and never reaches the flush path.
    pub fn submit(&self, item: IndexItem) -> Result<(), SearchIndexError> {
        if let Err(e) = validate_index_item(&item, self.max_item_bytes) {
            self.rejected.fetch_add(1, Ordering::Relaxed);
            debug!(id = %item.id, error = %e, "Refused bulk item");
            return Err(e);
        }

        let sender = self.sender.as_ref().ok_or_else(|| {
            SearchIndexError::validation("Bulk engine is already closed".to_string())
        })?;

        sender.send(item).map_err(|e| {
            self.rejected.fetch_add(1, Ordering::Relaxed);
            SearchIndexError::cancelled(format!("Bulk engine stopped before item {} was queued", e.0.id))
        })
    }

    /// Flush everything still queued and wait for every outcome.
    ///
    /// If `cancel` fires first, the in-flight batch and every queued item are
    /// reported as [`ItemFailureCause::Cancelled`]; outcomes already observed
    /// are kept.
    #[instrument(skip(self, cancel))]
    pub async fn close(mut self, cancel: &CancellationToken) -> BulkResult {
        drop(self.sender.take());

        let mut worker = self.worker;
        tokio::select! {
            joined = &mut worker => {
                if let Err(e) = joined {
                    error!(error = %e, "Bulk flush worker terminated abnormally");
                }
            }
            _ = cancel.cancelled() => {
                warn!("Bulk engine close cancelled, abandoning unflushed items");
                self.shutdown.cancel();
                if let Err(e) = worker.await {
                    error!(error = %e, "Bulk flush worker terminated abnormally");
                }
            }
        }

        let mut result = match self.collector.await {
            Ok(result) => result,
            Err(e) => {
                error!(error = %e, "Bulk outcome collector terminated abnormally");
                BulkResult::default()
            }
        };
        result.rejected = self.rejected.load(Ordering::Relaxed);

        info!(
            succeeded = result.success_count,
            failed = result.errors.len(),
            rejected = result.rejected,
            "Bulk engine closed"
        );

        result
    }
}

async fn collect_outcomes(mut outcomes: mpsc::Receiver<ItemOutcome>) -> BulkResult {
    let mut result = BulkResult::default();
    while let Some(outcome) = outcomes.recv().await {
        if let Err(cause) = &outcome.result {
            warn!(id = %outcome.id, cause = %cause, "Bulk item failed");
        }
        result.record(outcome);
    }
    result
}

enum FlushOutcome {
    Completed,
    Cancelled,
}

struct FlushWorker {
    backend: Arc<dyn SearchBackend>,
    config: BulkEngineConfig,
    outcomes: mpsc::Sender<ItemOutcome>,
    shutdown: CancellationToken,
}

impl FlushWorker {
    async fn run(self, mut items: mpsc::UnboundedReceiver<IndexItem>) {
        let mut batch: Vec<IndexItem> = Vec::with_capacity(self.config.max_batch_items);
        let mut batch_bytes = 0usize;
        let mut ticker = self.config.flush_interval.map(|period| {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => {
                    self.abandon(batch, &mut items).await;
                    return;
                }
                received = items.recv() => {
                    let Some(item) = received else {
                        break;
                    };
                    let size = item.encoded_len();
                    if !batch.is_empty() && batch_bytes + size > self.config.max_batch_bytes {
                        batch_bytes = 0;
                        if let FlushOutcome::Cancelled = self.flush(std::mem::take(&mut batch)).await {
                            self.abandon(Vec::new(), &mut items).await;
                            return;
                        }
                    }
                    batch_bytes += size;
                    batch.push(item);
                    if batch.len() >= self.config.max_batch_items {
                        batch_bytes = 0;
                        if let FlushOutcome::Cancelled = self.flush(std::mem::take(&mut batch)).await {
                            self.abandon(Vec::new(), &mut items).await;
                            return;
                        }
                    }
                }
                _ = next_tick(&mut ticker) => {
                    if !batch.is_empty() {
                        batch_bytes = 0;
                        if let FlushOutcome::Cancelled = self.flush(std::mem::take(&mut batch)).await {
                            self.abandon(Vec::new(), &mut items).await;
                            return;
                        }
                    }
                }
            }
        }

        if !batch.is_empty() {
            self.flush(batch).await;
        }
    }

    /// Write one batch, resubmitting conflicted items while their budget lasts.
    async fn flush(&self, batch: Vec<IndexItem>) -> FlushOutcome {
        let mut pending: Vec<(IndexItem, u32)> = batch.into_iter().map(|item| (item, 1)).collect();

        while !pending.is_empty() {
            let items: Vec<IndexItem> = pending.iter().map(|(item, _)| item.clone()).collect();
            debug!(count = items.len(), "Flushing bulk batch");

            let response = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => {
                    for (item, _) in pending {
                        self.report(ItemOutcome::failed(item.id, ItemFailureCause::Cancelled)).await;
                    }
                    return FlushOutcome::Cancelled;
                }
                response = self.backend.bulk(&items) => response,
            };

            let responses = match response {
                Ok(responses) if responses.len() == pending.len() => responses,
                Ok(responses) => {
                    error!(
                        expected = pending.len(),
                        received = responses.len(),
                        "Bulk response item count does not match request"
                    );
                    let cause = ItemFailureCause::Transport(format!(
                        "bulk response carried {} items for {} requested",
                        responses.len(),
                        pending.len()
                    ));
                    self.fail_all(pending, cause).await;
                    return FlushOutcome::Completed;
                }
                Err(e) => {
                    error!(error = %e, count = pending.len(), "Bulk request failed");
                    self.fail_all(pending, batch_failure_cause(e)).await;
                    return FlushOutcome::Completed;
                }
            };

            let mut retries = Vec::new();
            for ((item, attempts), response) in pending.into_iter().zip(responses) {
                if response.is_success() {
                    self.report(ItemOutcome::succeeded(item.id)).await;
                } else if response.is_conflict() {
                    if attempts <= item.conflict_retry_budget {
                        debug!(id = %item.id, attempts = attempts, "Retrying conflicted bulk item");
                        retries.push((item, attempts + 1));
                    } else {
                        self.report(ItemOutcome::failed(
                            item.id,
                            ItemFailureCause::ConflictExhausted { attempts },
                        ))
                        .await;
                    }
                } else {
                    self.report(ItemOutcome::failed(item.id, response.rejection())).await;
                }
            }
            pending = retries;
        }

        FlushOutcome::Completed
    }

    async fn fail_all(&self, pending: Vec<(IndexItem, u32)>, cause: ItemFailureCause) {
        for (item, _) in pending {
            self.report(ItemOutcome::failed(item.id, cause.clone())).await;
        }
    }

    /// Report the unflushed batch and everything still queued as cancelled.
    async fn abandon(&self, batch: Vec<IndexItem>, items: &mut mpsc::UnboundedReceiver<IndexItem>) {
        items.close();
        let mut abandoned = 0usize;
        for item in batch {
            abandoned += 1;
            self.report(ItemOutcome::failed(item.id, ItemFailureCause::Cancelled)).await;
        }
        while let Some(item) = items.recv().await {
            abandoned += 1;
            self.report(ItemOutcome::failed(item.id, ItemFailureCause::Cancelled)).await;
        }
        if abandoned > 0 {
            warn!(count = abandoned, "Abandoned unflushed bulk items");
        }
    }

    async fn report(&self, outcome: ItemOutcome) {
        if self.outcomes.send(outcome).await.is_err() {
            error!("Bulk outcome collector is gone");
        }
    }
}

fn batch_failure_cause(error: SearchIndexError) -> ItemFailureCause {
    match error {
        SearchIndexError::EngineError {
            error_type,
            message,
            ..
        } => ItemFailureCause::Rejected {
            status: 0,
            error_type,
            reason: message,
        },
        other => ItemFailureCause::Transport(other.to_string()),
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => pending::<()>().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opensearch::IndexConfig;
    use crate::types::{BulkItemResponse, EngineErrorBody};
    use async_trait::async_trait;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Backend that answers from a script keyed by item id.
    #[derive(Default)]
    struct ScriptedBackend {
        calls: Mutex<Vec<Vec<String>>>,
        /// Number of conflicts still to report per id.
        conflicts: Mutex<HashMap<String, u32>>,
        rejected: HashSet<String>,
        transport_failure: bool,
        drop_last_response: bool,
        delay: Option<Duration>,
        /// Batches containing any of these ids never complete.
        hang_on: HashSet<String>,
    }

    impl ScriptedBackend {
        fn with_conflicts(conflicts: &[(&str, u32)]) -> Self {
            Self {
                conflicts: Mutex::new(
                    conflicts
                        .iter()
                        .map(|(id, n)| (id.to_string(), *n))
                        .collect(),
                ),
                ..Default::default()
            }
        }

        fn calls(&self) -> Vec<Vec<String>> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SearchBackend for ScriptedBackend {
        async fn ensure_index_exists(
            &self,
            _index: &IndexConfig,
            _attach_alias: bool,
        ) -> Result<(), SearchIndexError> {
            Ok(())
        }

        async fn bulk(
            &self,
            items: &[IndexItem],
        ) -> Result<Vec<BulkItemResponse>, SearchIndexError> {
            self.calls
                .lock()
                .unwrap()
                .push(items.iter().map(|i| i.id.clone()).collect());

            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if items.iter().any(|item| self.hang_on.contains(&item.id)) {
                pending::<()>().await;
            }
            if self.transport_failure {
                return Err(SearchIndexError::transport("connection refused"));
            }

            let mut conflicts = self.conflicts.lock().unwrap();
            let mut responses: Vec<BulkItemResponse> = items
                .iter()
                .map(|item| {
                    let remaining = conflicts.entry(item.id.clone()).or_insert(0);
                    let (status, error) = if self.rejected.contains(&item.id) {
                        (
                            400,
                            Some(EngineErrorBody {
                                error_type: "mapper_parsing_exception".to_string(),
                                reason: "failed to parse".to_string(),
                                ..Default::default()
                            }),
                        )
                    } else if *remaining > 0 {
                        *remaining -= 1;
                        (
                            409,
                            Some(EngineErrorBody {
                                error_type: "version_conflict_engine_exception".to_string(),
                                reason: "version conflict".to_string(),
                                ..Default::default()
                            }),
                        )
                    } else {
                        (200, None)
                    };
                    BulkItemResponse {
                        action: item.action.as_str().to_string(),
                        id: item.id.clone(),
                        status,
                        error,
                    }
                })
                .collect();

            if self.drop_last_response {
                responses.pop();
            }
            Ok(responses)
        }

        async fn search(
            &self,
            _index: &str,
            _body: &serde_json::Value,
        ) -> Result<Vec<u8>, SearchIndexError> {
            Ok(Vec::new())
        }
    }

    fn upsert(id: &str, budget: u32) -> IndexItem {
        IndexItem::upsert(id, "conversations", br#"{"resource_path":"org-1"}"#.to_vec(), budget)
    }

    #[tokio::test]
    async fn test_partial_failure_after_conflict_budget() {
        let backend = Arc::new(ScriptedBackend::with_conflicts(&[("b", u32::MAX)]));
        let engine = BulkUpsertEngine::open(backend.clone(), BulkEngineConfig::default());

        for id in ["a", "b", "c"] {
            engine.submit(upsert(id, 2)).unwrap();
        }
        let result = engine.close(&CancellationToken::new()).await;

        assert_eq!(result.success_count, 2);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].id, "b");
        assert_eq!(
            result.errors[0].cause,
            ItemFailureCause::ConflictExhausted { attempts: 3 }
        );
        assert_eq!(result.attempted(), 3);

        let calls = backend.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0], vec!["a", "b", "c"]);
        assert_eq!(calls[1], vec!["b"]);
        assert_eq!(calls[2], vec!["b"]);
    }

    #[tokio::test]
    async fn test_conflict_resolved_within_budget() {
        let backend = Arc::new(ScriptedBackend::with_conflicts(&[("a", 1)]));
        let engine = BulkUpsertEngine::open(backend.clone(), BulkEngineConfig::default());

        engine.submit(upsert("a", 3)).unwrap();
        let result = engine.close(&CancellationToken::new()).await;

        assert_eq!(result.success_count, 1);
        assert!(result.is_complete_success());
        assert_eq!(backend.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_zero_budget_reports_first_conflict() {
        let backend = Arc::new(ScriptedBackend::with_conflicts(&[("a", 1)]));
        let engine = BulkUpsertEngine::open(backend.clone(), BulkEngineConfig::default());

        engine.submit(upsert("a", 0)).unwrap();
        let result = engine.close(&CancellationToken::new()).await;

        assert_eq!(
            result.errors[0].cause,
            ItemFailureCause::ConflictExhausted { attempts: 1 }
        );
        assert_eq!(backend.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_rejected_items_are_attributed() {
        let backend = Arc::new(ScriptedBackend {
            rejected: HashSet::from(["bad".to_string()]),
            ..Default::default()
        });
        let engine = BulkUpsertEngine::open(backend, BulkEngineConfig::default());

        engine.submit(upsert("good", 0)).unwrap();
        engine.submit(upsert("bad", 0)).unwrap();
        let result = engine.close(&CancellationToken::new()).await;

        assert_eq!(result.success_count, 1);
        assert_eq!(result.errors.len(), 1);
        match &result.errors[0].cause {
            ItemFailureCause::Rejected {
                status, error_type, ..
            } => {
                assert_eq!(*status, 400);
                assert_eq!(error_type, "mapper_parsing_exception");
            }
            other => panic!("Expected Rejected, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_submit_validation_is_counted_separately() {
        let backend = Arc::new(ScriptedBackend::default());
        let engine = BulkUpsertEngine::open(backend.clone(), BulkEngineConfig::default());

        assert!(engine.submit(upsert("", 0)).is_err());
        assert!(engine
            .submit(IndexItem::create("a", "conversations", Vec::new()))
            .is_err());
        engine.submit(upsert("b", 0)).unwrap();

        let result = engine.close(&CancellationToken::new()).await;
        assert_eq!(result.rejected, 2);
        assert_eq!(result.success_count, 1);
        assert!(result.errors.is_empty());
        assert_eq!(backend.calls(), vec![vec!["b".to_string()]]);
    }

    #[tokio::test]
    async fn test_batches_by_item_count() {
        let backend = Arc::new(ScriptedBackend::default());
        let engine =
            BulkUpsertEngine::open(backend.clone(), BulkEngineConfig::with_max_batch_items(2));

        for i in 0..5 {
            engine.submit(upsert(&format!("conv-{}", i), 0)).unwrap();
        }
        let result = engine.close(&CancellationToken::new()).await;

        assert_eq!(result.success_count, 5);
        let sizes: Vec<usize> = backend.calls().iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
    }

    #[tokio::test]
    async fn test_batches_by_bytes() {
        let backend = Arc::new(ScriptedBackend::default());
        let item_size = upsert("conv-0", 0).encoded_len();
        let config = BulkEngineConfig::default().max_batch_bytes(item_size * 2 + 1);
        let engine = BulkUpsertEngine::open(backend.clone(), config);

        for i in 0..3 {
            engine.submit(upsert(&format!("conv-{}", i), 0)).unwrap();
        }
        let result = engine.close(&CancellationToken::new()).await;

        assert_eq!(result.success_count, 3);
        let sizes: Vec<usize> = backend.calls().iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![2, 1]);
    }

    #[tokio::test]
    async fn test_transport_failure_fails_every_item() {
        let backend = Arc::new(ScriptedBackend {
            transport_failure: true,
            ..Default::default()
        });
        let engine = BulkUpsertEngine::open(backend, BulkEngineConfig::default());

        engine.submit(upsert("a", 5)).unwrap();
        engine.submit(upsert("b", 5)).unwrap();
        let result = engine.close(&CancellationToken::new()).await;

        assert_eq!(result.success_count, 0);
        assert_eq!(result.errors.len(), 2);
        assert!(result.errors.iter().all(|f| f.cause.is_transport()));
    }

    #[tokio::test]
    async fn test_response_count_mismatch_fails_batch() {
        let backend = Arc::new(ScriptedBackend {
            drop_last_response: true,
            ..Default::default()
        });
        let engine = BulkUpsertEngine::open(backend, BulkEngineConfig::default());

        engine.submit(upsert("a", 0)).unwrap();
        engine.submit(upsert("b", 0)).unwrap();
        let result = engine.close(&CancellationToken::new()).await;

        assert_eq!(result.errors.len(), 2);
        assert!(result.errors.iter().all(|f| f.cause.is_transport()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_reports_unflushed_items() {
        let backend = Arc::new(ScriptedBackend {
            delay: Some(Duration::from_secs(60)),
            ..Default::default()
        });
        let engine =
            BulkUpsertEngine::open(backend.clone(), BulkEngineConfig::with_max_batch_items(2));

        for id in ["a", "b", "c"] {
            engine.submit(upsert(id, 0)).unwrap();
        }

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });

        let result = engine.close(&cancel).await;

        assert_eq!(result.success_count, 0);
        assert_eq!(result.attempted(), 3);
        assert!(result.errors.iter().all(|f| f.cause.is_cancelled()));
        let mut ids: Vec<&str> = result.errors.iter().map(|f| f.id.as_str()).collect();
        ids.sort();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_keeps_outcomes_of_completed_batches() {
        let backend = Arc::new(ScriptedBackend {
            hang_on: HashSet::from(["b".to_string()]),
            ..Default::default()
        });
        let engine =
            BulkUpsertEngine::open(backend.clone(), BulkEngineConfig::with_max_batch_items(1));

        for id in ["a", "b", "c"] {
            engine.submit(upsert(id, 0)).unwrap();
        }

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });

        let result = engine.close(&cancel).await;

        assert_eq!(result.succeeded, vec!["a".to_string()]);
        assert_eq!(result.success_count, 1);
        let cancelled: Vec<&str> = result
            .errors
            .iter()
            .filter(|f| f.cause.is_cancelled())
            .map(|f| f.id.as_str())
            .collect();
        assert_eq!(cancelled, vec!["b", "c"]);
        assert_eq!(result.errors.len(), 2);
        assert_eq!(backend.calls(), vec![vec!["a".to_string()], vec!["b".to_string()]]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_interval_flushes_partial_batch() {
        let backend = Arc::new(ScriptedBackend::default());
        let config = BulkEngineConfig::default().flush_interval(Duration::from_millis(50));
        let engine = BulkUpsertEngine::open(backend.clone(), config);

        engine.submit(upsert("a", 0)).unwrap();
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(backend.calls().len(), 1);

        let result = engine.close(&CancellationToken::new()).await;
        assert_eq!(result.success_count, 1);
        assert_eq!(backend.calls().len(), 1);
    }
}
