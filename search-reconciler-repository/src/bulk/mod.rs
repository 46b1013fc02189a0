//! Batched write path to the search engine.
//!
//! The [`BulkUpsertEngine`] accepts items synchronously, flushes them in
//! batches from one worker task and funnels every per-item outcome through a
//! single bounded channel drained by one collector task.

mod engine;

pub use engine::BulkUpsertEngine;
