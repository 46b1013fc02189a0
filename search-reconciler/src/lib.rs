//! # Search Reconciler
//!
//! Keeps the conversation search index eventually consistent with the
//! services that own conversation data, and serves tenant-scoped searches
//! over it.
//!
//! ## Architecture
//!
//! The write path follows a Select-Assemble-Load pattern:
//!
//! 1. **Reconciler**: Picks the conversations whose watermark is stale
//! 2. **Assembler**: Joins the conversation, membership, enrollment and location sources
//! 3. **Bulk engine**: Writes the tenant-stamped documents in batches
//!
//! Watermarks advance only for documents the engine acknowledged, so every
//! failed write is selected again by the next pass.
//!
//! ## Modules
//!
//! - [`assembler`]: Builds index documents from the upstream collaborators
//! - [`collaborators`]: Upstream collaborator interfaces and their records
//! - [`config`]: Static configuration and feature flag names
//! - [`reconciler`]: Staleness selection and the write pass
//! - [`searcher`]: The tenant-scoped read path
//! - [`errors`]: Error types for the pipeline

pub mod assembler;
pub mod collaborators;
pub mod config;
pub mod errors;
pub mod reconciler;
pub mod searcher;

pub use assembler::SourceAssembler;
pub use config::{ReconcilerConfig, NEXT_INDEX_FLAG};
pub use errors::{ReconcileError, UpstreamError};
pub use reconciler::{Clock, PassSettings, ReconcileReport, Reconciler, SystemClock};
pub use searcher::{ConversationSearcher, SearchOutcome};
