//! # Search Reconciler Repository
//!
//! This crate provides traits and implementations for everything the
//! reconciler reads from or writes to: the search engine (with an OpenSearch
//! implementation), the batched write path on top of it, response decoding,
//! and the per-entity watermark store (PostgreSQL and in-memory).

pub mod bulk;
pub mod config;
pub mod errors;
pub mod interfaces;
pub mod memory;
pub mod opensearch;
pub mod postgres;
pub mod response_parser;
pub mod types;
pub mod utils;

pub use bulk::BulkUpsertEngine;
pub use config::BulkEngineConfig;
pub use errors::{ItemFailureCause, SearchIndexError, WatermarkStoreError};
pub use interfaces::{SearchBackend, WatermarkStore};
pub use memory::InMemoryWatermarkStore;
pub use opensearch::{IndexConfig, OpenSearchProvider};
pub use postgres::PostgresWatermarkStore;
pub use response_parser::{parse_bulk_response, parse_hits, parse_query_response, Hit, QueryResult};
pub use types::{BulkItemResponse, BulkResult, EngineErrorBody, ItemFailure, ItemOutcome};
pub use utils::validate_index_item;
