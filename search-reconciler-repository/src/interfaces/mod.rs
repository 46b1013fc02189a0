//! Interface definitions for the repository layer.
//!
//! `SearchBackend` abstracts the search engine wire calls and
//! `WatermarkStore` abstracts the per-entity watermark persistence, so both
//! can be swapped for in-memory implementations in tests.

mod search_backend;
mod watermark_store;

pub use search_backend::SearchBackend;
pub use watermark_store::WatermarkStore;
