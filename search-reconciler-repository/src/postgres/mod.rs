//! PostgreSQL implementations of the repository interfaces.

mod watermark_store;

pub use watermark_store::PostgresWatermarkStore;
