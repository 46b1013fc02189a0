use thiserror::Error;

#[derive(Debug, Error)]
/// Represents errors that can occur within the watermark store.
///
/// Watermark reads and writes are never retried here; the caller decides
/// whether a failed pass is repeated.
pub enum WatermarkStoreError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),
}
