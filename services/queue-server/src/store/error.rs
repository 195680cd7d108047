//! Store error types.

use thiserror::Error;

/// Persistence operation errors.
///
/// Store faults are fatal to the individual operation; the periodic cycle
/// logs them and continues on the next tick.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Failed to connect to the database.
    #[error("failed to connect to database: {0}")]
    Connect(#[source] sqlx::Error),

    /// Failed to execute a query.
    #[error("query failed: {0}")]
    Query(#[source] sqlx::Error),

    /// Failed to run migrations.
    #[error("migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),

    /// Migration directory not found in the current environment.
    #[error("migration directory not found; tried {tried}. Last error: {last_error}. Run from repo root or services/queue-server.")]
    MigrationDirNotFound { tried: String, last_error: String },

    /// A stored row could not be decoded into a domain value.
    #[error("corrupt row: {0}")]
    Decode(String),
}
