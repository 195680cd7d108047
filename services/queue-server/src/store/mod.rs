//! Persistence layer for tokens and counters.
//!
//! The scheduler and lifecycle manager only see the [`QueueStore`] trait.
//! Two implementations exist:
//! - [`PgStore`]: SQLx/Postgres, used in production
//! - [`MemoryStore`]: in-process, used in dev mode and tests

mod error;
mod memory;
mod postgres;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use postgres::PgStore;

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{Counter, CounterId, Token, TokenNumber};

/// Repository interface for queue state.
///
/// Implementations must make [`save_assignment`](QueueStore::save_assignment)
/// atomic: the coupled token+counter write is a cross-aggregate transaction
/// and must never be observable half-applied.
#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Issue a new waiting token. The store allocates the next monotonic
    /// token number.
    async fn create_token(
        &self,
        customer_name: &str,
        phone_number: Option<&str>,
    ) -> Result<Token, StoreError>;

    async fn token(&self, token_number: TokenNumber) -> Result<Option<Token>, StoreError>;

    /// All waiting tokens, ascending by token number.
    async fn waiting_tokens(&self) -> Result<Vec<Token>, StoreError>;

    /// All tokens currently being served.
    async fn serving_tokens(&self) -> Result<Vec<Token>, StoreError>;

    /// Waiting and serving tokens, ascending by token number.
    async fn active_tokens(&self) -> Result<Vec<Token>, StoreError>;

    /// Most recently issued completed tokens.
    async fn served_tokens(&self, limit: i64) -> Result<Vec<Token>, StoreError>;

    /// Number of active tokens with a smaller token number.
    async fn waiting_ahead(&self, token_number: TokenNumber) -> Result<u64, StoreError>;

    async fn create_counter(&self, name: &str) -> Result<Counter, StoreError>;

    async fn counter(&self, id: CounterId) -> Result<Option<Counter>, StoreError>;

    async fn counters(&self) -> Result<Vec<Counter>, StoreError>;

    /// Free counters ranked for assignment: never-used first, then oldest
    /// `last_completed_at`, id as tie-break.
    async fn available_counters(&self) -> Result<Vec<Counter>, StoreError>;

    async fn save_token(&self, token: &Token) -> Result<(), StoreError>;

    /// Persist a coupled token+counter mutation as one atomic unit.
    async fn save_assignment(&self, token: &Token, counter: &Counter) -> Result<(), StoreError>;

    /// Delete every token and re-seed number allocation so the next
    /// issuance is #1.
    async fn delete_all_tokens(&self) -> Result<(), StoreError>;

    /// Mark every counter available with no current token.
    async fn reset_counters(&self) -> Result<(), StoreError>;

    async fn health_check(&self) -> Result<(), StoreError>;
}

/// Database configuration.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Database connection URL.
    pub database_url: String,

    /// Maximum number of connections in the pool.
    pub max_connections: u32,

    /// Minimum number of idle connections.
    pub min_connections: u32,

    /// Connection acquire timeout.
    pub acquire_timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            database_url: "postgres://localhost/tokenq".to_string(),
            max_connections: 10,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(5),
        }
    }
}

impl DbConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgres://localhost/tokenq".to_string());

        let max_connections = std::env::var("DB_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(10);

        let min_connections = std::env::var("DB_MIN_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(1);

        Self {
            database_url,
            max_connections,
            min_connections,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn db_config_defaults() {
        let config = DbConfig::default();
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.min_connections, 1);
    }
}
