//! Postgres-backed queue store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

use crate::domain::{Counter, CounterId, Token, TokenNumber, TokenState};

use super::{DbConfig, QueueStore, StoreError};

const TOKEN_COLUMNS: &str = "token_number, customer_name, phone_number, issued_at, state, \
     started_serving, completed_serving, assigned_counter";

const COUNTER_COLUMNS: &str = "id, name, is_available, current_token, last_completed_at";

/// Queue store backed by a Postgres connection pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Create a new connection pool.
    pub async fn connect(config: &DbConfig) -> Result<Self, StoreError> {
        info!(
            max_connections = config.max_connections,
            min_connections = config.min_connections,
            "Connecting to database"
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect(&config.database_url)
            .await
            .map_err(StoreError::Connect)?;

        info!("Database connection pool established");

        Ok(Self { pool })
    }

    /// Run pending migrations.
    ///
    /// Uses runtime migration loading so the binary can be started from
    /// the repo root or the service directory.
    pub async fn run_migrations(&self) -> Result<(), StoreError> {
        info!("Running database migrations");

        let candidates = vec![
            std::path::PathBuf::from("./migrations"),
            std::path::PathBuf::from("services/queue-server/migrations"),
            std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("migrations"),
        ];
        let mut last_error: Option<sqlx::migrate::MigrateError> = None;

        for dir in &candidates {
            match sqlx::migrate::Migrator::new(dir.clone()).await {
                Ok(migrator) => {
                    info!(migrations_dir = %dir.display(), "Loaded migrations");
                    migrator
                        .run(&self.pool)
                        .await
                        .map_err(StoreError::Migration)?;
                    info!("Database migrations complete");
                    return Ok(());
                }
                Err(e) => {
                    last_error = Some(e);
                }
            }
        }

        let tried = candidates
            .iter()
            .map(|dir| dir.display().to_string())
            .collect::<Vec<_>>()
            .join(", ");

        Err(StoreError::MigrationDirNotFound {
            tried,
            last_error: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "unknown error".to_string()),
        })
    }

    async fn fetch_tokens(&self, predicate: &str) -> Result<Vec<Token>, StoreError> {
        let sql = format!("SELECT {TOKEN_COLUMNS} FROM tokens {predicate}");
        let rows = sqlx::query_as::<_, TokenRow>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::Query)?;
        rows.into_iter().map(Token::try_from).collect()
    }
}

#[async_trait]
impl QueueStore for PgStore {
    async fn create_token(
        &self,
        customer_name: &str,
        phone_number: Option<&str>,
    ) -> Result<Token, StoreError> {
        let sql = format!(
            "INSERT INTO tokens (customer_name, phone_number) VALUES ($1, $2) \
             RETURNING {TOKEN_COLUMNS}"
        );
        let row = sqlx::query_as::<_, TokenRow>(&sql)
            .bind(customer_name)
            .bind(phone_number)
            .fetch_one(&self.pool)
            .await
            .map_err(StoreError::Query)?;
        Token::try_from(row)
    }

    async fn token(&self, token_number: TokenNumber) -> Result<Option<Token>, StoreError> {
        let sql = format!("SELECT {TOKEN_COLUMNS} FROM tokens WHERE token_number = $1");
        let row = sqlx::query_as::<_, TokenRow>(&sql)
            .bind(token_number)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::Query)?;
        row.map(Token::try_from).transpose()
    }

    async fn waiting_tokens(&self) -> Result<Vec<Token>, StoreError> {
        self.fetch_tokens("WHERE state = 'waiting' ORDER BY token_number")
            .await
    }

    async fn serving_tokens(&self) -> Result<Vec<Token>, StoreError> {
        self.fetch_tokens("WHERE state = 'serving' ORDER BY token_number")
            .await
    }

    async fn active_tokens(&self) -> Result<Vec<Token>, StoreError> {
        self.fetch_tokens("WHERE state <> 'completed' ORDER BY token_number")
            .await
    }

    async fn served_tokens(&self, limit: i64) -> Result<Vec<Token>, StoreError> {
        let sql = format!(
            "SELECT {TOKEN_COLUMNS} FROM tokens WHERE state = 'completed' \
             ORDER BY issued_at DESC LIMIT $1"
        );
        let rows = sqlx::query_as::<_, TokenRow>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::Query)?;
        rows.into_iter().map(Token::try_from).collect()
    }

    async fn waiting_ahead(&self, token_number: TokenNumber) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM tokens WHERE state <> 'completed' AND token_number < $1",
        )
        .bind(token_number)
        .fetch_one(&self.pool)
        .await
        .map_err(StoreError::Query)?;
        Ok(count as u64)
    }

    async fn create_counter(&self, name: &str) -> Result<Counter, StoreError> {
        let sql = format!("INSERT INTO counters (name) VALUES ($1) RETURNING {COUNTER_COLUMNS}");
        let row = sqlx::query_as::<_, CounterRow>(&sql)
            .bind(name)
            .fetch_one(&self.pool)
            .await
            .map_err(StoreError::Query)?;
        Ok(row.into())
    }

    async fn counter(&self, id: CounterId) -> Result<Option<Counter>, StoreError> {
        let sql = format!("SELECT {COUNTER_COLUMNS} FROM counters WHERE id = $1");
        let row = sqlx::query_as::<_, CounterRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::Query)?;
        Ok(row.map(Counter::from))
    }

    async fn counters(&self) -> Result<Vec<Counter>, StoreError> {
        let sql = format!("SELECT {COUNTER_COLUMNS} FROM counters ORDER BY id");
        let rows = sqlx::query_as::<_, CounterRow>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::Query)?;
        Ok(rows.into_iter().map(Counter::from).collect())
    }

    async fn available_counters(&self) -> Result<Vec<Counter>, StoreError> {
        // Oldest-idle-first, never-used counters first, id as tie-break.
        let sql = format!(
            "SELECT {COUNTER_COLUMNS} FROM counters WHERE is_available \
             ORDER BY last_completed_at ASC NULLS FIRST, id ASC"
        );
        let rows = sqlx::query_as::<_, CounterRow>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::Query)?;
        Ok(rows.into_iter().map(Counter::from).collect())
    }

    async fn save_token(&self, token: &Token) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE tokens SET state = $2, started_serving = $3, completed_serving = $4, \
             assigned_counter = $5 WHERE token_number = $1",
        )
        .bind(token.token_number)
        .bind(token.state.as_str())
        .bind(token.started_serving)
        .bind(token.completed_serving)
        .bind(token.assigned_counter)
        .execute(&self.pool)
        .await
        .map_err(StoreError::Query)?;
        Ok(())
    }

    async fn save_assignment(&self, token: &Token, counter: &Counter) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(StoreError::Query)?;

        sqlx::query(
            "UPDATE tokens SET state = $2, started_serving = $3, completed_serving = $4, \
             assigned_counter = $5 WHERE token_number = $1",
        )
        .bind(token.token_number)
        .bind(token.state.as_str())
        .bind(token.started_serving)
        .bind(token.completed_serving)
        .bind(token.assigned_counter)
        .execute(&mut *tx)
        .await
        .map_err(StoreError::Query)?;

        sqlx::query(
            "UPDATE counters SET is_available = $2, current_token = $3, last_completed_at = $4 \
             WHERE id = $1",
        )
        .bind(counter.id)
        .bind(counter.is_available)
        .bind(counter.current_token)
        .bind(counter.last_completed_at)
        .execute(&mut *tx)
        .await
        .map_err(StoreError::Query)?;

        tx.commit().await.map_err(StoreError::Query)
    }

    async fn delete_all_tokens(&self) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(StoreError::Query)?;

        sqlx::query("DELETE FROM tokens")
            .execute(&mut *tx)
            .await
            .map_err(StoreError::Query)?;

        // Token numbers restart from 1 on the next issuance.
        sqlx::query("ALTER SEQUENCE tokens_token_number_seq RESTART WITH 1")
            .execute(&mut *tx)
            .await
            .map_err(StoreError::Query)?;

        tx.commit().await.map_err(StoreError::Query)
    }

    async fn reset_counters(&self) -> Result<(), StoreError> {
        sqlx::query("UPDATE counters SET is_available = TRUE, current_token = NULL")
            .execute(&self.pool)
            .await
            .map_err(StoreError::Query)?;
        Ok(())
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(StoreError::Query)?;
        Ok(())
    }
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(Debug)]
struct TokenRow {
    token_number: i64,
    customer_name: String,
    phone_number: Option<String>,
    issued_at: DateTime<Utc>,
    state: String,
    started_serving: Option<DateTime<Utc>>,
    completed_serving: Option<DateTime<Utc>>,
    assigned_counter: Option<i64>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for TokenRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        use sqlx::Row;
        Ok(Self {
            token_number: row.try_get("token_number")?,
            customer_name: row.try_get("customer_name")?,
            phone_number: row.try_get("phone_number")?,
            issued_at: row.try_get("issued_at")?,
            state: row.try_get("state")?,
            started_serving: row.try_get("started_serving")?,
            completed_serving: row.try_get("completed_serving")?,
            assigned_counter: row.try_get("assigned_counter")?,
        })
    }
}

impl TryFrom<TokenRow> for Token {
    type Error = StoreError;

    fn try_from(row: TokenRow) -> Result<Self, StoreError> {
        let state = TokenState::parse(&row.state).ok_or_else(|| {
            StoreError::Decode(format!(
                "token #{} has unknown state '{}'",
                row.token_number, row.state
            ))
        })?;
        Ok(Token {
            token_number: row.token_number,
            customer_name: row.customer_name,
            phone_number: row.phone_number,
            issued_at: row.issued_at,
            state,
            started_serving: row.started_serving,
            completed_serving: row.completed_serving,
            assigned_counter: row.assigned_counter,
        })
    }
}

#[derive(Debug)]
struct CounterRow {
    id: i64,
    name: String,
    is_available: bool,
    current_token: Option<i64>,
    last_completed_at: Option<DateTime<Utc>>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for CounterRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        use sqlx::Row;
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            is_available: row.try_get("is_available")?,
            current_token: row.try_get("current_token")?,
            last_completed_at: row.try_get("last_completed_at")?,
        })
    }
}

impl From<CounterRow> for Counter {
    fn from(row: CounterRow) -> Self {
        Counter {
            id: row.id,
            name: row.name,
            is_available: row.is_available,
            current_token: row.current_token,
            last_completed_at: row.last_completed_at,
        }
    }
}
