//! Connection pool and schema for the relational store.
//!
//! Tables (see `migrations/`):
//! - `users` - username + bcrypt hash
//! - `orders` - aggregate root
//! - `items` - line items, `order_id` references `orders`

use std::str::FromStr;
use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use thiserror::Error;

use crate::config::Config;

pub static MIGRATOR: Migrator = sqlx::migrate!();

/// Errors surfaced by the repositories.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g. duplicate username).
    #[error("constraint violation: {0}")]
    Conflict(String),

    #[error("operation exceeded {0:?} deadline")]
    Timeout(Duration),
}

impl RepositoryError {
    /// Map unique-key violations to `Conflict`, everything else to `Database`.
    pub(crate) fn from_insert(err: sqlx::Error, what: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = err {
            if db_err.is_unique_violation() {
                return Self::Conflict(format!("{what} already exists"));
            }
        }
        Self::Database(err)
    }
}

/// Create the pool described by `config`.
///
/// An in-memory database lives only as long as its connection, so it gets a
/// single connection that is never recycled.
///
/// # Errors
///
/// Returns `sqlx::Error` if the URL is invalid or the store is unreachable.
pub async fn create_pool(config: &Config) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(config.database_url.expose_secret())?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool_options = if config.is_in_memory_database() {
        SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(config.database_max_connections)
    };

    pool_options
        .acquire_timeout(Duration::from_secs(10))
        .connect_with(options)
        .await
}

/// Apply pending migrations.
///
/// # Errors
///
/// Returns `MigrateError` if a migration fails or the recorded history diverges.
pub async fn migrate(pool: &SqlitePool) -> Result<(), sqlx::migrate::MigrateError> {
    MIGRATOR.run(pool).await
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    pub const SECRET: &str = "test-secret-0123456789abcdef-0123456789";

    pub fn config() -> Config {
        Config::from_lookup(|key| match key {
            "JWT_SECRET" => Some(SECRET.to_string()),
            "DATABASE_URL" => Some("sqlite::memory:".to_string()),
            "BCRYPT_COST" => Some("4".to_string()),
            _ => None,
        })
        .unwrap()
    }

    pub async fn pool() -> SqlitePool {
        let pool = create_pool(&config()).await.unwrap();
        migrate(&pool).await.unwrap();
        pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[actix_web::test]
    async fn test_migrations_create_schema() {
        let pool = testing::pool().await;

        let tables: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name IN ('users', 'orders', 'items') ORDER BY name",
        )
        .fetch_all(&pool)
        .await
        .unwrap();

        let names: Vec<&str> = tables.iter().map(|(n,)| n.as_str()).collect();
        assert_eq!(names, ["items", "orders", "users"]);
    }

    #[actix_web::test]
    async fn test_foreign_keys_enforced() {
        let pool = testing::pool().await;

        let err = sqlx::query(
            "INSERT INTO items (order_id, item_code, description, quantity) VALUES (999, 'X', 'orphan', 1)",
        )
        .execute(&pool)
        .await
        .unwrap_err();

        assert!(matches!(err, sqlx::Error::Database(_)));
    }

    #[actix_web::test]
    async fn test_unique_violation_maps_to_conflict() {
        let pool = testing::pool().await;
        let insert = "INSERT INTO users (username, password_hash) VALUES ('alice', 'h')";

        sqlx::query(insert).execute(&pool).await.unwrap();
        let err = sqlx::query(insert).execute(&pool).await.unwrap_err();

        assert!(matches!(
            RepositoryError::from_insert(err, "user"),
            RepositoryError::Conflict(_)
        ));
    }
}
