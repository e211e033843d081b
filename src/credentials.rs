//! Password storage for user accounts.
//!
//! Passwords are hashed with bcrypt on the blocking thread pool; only the
//! hash is ever written to the `users` table.

use actix_web::error::BlockingError;
use actix_web::web;
use bcrypt::BcryptError;
use secrecy::{ExposeSecret, SecretString};
use sqlx::SqlitePool;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::models::User;

#[derive(Debug, Error)]
pub enum CredentialError {
    /// The hashing primitive rejected the input (e.g. password over 72 bytes).
    #[error("password hashing failed: {0}")]
    Hashing(#[from] BcryptError),

    #[error("hashing task was cancelled")]
    Blocking(#[from] BlockingError),

    #[error("user not found")]
    NotFound,

    #[error(transparent)]
    Storage(#[from] RepositoryError),
}

pub struct CredentialStore {
    pool: SqlitePool,
    cost: u32,
}

impl CredentialStore {
    pub fn new(pool: SqlitePool, cost: u32) -> Self {
        Self { pool, cost }
    }

    /// Hash `password` and persist a new user.
    ///
    /// # Errors
    ///
    /// `Hashing` if bcrypt rejects the password, `Storage(Conflict)` if the
    /// username is taken, `Storage(Database)` on any other store failure.
    pub async fn register(
        &self,
        username: &str,
        password: &SecretString,
    ) -> Result<(), CredentialError> {
        let password_hash = hash_password(password, self.cost).await?;
        let user = User {
            username: username.to_owned(),
            password_hash,
        };

        sqlx::query("INSERT INTO users (username, password_hash) VALUES (?, ?)")
            .bind(&user.username)
            .bind(&user.password_hash)
            .execute(&self.pool)
            .await
            .map_err(|e| RepositoryError::from_insert(e, "user"))?;

        tracing::info!(username = %user.username, "user registered");
        Ok(())
    }

    /// Check `password` against the stored hash.
    ///
    /// Callers must not reveal to clients whether `NotFound` or `Ok(false)`
    /// was returned.
    ///
    /// # Errors
    ///
    /// `NotFound` if no such user, `Storage` if the lookup fails.
    pub async fn verify(
        &self,
        username: &str,
        password: &SecretString,
    ) -> Result<bool, CredentialError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT username, password_hash FROM users WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?
        .ok_or(CredentialError::NotFound)?;

        let candidate = password.expose_secret().to_owned();
        let matches =
            web::block(move || bcrypt::non_truncating_verify(candidate, &user.password_hash))
                .await??;
        Ok(matches)
    }
}

async fn hash_password(password: &SecretString, cost: u32) -> Result<String, CredentialError> {
    let plaintext = password.expose_secret().to_owned();
    let hashed = web::block(move || bcrypt::non_truncating_hash(plaintext, cost)).await??;
    Ok(hashed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing;

    fn secret(s: &str) -> SecretString {
        SecretString::from(s.to_string())
    }

    async fn store() -> CredentialStore {
        CredentialStore::new(testing::pool().await, 4)
    }

    #[actix_web::test]
    async fn test_register_then_verify() {
        let store = store().await;
        store.register("alice", &secret("s3cret")).await.unwrap();

        assert!(store.verify("alice", &secret("s3cret")).await.unwrap());
        assert!(!store.verify("alice", &secret("wrong")).await.unwrap());
    }

    #[actix_web::test]
    async fn test_plaintext_never_stored() {
        let store = store().await;
        store.register("alice", &secret("s3cret")).await.unwrap();

        let (hash,): (String,) =
            sqlx::query_as("SELECT password_hash FROM users WHERE username = 'alice'")
                .fetch_one(&store.pool)
                .await
                .unwrap();

        assert_ne!(hash, "s3cret");
        assert!(hash.starts_with("$2"));
    }

    #[actix_web::test]
    async fn test_unknown_user_is_not_found() {
        let store = store().await;
        let err = store.verify("nobody", &secret("x")).await.unwrap_err();
        assert!(matches!(err, CredentialError::NotFound));
    }

    #[actix_web::test]
    async fn test_duplicate_username_conflicts() {
        let store = store().await;
        store.register("alice", &secret("one")).await.unwrap();

        let err = store.register("alice", &secret("two")).await.unwrap_err();
        assert!(matches!(
            err,
            CredentialError::Storage(RepositoryError::Conflict(_))
        ));
        assert!(store.verify("alice", &secret("one")).await.unwrap());
    }

    #[actix_web::test]
    async fn test_overlong_password_is_hashing_error() {
        let store = store().await;
        let long = "a".repeat(100);

        let err = store.register("alice", &secret(&long)).await.unwrap_err();
        assert!(matches!(err, CredentialError::Hashing(_)));

        let err = store.verify("alice", &secret("a")).await.unwrap_err();
        assert!(matches!(err, CredentialError::NotFound));
    }
}
