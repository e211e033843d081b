//! Service configuration loaded from environment variables.
//!
//! A `.env` file in the working directory is read first if present.
//!
//! ## Required
//! - `JWT_SECRET` - token signing key, at least 32 bytes
//!
//! ## Optional
//! - `DATABASE_URL` - store URL (default: `sqlite://orders.db?mode=rwc`)
//! - `DATABASE_MAX_CONNECTIONS` - pool size (default: 10)
//! - `HOST` - bind address (default: 0.0.0.0)
//! - `PORT` - listen port (default: 9090)
//! - `BCRYPT_COST` - password hashing cost (default: 12)
//! - `REQUEST_TIMEOUT_SECS` - deadline for a single store operation (default: 30)

use std::env;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const MIN_JWT_SECRET_LENGTH: usize = 32;
const MIN_BCRYPT_COST: u32 = 4;
const MAX_BCRYPT_COST: u32 = 31;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment variable: {0}")]
    Missing(&'static str),
    #[error("invalid environment variable {0}: {1}")]
    Invalid(&'static str, String),
    #[error("insecure secret in {0}: {1}")]
    InsecureSecret(&'static str, String),
}

#[derive(Clone)]
pub struct Config {
    pub database_url: SecretString,
    pub database_max_connections: u32,
    pub host: IpAddr,
    pub port: u16,
    pub jwt_secret: SecretString,
    pub bcrypt_cost: u32,
    pub request_timeout: Duration,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_url", &"[REDACTED]")
            .field("database_max_connections", &self.database_max_connections)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("jwt_secret", &"[REDACTED]")
            .field("bcrypt_cost", &self.bcrypt_cost)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if `JWT_SECRET` is missing or too short, or if
    /// any optional variable is present but unparsable.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Same as [`Config::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let jwt_secret = lookup("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;
        if jwt_secret.len() < MIN_JWT_SECRET_LENGTH {
            return Err(ConfigError::InsecureSecret(
                "JWT_SECRET",
                format!("must be at least {MIN_JWT_SECRET_LENGTH} bytes"),
            ));
        }

        let database_url = lookup("DATABASE_URL")
            .unwrap_or_else(|| "sqlite://orders.db?mode=rwc".to_string());

        let bcrypt_cost = parse_or(&lookup, "BCRYPT_COST", bcrypt::DEFAULT_COST)?;
        if !(MIN_BCRYPT_COST..=MAX_BCRYPT_COST).contains(&bcrypt_cost) {
            return Err(ConfigError::Invalid(
                "BCRYPT_COST",
                format!("must be between {MIN_BCRYPT_COST} and {MAX_BCRYPT_COST}"),
            ));
        }

        let database_max_connections = parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 10u32)?;
        if database_max_connections == 0 {
            return Err(ConfigError::Invalid(
                "DATABASE_MAX_CONNECTIONS",
                "must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            database_url: SecretString::from(database_url),
            database_max_connections,
            host: parse_or(&lookup, "HOST", IpAddr::V4(Ipv4Addr::UNSPECIFIED))?,
            port: parse_or(&lookup, "PORT", 9090u16)?,
            jwt_secret: SecretString::from(jwt_secret),
            bcrypt_cost,
            request_timeout: Duration::from_secs(parse_or(&lookup, "REQUEST_TIMEOUT_SECS", 30u64)?),
        })
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn is_in_memory_database(&self) -> bool {
        self.database_url.expose_secret().contains(":memory:")
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::Invalid(key, e.to_string())),
        None => Ok(default),
    }
}
