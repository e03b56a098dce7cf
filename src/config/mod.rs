//! Typed configuration from environment variables.
//!
//! Loads once at startup. Connection parameters are deliberately not
//! required: a missing host or credential just means connection attempts
//! fail and the supervisors keep retrying. Only values that cannot be
//! parsed are rejected.
//! The Postgres password is wrapped in secrecy::SecretString to keep it out of logs.

pub mod environment;

use crate::error::{Error, Result};
use secrecy::SecretString;

pub const DEFAULT_REDIS_HOST: &str = "redis";
pub const DEFAULT_REDIS_PORT: u16 = 6379;
pub const DEFAULT_POSTGRES_PORT: u16 = 5432;
pub const DEFAULT_QUEUE: &str = "votes";

/// Where and how to reach the Postgres store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: SecretString,
    pub database: String,
}

/// Where and how to reach the Redis queue.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Hostname, resolved to an IPv4 address before each connection.
    pub host: String,
    pub port: u16,
    /// Name of the Redis list votes are pushed onto.
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub store: StoreConfig,
    pub queue: QueueConfig,
    pub otel_endpoint: Option<String>,
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Outside a container, call `dotenvy` before this (see
    /// [`environment::load_dotenv_unless_container`]).
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            store: StoreConfig {
                host: var_or("POSTGRES_HOST", "localhost"),
                port: port_var("POSTGRES_PORT", DEFAULT_POSTGRES_PORT)?,
                user: var_or("POSTGRES_USER", ""),
                password: SecretString::from(var_or("POSTGRES_PASS", "")),
                database: var_or("POSTGRES_NAME", ""),
            },
            queue: QueueConfig {
                host: var_or("REDIS_HOST", DEFAULT_REDIS_HOST),
                port: port_var("REDIS_PORT", DEFAULT_REDIS_PORT)?,
                name: var_or("VOTE_QUEUE", DEFAULT_QUEUE),
            },
            otel_endpoint: std::env::var("OTEL_ENDPOINT").ok(),
            log_level: var_or("LOG_LEVEL", "info"),
        })
    }
}

fn var_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn port_var(name: &str, default: u16) -> Result<u16> {
    match std::env::var(name) {
        Ok(raw) => parse_port(name, &raw),
        Err(_) => Ok(default),
    }
}

fn parse_port(name: &str, raw: &str) -> Result<u16> {
    raw.trim()
        .parse()
        .map_err(|_| Error::Config(format!("{name} must be a port number, got '{raw}'")))
}
