//! Error types for vote-relay.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("could not resolve {host}: {reason}")]
    Resolve { host: String, reason: String },

    #[error("queue error: {0}")]
    Queue(#[from] redis::RedisError),

    #[error("store error: {0}")]
    Store(#[from] sqlx::Error),

    #[error("malformed vote message: {0}")]
    MalformedVote(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
