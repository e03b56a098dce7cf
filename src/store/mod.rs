//! Postgres vote store: connection resource and schema.
//!
//! The store holds a single `votes` table with one row per voter. The
//! table is created on every connection establishment if it is missing.

pub mod repository;

pub use repository::VoteRepository;

use secrecy::ExposeSecret;
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::Connection;

use crate::config::StoreConfig;
use crate::error::Result;
use crate::model::{UpsertOutcome, VoteMessage};
use crate::supervisor::Resource;

const CREATE_VOTES_TABLE: &str = "CREATE TABLE IF NOT EXISTS votes (
    id VARCHAR(255) NOT NULL UNIQUE,
    vote VARCHAR(255) NOT NULL
)";

/// Durable latest-choice-per-voter storage.
#[allow(async_fn_in_trait)]
pub trait VoteStore {
    /// Insert the voter's record, or overwrite its choice if one exists.
    /// Atomic per call and idempotent for a repeated `(voter_id, choice)`.
    async fn upsert(&mut self, vote: &VoteMessage) -> Result<UpsertOutcome>;

    /// Trivial read-only round-trip used to detect a dead connection while idle.
    async fn liveness_probe(&mut self) -> Result<()>;
}

/// Postgres server holding the `votes` table.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    options: PgConnectOptions,
}

impl PostgresStore {
    pub fn new(config: &StoreConfig) -> Self {
        let mut options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .password(config.password.expose_secret());
        if !config.user.is_empty() {
            options = options.username(&config.user);
        }
        if !config.database.is_empty() {
            options = options.database(&config.database);
        }
        Self { options }
    }
}

impl Resource for PostgresStore {
    type Target = ();
    type Handle = VoteRepository;

    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn resolve(&mut self) -> Result<()> {
        Ok(())
    }

    async fn open(&mut self, _target: &()) -> Result<VoteRepository> {
        let mut conn = PgConnection::connect_with(&self.options).await?;
        ensure_schema(&mut conn).await?;
        Ok(VoteRepository::new(conn))
    }

    async fn is_alive(&self, handle: &mut VoteRepository) -> bool {
        handle.connection().ping().await.is_ok()
    }

    async fn close(&self, handle: VoteRepository) {
        if let Err(e) = handle.into_inner().close().await {
            tracing::debug!("closing stale postgres connection: {e}");
        }
    }
}

/// Create the `votes` table if absent. Safe to run on every connect.
pub async fn ensure_schema(conn: &mut PgConnection) -> Result<()> {
    sqlx::raw_sql(CREATE_VOTES_TABLE).execute(&mut *conn).await?;
    Ok(())
}
