//! Vote record operations over a supervised Postgres connection.

use std::time::Instant;

use opentelemetry::KeyValue;
use sqlx::Connection;
use sqlx::postgres::PgConnection;
use tracing::debug;

use super::VoteStore;
use crate::error::Result;
use crate::model::{Tally, UpsertOutcome, VoteMessage, VoteRecord};
use crate::telemetry::metrics;

/// Reads and writes vote records on one connection.
pub struct VoteRepository {
    conn: PgConnection,
}

impl VoteRepository {
    pub fn new(conn: PgConnection) -> Self {
        Self { conn }
    }

    pub(crate) fn connection(&mut self) -> &mut PgConnection {
        &mut self.conn
    }

    pub fn into_inner(self) -> PgConnection {
        self.conn
    }

    /// Fetch a voter's record.
    pub async fn get(&mut self, voter_id: &str) -> Result<Option<VoteRecord>> {
        let record = sqlx::query_as::<_, VoteRecord>("SELECT id, vote FROM votes WHERE id = $1")
            .bind(voter_id)
            .fetch_optional(&mut self.conn)
            .await?;
        Ok(record)
    }

    /// Number of voters for each choice, ordered by choice.
    pub async fn tally(&mut self) -> Result<Vec<Tally>> {
        let rows = sqlx::query_as::<_, Tally>(
            "SELECT vote, COUNT(id) AS count FROM votes GROUP BY vote ORDER BY vote",
        )
        .fetch_all(&mut self.conn)
        .await?;
        Ok(rows)
    }

    /// Remove a voter's record. Returns whether one existed.
    pub async fn delete(&mut self, voter_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM votes WHERE id = $1")
            .bind(voter_id)
            .execute(&mut self.conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

impl VoteStore for VoteRepository {
    async fn upsert(&mut self, vote: &VoteMessage) -> Result<UpsertOutcome> {
        let started = Instant::now();
        let mut tx = self.conn.begin().await?;

        // The insert runs under a savepoint so a unique violation only
        // rolls back the insert, not the enclosing transaction.
        let inserted = {
            let mut savepoint = Connection::begin(&mut *tx).await?;
            let insert = sqlx::query("INSERT INTO votes (id, vote) VALUES ($1, $2)")
                .bind(&vote.voter_id)
                .bind(&vote.choice)
                .execute(&mut *savepoint)
                .await;
            match insert {
                Ok(_) => {
                    savepoint.commit().await?;
                    true
                }
                Err(e) if is_unique_violation(&e) => {
                    savepoint.rollback().await?;
                    false
                }
                Err(e) => return Err(e.into()),
            }
        };

        let outcome = if inserted {
            UpsertOutcome::Inserted
        } else {
            sqlx::query("UPDATE votes SET vote = $1 WHERE id = $2")
                .bind(&vote.choice)
                .bind(&vote.voter_id)
                .execute(&mut *tx)
                .await?;
            UpsertOutcome::Updated
        };
        tx.commit().await?;

        metrics::upsert_duration_ms().record(
            started.elapsed().as_secs_f64() * 1000.0,
            &[KeyValue::new("outcome", outcome.as_str())],
        );
        debug!(voter_id = %vote.voter_id, %outcome, "vote upserted");
        Ok(outcome)
    }

    async fn liveness_probe(&mut self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&mut self.conn).await?;
        Ok(())
    }
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .is_some_and(|db| db.is_unique_violation())
}
