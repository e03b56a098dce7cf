//! Core data model.
//!
//! A vote message is what producers push onto the queue. A vote record is
//! what the store keeps: one row per voter holding their latest choice.

use serde::{Deserialize, Serialize};

use crate::error::Result;

// ---------------------------------------------------------------------------
// Vote Message
// ---------------------------------------------------------------------------

/// A vote popped from the queue. Transient: once popped it is gone from the
/// queue whether or not it is applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteMessage {
    /// Ballot caster. Primary key in the store.
    pub voter_id: String,

    /// The option voted for. Carried as `vote` on the wire.
    #[serde(rename = "vote")]
    pub choice: String,
}

impl VoteMessage {
    pub fn new(voter_id: impl Into<String>, choice: impl Into<String>) -> Self {
        Self {
            voter_id: voter_id.into(),
            choice: choice.into(),
        }
    }

    /// Parse the UTF-8 JSON wire form `{"voter_id": ..., "vote": ...}`.
    pub fn from_payload(payload: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(payload)?)
    }

    /// Encode to the JSON wire form.
    pub fn to_payload(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

// ---------------------------------------------------------------------------
// Vote Record
// ---------------------------------------------------------------------------

/// A persisted row of the `votes` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct VoteRecord {
    #[sqlx(rename = "id")]
    pub voter_id: String,
    #[sqlx(rename = "vote")]
    pub choice: String,
}

/// Which branch of the upsert applied the vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// First vote from this voter; a new record was created.
    Inserted,
    /// The voter already had a record; its choice was overwritten.
    Updated,
}

impl UpsertOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inserted => "inserted",
            Self::Updated => "updated",
        }
    }
}

impl std::fmt::Display for UpsertOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Vote count for one choice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Tally {
    #[sqlx(rename = "vote")]
    pub choice: String,
    pub count: i64,
}
