//! Redis-backed vote queue.
//!
//! Votes live in a Redis list used as a FIFO: producers `RPUSH`, the relay
//! `LPOP`s. Popping is destructive, so a vote is gone from the queue as soon
//! as it is handed to the relay.

use std::net::{SocketAddr, SocketAddrV4};

use redis::aio::MultiplexedConnection;
use tracing::info;

use crate::config::QueueConfig;
use crate::error::{Error, Result};
use crate::model::VoteMessage;
use crate::supervisor::Resource;

/// Non-blocking access to pending votes.
#[allow(async_fn_in_trait)]
pub trait VoteQueue {
    /// Pop at most one vote. `None` when the queue is empty.
    async fn try_pop(&mut self) -> Result<Option<PoppedVote>>;
}

/// A raw payload taken off the queue, not yet parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoppedVote {
    payload: Vec<u8>,
}

impl PoppedVote {
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            payload: payload.into(),
        }
    }

    pub fn parse(&self) -> Result<VoteMessage> {
        VoteMessage::from_payload(&self.payload)
    }
}

impl std::fmt::Display for PoppedVote {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.payload))
    }
}

/// Redis server holding the vote list.
#[derive(Debug, Clone)]
pub struct RedisQueue {
    host: String,
    port: u16,
    queue: String,
}

impl RedisQueue {
    pub fn new(config: &QueueConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            queue: config.name.clone(),
        }
    }
}

impl Resource for RedisQueue {
    type Target = SocketAddrV4;
    type Handle = RedisVoteQueue;

    fn name(&self) -> &'static str {
        "redis"
    }

    async fn resolve(&mut self) -> Result<SocketAddrV4> {
        let resolve_error = |reason: String| Error::Resolve {
            host: self.host.clone(),
            reason,
        };
        let addrs = tokio::net::lookup_host((self.host.as_str(), self.port))
            .await
            .map_err(|e| resolve_error(e.to_string()))?;
        let addr = first_ipv4(addrs).ok_or_else(|| resolve_error("no IPv4 address".into()))?;
        info!(host = %self.host, %addr, "found redis at {}", addr.ip());
        Ok(addr)
    }

    async fn open(&mut self, target: &SocketAddrV4) -> Result<RedisVoteQueue> {
        let client = redis::Client::open(format!("redis://{target}/"))?;
        let mut conn = client.get_multiplexed_async_connection().await?;
        let _: () = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(RedisVoteQueue {
            conn,
            queue: self.queue.clone(),
        })
    }

    async fn is_alive(&self, handle: &mut RedisVoteQueue) -> bool {
        let pong: redis::RedisResult<String> =
            redis::cmd("PING").query_async(&mut handle.conn).await;
        pong.is_ok()
    }
}

fn first_ipv4(addrs: impl IntoIterator<Item = SocketAddr>) -> Option<SocketAddrV4> {
    addrs.into_iter().find_map(|addr| match addr {
        SocketAddr::V4(v4) => Some(v4),
        SocketAddr::V6(_) => None,
    })
}

/// Live connection to the vote list.
pub struct RedisVoteQueue {
    conn: MultiplexedConnection,
    queue: String,
}

impl RedisVoteQueue {
    /// Append a vote to the tail of the list.
    pub async fn push(&mut self, vote: &VoteMessage) -> Result<()> {
        let _len: i64 = redis::cmd("RPUSH")
            .arg(&self.queue)
            .arg(vote.to_payload()?)
            .query_async(&mut self.conn)
            .await?;
        Ok(())
    }

    /// Number of votes waiting.
    pub async fn pending(&mut self) -> Result<i64> {
        let len: i64 = redis::cmd("LLEN")
            .arg(&self.queue)
            .query_async(&mut self.conn)
            .await?;
        Ok(len)
    }
}

impl VoteQueue for RedisVoteQueue {
    async fn try_pop(&mut self) -> Result<Option<PoppedVote>> {
        let payload: Option<Vec<u8>> = redis::cmd("LPOP")
            .arg(&self.queue)
            .query_async(&mut self.conn)
            .await?;
        Ok(payload.map(PoppedVote::new))
    }
}
