//! In-memory queue and store used to drive the supervisor and relay
//! without Redis or Postgres.
//!
//! Each fake is a cheap clone over shared state, so a test keeps one copy
//! to inspect and script failures while the supervisor owns another.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use vote_relay::error::{Error, Result};
use vote_relay::model::{UpsertOutcome, VoteMessage};
use vote_relay::queue::{PoppedVote, VoteQueue};
use vote_relay::relay::{Relay, RelayConfig};
use vote_relay::store::VoteStore;
use vote_relay::supervisor::{Resource, Supervisor};

pub const FAST_RETRY: Duration = Duration::from_millis(1);

fn refused(what: &str) -> Error {
    Error::Other(format!("{what}: connection refused"))
}

// ---------------------------------------------------------------------------
// Queue
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct QueueInner {
    pub messages: VecDeque<Vec<u8>>,
    pub down: bool,
    pub failing_resolves: u32,
    pub failing_opens: u32,
    pub fail_next_pop: bool,
    pub resolves: u32,
    pub opens: u32,
    pub closes: u32,
    pub pops: u32,
}

#[derive(Debug, Clone, Default)]
pub struct FakeQueue {
    inner: Arc<Mutex<QueueInner>>,
}

impl FakeQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MutexGuard<'_, QueueInner> {
        self.inner.lock().unwrap()
    }

    pub fn push_json(&self, value: serde_json::Value) {
        self.push_raw(value.to_string().into_bytes());
    }

    pub fn push_vote(&self, voter_id: &str, vote: &str) {
        self.push_json(serde_json::json!({"voter_id": voter_id, "vote": vote}));
    }

    pub fn push_raw(&self, payload: impl Into<Vec<u8>>) {
        self.state().messages.push_back(payload.into());
    }

    pub fn len(&self) -> usize {
        self.state().messages.len()
    }

    /// Take the service down; it comes back after `failing_opens` attempts.
    pub fn go_down(&self, failing_opens: u32) {
        let mut state = self.state();
        state.down = true;
        state.failing_opens = failing_opens;
    }
}

pub struct FakeQueueConn {
    queue: FakeQueue,
}

impl Resource for FakeQueue {
    type Target = &'static str;
    type Handle = FakeQueueConn;

    fn name(&self) -> &'static str {
        "fake-queue"
    }

    async fn resolve(&mut self) -> Result<&'static str> {
        let mut state = self.state();
        state.resolves += 1;
        if state.failing_resolves > 0 {
            state.failing_resolves -= 1;
            return Err(Error::Resolve {
                host: "queue".to_string(),
                reason: "no such host".to_string(),
            });
        }
        Ok("10.0.0.7:6379")
    }

    async fn open(&mut self, _target: &&'static str) -> Result<FakeQueueConn> {
        let mut state = self.state();
        state.opens += 1;
        if state.failing_opens > 0 {
            state.failing_opens -= 1;
            return Err(refused("queue"));
        }
        state.down = false;
        drop(state);
        Ok(FakeQueueConn {
            queue: self.clone(),
        })
    }

    async fn is_alive(&self, _handle: &mut FakeQueueConn) -> bool {
        !self.state().down
    }

    async fn close(&self, handle: FakeQueueConn) {
        self.state().closes += 1;
        drop(handle);
    }
}

impl VoteQueue for FakeQueueConn {
    async fn try_pop(&mut self) -> Result<Option<PoppedVote>> {
        let mut state = self.queue.state();
        state.pops += 1;
        if state.down || state.fail_next_pop {
            state.fail_next_pop = false;
            return Err(refused("queue"));
        }
        Ok(state.messages.pop_front().map(PoppedVote::new))
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct StoreInner {
    pub records: HashMap<String, String>,
    pub down: bool,
    pub failing_opens: u32,
    pub fail_next_upsert: bool,
    pub upsert_delay: Option<Duration>,
    pub opens: u32,
    pub closes: u32,
    pub schema_ensures: u32,
    pub writes: u32,
    pub probes: u32,
}

#[derive(Debug, Clone, Default)]
pub struct FakeStore {
    inner: Arc<Mutex<StoreInner>>,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap()
    }

    pub fn record(&self, voter_id: &str) -> Option<String> {
        self.state().records.get(voter_id).cloned()
    }

    pub fn go_down(&self, failing_opens: u32) {
        let mut state = self.state();
        state.down = true;
        state.failing_opens = failing_opens;
    }
}

pub struct FakeStoreConn {
    store: FakeStore,
}

impl Resource for FakeStore {
    type Target = ();
    type Handle = FakeStoreConn;

    fn name(&self) -> &'static str {
        "fake-store"
    }

    async fn resolve(&mut self) -> Result<()> {
        Ok(())
    }

    async fn open(&mut self, _target: &()) -> Result<FakeStoreConn> {
        let mut state = self.state();
        state.opens += 1;
        if state.failing_opens > 0 {
            state.failing_opens -= 1;
            return Err(refused("store"));
        }
        state.down = false;
        state.schema_ensures += 1;
        drop(state);
        Ok(FakeStoreConn {
            store: self.clone(),
        })
    }

    async fn is_alive(&self, _handle: &mut FakeStoreConn) -> bool {
        !self.state().down
    }

    async fn close(&self, handle: FakeStoreConn) {
        self.state().closes += 1;
        drop(handle);
    }
}

impl VoteStore for FakeStoreConn {
    async fn upsert(&mut self, vote: &VoteMessage) -> Result<UpsertOutcome> {
        let delay = self.store.state().upsert_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut state = self.store.state();
        if state.down || state.fail_next_upsert {
            state.fail_next_upsert = false;
            return Err(refused("store"));
        }
        state.writes += 1;
        let previous = state
            .records
            .insert(vote.voter_id.clone(), vote.choice.clone());
        Ok(match previous {
            Some(_) => UpsertOutcome::Updated,
            None => UpsertOutcome::Inserted,
        })
    }

    async fn liveness_probe(&mut self) -> Result<()> {
        let mut state = self.store.state();
        state.probes += 1;
        if state.down {
            return Err(refused("store"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------------

pub fn relay(queue: &FakeQueue, store: &FakeStore) -> Relay<FakeQueue, FakeStore> {
    relay_with(queue, store, RelayConfig::default())
}

pub fn relay_with(
    queue: &FakeQueue,
    store: &FakeStore,
    config: RelayConfig,
) -> Relay<FakeQueue, FakeStore> {
    Relay::new(
        Supervisor::new(queue.clone()).with_retry_delay(FAST_RETRY),
        Supervisor::new(store.clone()).with_retry_delay(FAST_RETRY),
        config,
    )
}
