//! Relay loop: drains the vote queue into the vote store.
//!
//! Every iteration sleeps for the poll interval, makes sure the queue is
//! reachable, and pops at most one vote. A vote goes to the store; an empty
//! pop is used to probe the store instead, so a store outage is noticed
//! even when no votes are arriving.
//!
//! A vote that fails to parse or to persist is logged and dropped. It has
//! already left the queue, so delivery is at most once after the pop.

use std::sync::Arc;
use std::time::Duration;

use opentelemetry::KeyValue;
use tokio::sync::Notify;
use tracing::{Instrument, error, info, warn};

use crate::model::UpsertOutcome;
use crate::queue::{PoppedVote, VoteQueue};
use crate::store::VoteStore;
use crate::supervisor::{Resource, Supervisor};
use crate::telemetry::metrics;
use crate::telemetry::vote::{record_vote_outcome, start_vote_span};

/// Default pause between iterations; also the worst-case pickup latency.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Configuration for the relay loop.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub poll_interval: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// What a single iteration did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tick {
    /// A vote was popped and persisted.
    Applied {
        voter_id: String,
        outcome: UpsertOutcome,
    },
    /// A vote was popped but lost.
    Dropped(DropReason),
    /// The queue was empty; the store was probed.
    Idle,
    /// The pop itself failed; queue liveness is re-checked next iteration.
    PopFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    Malformed,
    StoreFailed,
}

impl DropReason {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Malformed => "malformed",
            Self::StoreFailed => "store_failed",
        }
    }
}

/// Handle for stopping a running relay from another task.
#[derive(Debug, Clone)]
pub struct ShutdownHandle(Arc<Notify>);

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.0.notify_one();
    }
}

/// The relay. Owns one supervisor per external service.
pub struct Relay<Q: Resource, S: Resource> {
    queue: Supervisor<Q>,
    store: Supervisor<S>,
    config: RelayConfig,
    shutdown: Arc<Notify>,
}

impl<Q, S> Relay<Q, S>
where
    Q: Resource,
    Q::Handle: VoteQueue,
    S: Resource,
    S::Handle: VoteStore,
{
    pub fn new(queue: Supervisor<Q>, store: Supervisor<S>, config: RelayConfig) -> Self {
        Self {
            queue,
            store,
            config,
            shutdown: Arc::new(Notify::new()),
        }
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle(Arc::clone(&self.shutdown))
    }

    pub fn queue(&self) -> &Supervisor<Q> {
        &self.queue
    }

    pub fn store(&self) -> &Supervisor<S> {
        &self.store
    }

    /// Connect to both services, then loop until shutdown is signalled.
    pub async fn run(&mut self) {
        let shutdown = Arc::clone(&self.shutdown);

        tokio::select! {
            _ = shutdown.notified() => {
                info!("relay shut down before connecting");
                return;
            }
            _ = self.connect_all() => {}
        }

        info!(
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            "relay started"
        );

        // Shutdown only interrupts the pause. A tick that has popped a vote
        // always runs to completion.
        loop {
            tokio::select! {
                _ = shutdown.notified() => {
                    info!("relay shutting down");
                    return;
                }
                _ = tokio::time::sleep(self.config.poll_interval) => {}
            }
            self.tick().await;
        }
    }

    async fn connect_all(&mut self) {
        self.store.connect().await;
        self.queue.connect().await;
    }

    /// One iteration without the pacing sleep.
    pub async fn tick(&mut self) -> Tick {
        let popped = self.queue.ensure_alive().await.try_pop().await;

        match popped {
            Ok(Some(vote)) => {
                metrics::queue_pops().add(1, &[KeyValue::new("result", "vote")]);
                self.process(vote).await
            }
            Ok(None) => {
                metrics::queue_pops().add(1, &[KeyValue::new("result", "empty")]);
                self.probe_store().await;
                Tick::Idle
            }
            Err(e) => {
                metrics::queue_pops().add(1, &[KeyValue::new("result", "error")]);
                warn!(error = %e, "queue pop failed");
                self.queue.mark_disconnected();
                Tick::PopFailed
            }
        }
    }

    async fn process(&mut self, popped: PoppedVote) -> Tick {
        let vote = match popped.parse() {
            Ok(vote) => vote,
            Err(e) => {
                warn!(payload = %popped, error = %e, "vote processing failed");
                return dropped(DropReason::Malformed);
            }
        };

        let span = start_vote_span(&vote.voter_id);
        async {
            info!(
                voter_id = %vote.voter_id,
                choice = %vote.choice,
                "processing vote for '{}' by '{}'",
                vote.choice,
                vote.voter_id
            );

            let result = self.store.ensure_alive().await.upsert(&vote).await;
            match result {
                Ok(outcome) => {
                    record_vote_outcome(&span, outcome.as_str());
                    metrics::votes_processed()
                        .add(1, &[KeyValue::new("outcome", outcome.as_str())]);
                    Tick::Applied {
                        voter_id: vote.voter_id.clone(),
                        outcome,
                    }
                }
                Err(e) => {
                    record_vote_outcome(&span, DropReason::StoreFailed.as_str());
                    error!(voter_id = %vote.voter_id, error = %e, "vote processing failed");
                    self.store.mark_disconnected();
                    dropped(DropReason::StoreFailed)
                }
            }
        }
        .instrument(span.clone())
        .await
    }

    async fn probe_store(&mut self) {
        let probe = self.store.connect().await.liveness_probe().await;

        match probe {
            Ok(()) => {
                metrics::store_probes().add(1, &[KeyValue::new("result", "ok")]);
            }
            Err(e) => {
                metrics::store_probes().add(1, &[KeyValue::new("result", "error")]);
                warn!(error = %e, "store liveness probe failed");
                self.store.reconnect().await;
            }
        }
    }
}

fn dropped(reason: DropReason) -> Tick {
    metrics::votes_processed().add(1, &[KeyValue::new("outcome", reason.as_str())]);
    Tick::Dropped(reason)
}
