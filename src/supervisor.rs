//! Resource connection supervisor.
//!
//! One supervisor per external service. It owns the connection handle,
//! blocks with a fixed delay between attempts until a live connection
//! exists, and offers a liveness check plus reconnect. It never hands out
//! a failed connection and never gives up.

use std::time::Duration;

use opentelemetry::KeyValue;
use tracing::{info, warn};

use crate::error::Result;
use crate::telemetry::metrics;

/// Delay between failed resolution or connection attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Connection lifecycle of a supervised resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        };
        f.write_str(s)
    }
}

/// An external service a [`Supervisor`] can connect to.
///
/// Connecting is two steps that retry independently: `resolve` produces a
/// target (e.g. an address from a hostname), then `open` is retried
/// against that target until it yields a usable handle.
#[allow(async_fn_in_trait)]
pub trait Resource {
    type Target;
    type Handle;

    /// Short name used in logs and metric labels.
    fn name(&self) -> &'static str;

    async fn resolve(&mut self) -> Result<Self::Target>;

    /// Open a connection. Any first-connection setup (e.g. schema) belongs
    /// here; an error counts as a failed attempt.
    async fn open(&mut self, target: &Self::Target) -> Result<Self::Handle>;

    /// Cheap round-trip. Must report failure as `false`, never as an error.
    async fn is_alive(&self, handle: &mut Self::Handle) -> bool;

    /// Tear down a handle that is being replaced.
    async fn close(&self, handle: Self::Handle) {
        drop(handle);
    }
}

/// Owns the connection to one [`Resource`] for the life of the process.
pub struct Supervisor<R: Resource> {
    resource: R,
    handle: Option<R::Handle>,
    state: ConnectionState,
    retry_delay: Duration,
}

impl<R: Resource> Supervisor<R> {
    pub fn new(resource: R) -> Self {
        Self {
            resource,
            handle: None,
            state: ConnectionState::Disconnected,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// The current handle, if one has been established.
    pub fn handle_mut(&mut self) -> Option<&mut R::Handle> {
        self.handle.as_mut()
    }

    /// Return the live handle, establishing one first if there is none.
    /// Blocks until a connection succeeds.
    pub async fn connect(&mut self) -> &mut R::Handle {
        let handle = match self.handle.take() {
            Some(handle) => handle,
            None => self.establish().await,
        };
        self.handle.insert(handle)
    }

    /// Liveness check against the current handle. `false` when there is no
    /// handle or the round-trip fails.
    pub async fn is_alive(&mut self) -> bool {
        let alive = match self.handle.as_mut() {
            Some(handle) => self.resource.is_alive(handle).await,
            None => false,
        };
        self.state = if alive {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        };
        alive
    }

    /// Drop the current handle and block until a new connection exists.
    pub async fn reconnect(&mut self) -> &mut R::Handle {
        let name = self.resource.name();
        info!(resource = name, "reconnecting {name}");
        metrics::reconnects().add(1, &[KeyValue::new("resource", name)]);
        if let Some(handle) = self.handle.take() {
            self.resource.close(handle).await;
        }
        self.state = ConnectionState::Disconnected;
        self.connect().await
    }

    /// Liveness check followed by a reconnect if it failed. Connects
    /// directly when there is no handle yet.
    pub async fn ensure_alive(&mut self) -> &mut R::Handle {
        if self.handle.is_some() && !self.is_alive().await {
            return self.reconnect().await;
        }
        self.connect().await
    }

    /// Record that the handle failed outside of a liveness check. The next
    /// liveness check decides whether to reconnect.
    pub fn mark_disconnected(&mut self) {
        self.state = ConnectionState::Disconnected;
    }

    async fn establish(&mut self) -> R::Handle {
        self.state = ConnectionState::Connecting;
        let name = self.resource.name();

        let target = loop {
            match self.resource.resolve().await {
                Ok(target) => break target,
                Err(e) => {
                    warn!(resource = name, error = %e, "waiting for {name} to resolve");
                    record_attempt(name, "unresolved");
                    tokio::time::sleep(self.retry_delay).await;
                }
            }
        };

        let mut attempt: u64 = 0;
        loop {
            attempt += 1;
            match self.resource.open(&target).await {
                Ok(handle) => {
                    info!(resource = name, attempt, "connected to {name}");
                    record_attempt(name, "ok");
                    self.state = ConnectionState::Connected;
                    return handle;
                }
                Err(e) => {
                    warn!(resource = name, attempt, error = %e, "waiting for {name}");
                    record_attempt(name, "error");
                    tokio::time::sleep(self.retry_delay).await;
                }
            }
        }
    }
}

fn record_attempt(resource: &'static str, result: &'static str) {
    metrics::connection_attempts().add(
        1,
        &[
            KeyValue::new("resource", resource),
            KeyValue::new("result", result),
        ],
    );
}
