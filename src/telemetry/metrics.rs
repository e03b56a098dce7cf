//! Metric instruments for the relay.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! Without an OTLP endpoint the global provider is a no-op.

use opentelemetry::metrics::{Counter, Histogram, Meter};

fn meter() -> Meter {
    opentelemetry::global::meter("vote-relay")
}

/// Counter: votes taken off the queue and handled.
/// Labels: `outcome` ("inserted" | "updated" | "malformed" | "store_failed").
pub fn votes_processed() -> Counter<u64> {
    meter()
        .u64_counter("relay.votes.processed")
        .with_description("Number of votes popped and handled")
        .build()
}

/// Counter: queue pop calls.
/// Labels: `result` ("vote" | "empty" | "error").
pub fn queue_pops() -> Counter<u64> {
    meter()
        .u64_counter("relay.queue.pops")
        .with_description("Number of queue pop attempts")
        .build()
}

/// Counter: resolution and connection attempts made by supervisors.
/// Labels: `resource`, `result` ("ok" | "error" | "unresolved").
pub fn connection_attempts() -> Counter<u64> {
    meter()
        .u64_counter("relay.connections.attempts")
        .with_description("Number of connection attempts")
        .build()
}

/// Counter: reconnects triggered after a failed liveness check.
/// Labels: `resource`.
pub fn reconnects() -> Counter<u64> {
    meter()
        .u64_counter("relay.connections.reconnects")
        .with_description("Number of reconnects")
        .build()
}

/// Counter: idle-time store liveness probes.
/// Labels: `result` ("ok" | "error").
pub fn store_probes() -> Counter<u64> {
    meter()
        .u64_counter("relay.store.probes")
        .with_description("Number of store liveness probes")
        .build()
}

/// Histogram: upsert duration in milliseconds.
/// Labels: `outcome`.
pub fn upsert_duration_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("relay.store.upsert_duration_ms")
        .with_description("Vote upsert duration in milliseconds")
        .with_unit("ms")
        .build()
}
