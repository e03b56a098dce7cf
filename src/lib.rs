//! # vote-relay
//!
//! Worker that drains vote messages from a Redis list and persists the
//! latest choice per voter into Postgres.
//!
//! Each external service sits behind its own connection [`supervisor`],
//! so the [`relay`] loop keeps running through outages of either one.

pub mod config;
pub mod error;
pub mod model;
pub mod queue;
pub mod relay;
pub mod store;
pub mod supervisor;
pub mod telemetry;
