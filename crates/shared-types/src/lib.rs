//! # Shared Types - Common Vocabulary for the Agent Relay
//!
//! Types shared by every relay crate: configuration, channel names, the
//! event envelope, readiness/health enums, and the error taxonomy.
//!
//! ## Error Taxonomy
//!
//! - **Fatal-at-startup**: missing configuration, initial connection failure.
//!   Surfaced by `relay-runtime`, process exits non-zero.
//! - **Recoverable/degraded**: a named database losing its link after startup.
//!   Visible only through status/health reads.
//! - **Best-effort/swallowed**: per-item failures during batch cleanup.
//!   Logged with context, execution continues.
//! - **Caller-surfaced**: `BusError::NotConnected`, `RegistryError::NotFound`.
//!   Typed failures raised to the immediate caller, never retried here.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod channels;
pub mod config;
pub mod envelope;
pub mod errors;
pub mod health;

// Re-export main types
pub use config::{BusConfig, DatabaseConfig, RegistrySettings, RelayConfig};
pub use envelope::EventEnvelope;
pub use errors::{BusError, ConfigError, HandlerError, RegistryError};
pub use health::{HealthStatus, ReadyState};

/// Default capacity for the in-process wire channel before backpressure.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;

/// Ceiling on the graceful-shutdown sequence before the process force-exits.
pub const SHUTDOWN_TIMEOUT_SECS: u64 = 30;
