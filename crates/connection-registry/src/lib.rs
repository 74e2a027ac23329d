//! # Connection Registry - Multi-Tenant Database Lifecycle
//!
//! Owns named, lazily-established connections to multiple logical databases.
//!
//! ## Lifecycle Rules
//!
//! - At most one live handle per service name; a `connect` for an existing
//!   healthy handle returns it unchanged (idempotent reuse).
//! - State transitions are driven by link events, not polled.
//! - Handles leave the registry only on explicit `disconnect`.
//! - The registry never auto-retries; retry policy belongs to callers. The
//!   single-connection [`ManagedConnection`] variant is the exception: it
//!   reconnects with bounded, growing backoff.
//!
//! ## Concurrency
//!
//! Registry maps are guarded by short critical sections that never span an
//! `.await`; after any suspension the map is re-checked rather than assumed
//! unchanged.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod driver;
pub mod managed;
pub mod memory;
pub mod registry;

// Re-export main types
pub use driver::{DatabaseDriver, DatabaseLink, LinkEvent};
pub use managed::{BackoffPolicy, HealthProbe, ManagedConnection};
pub use memory::{InMemoryDriver, InMemoryLink};
pub use registry::{ConnectionHandle, ConnectionRegistry};
