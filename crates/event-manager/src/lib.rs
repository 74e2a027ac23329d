//! # Event Manager - Choreography over the Event Bus
//!
//! Coordinates the relay's fixed event choreography: every inbound channel
//! is bound to exactly one handler, handlers react by publishing follow-up
//! events, and no component ever calls another directly.
//!
//! ## Responsibilities
//!
//! - Bind the channel-to-handler catalogue at `initialize()`.
//! - Inject `timestamp`/`eventId` into every outbound payload.
//! - Keep publishes fire-and-forget: a dead bus degrades choreography, it
//!   never crashes a caller.
//! - Unwind bindings and disconnect the transport on `graceful_shutdown()`.
//!
//! The transport underneath is additive about listeners; the 1:1 policy
//! lives here. Re-registering a channel replaces the prior binding.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod choreography;
pub mod handler;
pub mod manager;

// Re-export main types
pub use handler::{EventHandler, EventPublisher};
pub use manager::{EventManager, ManagerStatus};
