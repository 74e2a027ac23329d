//! # Event Bus - Pub/Sub Transport for the Agent Relay
//!
//! Wraps a pub/sub channel abstraction over a shared backend connection pair
//! (one publish-capable link, one subscribe-capable link).
//!
//! ## Choreography Pattern
//!
//! ```text
//! ┌──────────────┐                    ┌──────────────┐
//! │  Handler A   │                    │  Handler B   │
//! │              │    publish()       │              │
//! │              │ ──────┐            │              │
//! └──────────────┘       │            └──────────────┘
//!                        ▼                    ↑
//!                  ┌──────────────┐          │
//!                  │  Event Bus   │          │
//!                  │  Transport   │ ─────────┘
//!                  └──────────────┘  subscribe()
//! ```
//!
//! ## Delivery Rules
//!
//! - `publish` before `connect()` fails with `BusError::NotConnected`.
//! - Structured payloads travel as canonical JSON text; plain strings pass
//!   through unchanged.
//! - Malformed inbound text is delivered raw to the callback instead of
//!   raising; dispatch never crashes on a bad message.
//! - Each delivery runs as its own task, so choreography chains of any depth
//!   yield back to the scheduler instead of growing the stack.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod backend;
pub mod codec;
pub mod memory;
pub mod transport;

// Re-export main types
pub use backend::{BusBackend, LinkRole, WireMessage};
pub use codec::{InboundMessage, WirePayload};
pub use memory::InMemoryBusBackend;
pub use transport::{ChannelListener, ConnectionStatus, EventBusTransport};
