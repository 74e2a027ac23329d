//! # Bus Backend
//!
//! The seam between the transport and whatever carries messages between
//! processes. The in-memory implementation in [`crate::memory`] is suitable
//! for single-node operation; distributed deployments would plug in a
//! different implementation (e.g. Redis pub/sub, NATS) behind the same trait.

use async_trait::async_trait;
use tokio::sync::broadcast;

use shared_types::BusError;

/// The logical roles a backend connection pair serves.
///
/// These may be separate physical links or one shared link; the transport
/// only cares about per-role readiness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkRole {
    /// The publish-capable link.
    Publisher,
    /// The subscribe-capable link.
    Subscriber,
    /// Auxiliary commands (auth, unsubscribe bookkeeping).
    Control,
}

/// A raw message as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireMessage {
    /// The channel the message was sent on.
    pub channel: String,
    /// The UTF-8 wire text.
    pub text: String,
}

/// Trait for the wire carrying bus messages between processes.
#[async_trait]
pub trait BusBackend: Send + Sync {
    /// Establish the backend link(s) for publishing and subscribing.
    async fn connect(&self) -> Result<(), BusError>;

    /// Close all backend links. Safe to call on partially-initialized state.
    async fn disconnect(&self) -> Result<(), BusError>;

    /// Send wire text on a channel.
    async fn send(&self, channel: &str, text: &str) -> Result<(), BusError>;

    /// Register interest in a channel on the subscribe link.
    async fn subscribe(&self, channel: &str) -> Result<(), BusError>;

    /// Drop interest in a channel.
    async fn unsubscribe(&self, channel: &str) -> Result<(), BusError>;

    /// Inbound wire messages for channels this backend subscribed to.
    fn incoming(&self) -> broadcast::Receiver<WireMessage>;

    /// Readiness of one logical role.
    fn role_ready(&self, role: LinkRole) -> bool;
}
