//! # Database Driver Seam
//!
//! The registry is generic over the actual database client. A driver
//! establishes links; a link reports its ready state, answers pings, and
//! emits lifecycle events that drive handle state transitions.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::broadcast;

use shared_types::{DatabaseConfig, ReadyState, RegistryError, RegistrySettings};

/// Lifecycle events emitted by a live link.
///
/// Handle `ReadyState` follows these events; nothing polls the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// The link (re-)established.
    Connected,
    /// The link dropped unexpectedly.
    Disconnected,
    /// The underlying client is attempting recovery on its own.
    Reconnecting,
    /// A link-level error was observed.
    Error(String),
}

/// Factory for database links.
#[async_trait]
pub trait DatabaseDriver: Send + Sync {
    /// Establish a link to the database named in `config`.
    ///
    /// Implementations honor `settings.idle_timeout()` for idle-socket
    /// closure. The establishment timeout is enforced by the caller.
    async fn connect(
        &self,
        service: &str,
        config: &DatabaseConfig,
        settings: &RegistrySettings,
    ) -> Result<Arc<dyn DatabaseLink>, RegistryError>;
}

/// One live database connection.
#[async_trait]
pub trait DatabaseLink: Send + Sync {
    /// Current lifecycle state.
    fn ready_state(&self) -> ReadyState;

    /// Lightweight round trip against the live connection.
    async fn ping(&self) -> Result<(), RegistryError>;

    /// Close the connection.
    async fn close(&self) -> Result<(), RegistryError>;

    /// Lifecycle event stream for this link.
    fn events(&self) -> broadcast::Receiver<LinkEvent>;
}
