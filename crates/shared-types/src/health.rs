//! # Readiness and Health States
//!
//! State enums shared by the connection registry, the transport, and the
//! gateway façade. Transitions are driven by backend events, not polled.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a single database link.
///
/// Mirrors the four states a live connection handle can be observed in.
/// The registry holds at most one handle per service name; the handle's
/// state follows the underlying link's events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadyState {
    /// No live link (initial state, or after close/loss).
    Disconnected,
    /// Link established and usable.
    Connected,
    /// Establishment in flight.
    Connecting,
    /// Close in flight.
    Disconnecting,
}

impl ReadyState {
    /// Returns true if operations may proceed without suspension failure.
    #[must_use]
    pub fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl fmt::Display for ReadyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Disconnected => "disconnected",
            Self::Connected => "connected",
            Self::Connecting => "connecting",
            Self::Disconnecting => "disconnecting",
        };
        write!(f, "{s}")
    }
}

/// Aggregate health of the whole relay, as exposed to the HTTP layer.
///
/// The HTTP layer maps anything below `Healthy` to 503.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Every database connected and the event manager initialized.
    Healthy,
    /// Some databases down, or a partially-initialized bus.
    Degraded,
    /// The bus is down, or no database is connected.
    Unhealthy,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Healthy => "healthy",
            Self::Degraded => "degraded",
            Self::Unhealthy => "unhealthy",
        };
        write!(f, "{s}")
    }
}
