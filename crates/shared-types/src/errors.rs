//! # Error Types
//!
//! Typed failures shared across relay crates.

use thiserror::Error;

/// Errors raised by the event bus transport.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BusError {
    /// Operation attempted before `connect()` succeeded (or after disconnect).
    #[error("Event bus not connected")]
    NotConnected,

    /// The backend link failed.
    #[error("Bus backend error: {0}")]
    Backend(String),

    /// Payload could not be serialized to the canonical wire text.
    #[error("Wire serialization failed: {0}")]
    Serialization(String),

    /// The inbound wire stream closed underneath the dispatch loop.
    #[error("Wire stream closed")]
    Closed,
}

/// Errors raised by the connection registry.
#[derive(Debug, Clone, Error)]
pub enum RegistryError {
    /// No handle registered under the given service name.
    #[error("Unknown service: {0}")]
    NotFound(String),

    /// Establishing the link failed.
    #[error("Connection failed for {service}: {reason}")]
    ConnectionFailed { service: String, reason: String },

    /// Establishment exceeded the configured timeout.
    #[error("Connection to {service} timed out after {waited_ms}ms")]
    Timeout { service: String, waited_ms: u64 },

    /// Driver-level failure (close, ping).
    #[error("Driver error: {0}")]
    Driver(String),
}

/// Errors raised while loading or validating configuration.
///
/// All of these are fatal at startup: the process must not serve traffic.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A required environment key is absent.
    #[error("Missing required configuration key: {0}")]
    MissingKey(String),

    /// A key is present but unusable.
    #[error("Invalid configuration value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },

    /// No databases were declared at all.
    #[error("No databases configured (RELAY_DATABASES is empty)")]
    NoDatabases,
}

/// Errors raised by a choreography handler.
///
/// These never escape the dispatch boundary; the manager catches and logs
/// them so a misbehaving handler cannot crash the dispatch loop.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HandlerError {
    /// The inbound payload is missing a field the mapping needs.
    #[error("Missing payload field: {0}")]
    MissingField(String),

    /// The handler could not derive its outbound payload.
    #[error("Payload derivation failed: {0}")]
    Derivation(String),
}
