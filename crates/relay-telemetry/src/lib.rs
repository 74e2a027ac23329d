//! # Relay Telemetry
//!
//! Structured logging for every relay binary: `tracing` with an
//! environment-driven filter, pretty output for development and JSON lines
//! for containers. Initialize once, first thing in `main`, before any
//! component logs.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod config;

pub use config::{LogFormat, TelemetryConfig};

use thiserror::Error;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Telemetry could not be installed.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// A global subscriber is already set for this process.
    #[error("Telemetry initialization failed: {0}")]
    Init(String),
}

/// Install the global subscriber.
///
/// An unparsable filter string falls back to `info` instead of aborting
/// startup; a second call errors because the global subscriber is already
/// set.
pub fn init(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let filter =
        EnvFilter::try_new(&config.filter).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    let result = match config.format {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(false)
                    .with_target(true),
            )
            .try_init(),
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init(),
    };
    result.map_err(|e| TelemetryError::Init(e.to_string()))?;

    info!(
        service = %config.service_name,
        filter = %config.filter,
        "[telemetry] Logging initialized"
    );
    Ok(())
}
