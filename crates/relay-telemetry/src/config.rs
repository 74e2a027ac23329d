//! Telemetry configuration, environment-driven like the rest of the relay.

use std::env;

/// Log output shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-oriented multi-line output for development.
    Pretty,
    /// One JSON object per line for container log pipelines.
    Json,
}

/// Settings for [`crate::init`].
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name stamped on every line.
    pub service_name: String,
    /// `EnvFilter` directives, e.g. `info,event_bus=debug`.
    pub filter: String,
    /// Output shape.
    pub format: LogFormat,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "agent-relay".to_string(),
            filter: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

impl TelemetryConfig {
    /// Read `RELAY_SERVICE_NAME`, `RELAY_LOG` (falling back to `RUST_LOG`),
    /// and `RELAY_LOG_FORMAT`. Unset keys fall back to defaults; an
    /// unrecognized format falls back to pretty rather than failing startup.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let filter = env::var("RELAY_LOG")
            .or_else(|_| env::var("RUST_LOG"))
            .unwrap_or(defaults.filter);
        let format = match env::var("RELAY_LOG_FORMAT").as_deref() {
            Ok("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };
        Self {
            service_name: env::var("RELAY_SERVICE_NAME").unwrap_or(defaults.service_name),
            filter,
            format,
        }
    }
}
