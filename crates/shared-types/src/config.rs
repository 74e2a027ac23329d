//! # Relay Configuration
//!
//! Configuration is consumed as a flat mapping of named database configs plus
//! bus backend parameters, loaded from the environment at process start.
//! Missing required keys are fatal: the process must not serve traffic.
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `RELAY_DATABASES` | (required) | Comma-separated service names |
//! | `RELAY_DB_<NAME>_URI` | (required) | Connection URI per service |
//! | `RELAY_DB_<NAME>_NAME` | `<name>` | Database name per service |
//! | `RELAY_BUS_HOST` | (required) | Bus backend host |
//! | `RELAY_BUS_PORT` | `6379` | Bus backend port |
//! | `RELAY_BUS_PASSWORD` | (none) | Bus backend password |
//! | `RELAY_BUS_LOCAL_ECHO` | `false` | In-process fast-path delivery |
//! | `RELAY_AGENTS` | built-in set | Comma-separated agent names |
//! | `RELAY_CONNECT_TIMEOUT_MS` | `10000` | Connection establishment ceiling |
//! | `RELAY_IDLE_TIMEOUT_MS` | `45000` | Idle-socket close |

use std::collections::BTreeMap;
use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;

/// One named logical database binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Connection URI.
    pub uri: String,
    /// Database name within the backend.
    pub name: String,
}

/// Timeouts governing connection establishment and idle sockets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrySettings {
    /// Ceiling on connection establishment; exceeding it fails the connect.
    pub connect_timeout_ms: u64,
    /// Idle sockets are closed after this much inactivity.
    pub idle_timeout_ms: u64,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 10_000,
            idle_timeout_ms: 45_000,
        }
    }
}

impl RegistrySettings {
    /// Connection establishment timeout as a `Duration`.
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Idle-socket timeout as a `Duration`.
    #[must_use]
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }
}

/// Bus backend connection parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusConfig {
    /// Backend host.
    pub host: String,
    /// Backend port.
    pub port: u16,
    /// Optional password.
    pub password: Option<String>,
    /// Deliver published messages to same-process listeners without a wire
    /// round trip. Off by default: under multi-instance deployment the wire
    /// already loops messages back, and echoing both ways double-delivers.
    pub local_echo: bool,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 6379,
            password: None,
            local_echo: false,
        }
    }
}

/// Complete relay configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Named database configs, `service name -> {uri, name}`.
    pub databases: BTreeMap<String, DatabaseConfig>,
    /// Connection timeouts.
    pub registry: RegistrySettings,
    /// Bus backend parameters.
    pub bus: BusConfig,
    /// Agents the choreography catalogue is built for.
    pub agents: Vec<String>,
}

/// The agent set wired when `RELAY_AGENTS` is not given.
pub const DEFAULT_AGENTS: &[&str] = &["business-strategy", "asset-generator", "growth-advisor"];

impl RelayConfig {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Fails on any missing required key or unparseable value. Callers treat
    /// this as fatal and exit non-zero.
    pub fn from_env() -> Result<Self, ConfigError> {
        let names = env::var("RELAY_DATABASES")
            .map_err(|_| ConfigError::MissingKey("RELAY_DATABASES".to_string()))?;

        let mut databases = BTreeMap::new();
        for name in names.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let key = name.to_uppercase().replace('-', "_");
            let uri_key = format!("RELAY_DB_{key}_URI");
            let uri = env::var(&uri_key).map_err(|_| ConfigError::MissingKey(uri_key))?;
            let db_name =
                env::var(format!("RELAY_DB_{key}_NAME")).unwrap_or_else(|_| name.to_string());
            databases.insert(name.to_string(), DatabaseConfig { uri, name: db_name });
        }
        if databases.is_empty() {
            return Err(ConfigError::NoDatabases);
        }

        let host = env::var("RELAY_BUS_HOST")
            .map_err(|_| ConfigError::MissingKey("RELAY_BUS_HOST".to_string()))?;
        let port = match env::var("RELAY_BUS_PORT") {
            Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
                key: "RELAY_BUS_PORT".to_string(),
                reason: format!("not a port number: {raw}"),
            })?,
            Err(_) => 6379,
        };

        let agents = match env::var("RELAY_AGENTS") {
            Ok(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
            Err(_) => DEFAULT_AGENTS.iter().map(|s| (*s).to_string()).collect(),
        };

        Ok(Self {
            databases,
            registry: RegistrySettings {
                connect_timeout_ms: env_u64("RELAY_CONNECT_TIMEOUT_MS", 10_000)?,
                idle_timeout_ms: env_u64("RELAY_IDLE_TIMEOUT_MS", 45_000)?,
            },
            bus: BusConfig {
                host,
                port,
                password: env::var("RELAY_BUS_PASSWORD").ok(),
                local_echo: env::var("RELAY_BUS_LOCAL_ECHO")
                    .map(|v| v.to_lowercase() == "true" || v == "1")
                    .unwrap_or(false),
            },
            agents,
        })
    }

    /// Validate cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.databases.is_empty() {
            return Err(ConfigError::NoDatabases);
        }
        if self.registry.connect_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "RELAY_CONNECT_TIMEOUT_MS".to_string(),
                reason: "cannot be 0".to_string(),
            });
        }
        if self.agents.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "RELAY_AGENTS".to_string(),
                reason: "agent list cannot be empty".to_string(),
            });
        }
        Ok(())
    }
}

fn env_u64(key: &str, default: u64) -> Result<u64, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            reason: format!("not a number: {raw}"),
        }),
        Err(_) => Ok(default),
    }
}
