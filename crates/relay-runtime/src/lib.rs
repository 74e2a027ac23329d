//! # Relay Runtime
//!
//! Wires the relay together and owns the process lifecycle:
//!
//! ```text
//!   telemetry → config → connect_all → manager.initialize → ready
//!                                                             │
//!   SIGINT / SIGTERM / system.shutdown ───────────────────────┤
//!                                                             ▼
//!            graceful_shutdown → disconnect_all → exit (30 s ceiling)
//! ```
//!
//! Any startup failure is fatal; the binary exits non-zero. The shutdown
//! sequence is best-effort but time-bounded: when graceful steps hang, the
//! ceiling forces the exit anyway.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::{error, info, warn};

use connection_registry::{ConnectionRegistry, DatabaseDriver};
use event_bus::{BusBackend, EventBusTransport};
use event_manager::EventManager;
use gateway::GatewayFacade;
use shared_types::{RelayConfig, SHUTDOWN_TIMEOUT_SECS};

/// The assembled relay process.
pub struct RelayRuntime {
    config: RelayConfig,
    registry: Arc<ConnectionRegistry>,
    manager: Arc<EventManager>,
    facade: GatewayFacade,
}

impl RelayRuntime {
    /// Wire the component graph over concrete driver and backend
    /// implementations. Nothing connects yet; `start()` does.
    #[must_use]
    pub fn build(
        config: RelayConfig,
        driver: Arc<dyn DatabaseDriver>,
        backend: Arc<dyn BusBackend>,
    ) -> Self {
        let registry = Arc::new(ConnectionRegistry::new(driver, config.registry));
        let transport = Arc::new(EventBusTransport::new(backend, config.bus.local_echo));
        let manager = EventManager::new(transport, Arc::clone(&registry), config.agents.clone());
        let facade = GatewayFacade::new(Arc::clone(&registry), Arc::clone(&manager));
        Self {
            config,
            registry,
            manager,
            facade,
        }
    }

    /// Run the startup sequence: databases first, then the event bus.
    ///
    /// Fail-fast: the first error aborts startup and propagates; the caller
    /// exits non-zero.
    pub async fn start(&self) -> anyhow::Result<()> {
        info!(
            databases = self.config.databases.len(),
            agents = self.config.agents.len(),
            bus = %self.config.bus.host,
            "[runtime] Starting agent relay"
        );

        self.registry
            .connect_all(&self.config.databases)
            .await
            .context("database startup failed")?;

        self.manager
            .initialize()
            .await
            .context("event bus startup failed")?;

        let report = self.facade.health_report().await;
        info!(status = %report.status, "[runtime] Relay ready");
        Ok(())
    }

    /// Block until a shutdown signal or a `system.shutdown` event arrives.
    pub async fn run_until_shutdown(&self) {
        let mut bus_signal = self.manager.shutdown_signal();
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    error!(error = %e, "[runtime] Signal handler failed, shutting down");
                } else {
                    info!("[runtime] Interrupt received");
                }
            }
            _ = bus_signal.changed() => {
                info!("[runtime] Shutdown event received");
            }
        }
    }

    /// Run the shutdown sequence under the fixed ceiling.
    ///
    /// Returns `true` when every step settled in time; `false` when the
    /// ceiling fired and the process should exit regardless.
    pub async fn shutdown(&self) -> bool {
        info!(ceiling_secs = SHUTDOWN_TIMEOUT_SECS, "[runtime] Shutting down");
        let sequence = async {
            self.manager.graceful_shutdown().await;
            self.registry.disconnect_all().await;
        };

        match tokio::time::timeout(Duration::from_secs(SHUTDOWN_TIMEOUT_SECS), sequence).await {
            Ok(()) => {
                info!("[runtime] Shutdown complete");
                true
            }
            Err(_) => {
                warn!("[runtime] Shutdown ceiling reached, forcing exit");
                false
            }
        }
    }

    /// Health facade, for embedding callers.
    #[must_use]
    pub fn facade(&self) -> &GatewayFacade {
        &self.facade
    }

    /// The event manager, for embedding callers.
    #[must_use]
    pub fn manager(&self) -> &Arc<EventManager> {
        &self.manager
    }

    /// The connection registry, for embedding callers.
    #[must_use]
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }
}
