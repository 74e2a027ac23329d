//! # Gateway Facade
//!
//! The single composite view the HTTP layer consumes: one health document
//! reduced from the registry's per-database states and the event manager's
//! bookkeeping. No routing, no auth, no business logic lives here.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use tracing::debug;

use connection_registry::ConnectionRegistry;
use event_manager::{EventManager, ManagerStatus};
use shared_types::{HealthStatus, ReadyState};

/// The composite health document.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    /// Reduced overall verdict.
    pub status: HealthStatus,
    /// Per-database lifecycle state.
    pub databases: BTreeMap<String, ReadyState>,
    /// Event manager and transport snapshot.
    pub event_bus: ManagerStatus,
    /// Report generation time, ISO-8601.
    pub timestamp: String,
}

/// Facade over the registry and the event manager.
pub struct GatewayFacade {
    registry: Arc<ConnectionRegistry>,
    manager: Arc<EventManager>,
}

impl GatewayFacade {
    #[must_use]
    pub fn new(registry: Arc<ConnectionRegistry>, manager: Arc<EventManager>) -> Self {
        Self { registry, manager }
    }

    /// Reduce the current component states into one report.
    ///
    /// - `Healthy`: every database `Connected` and the manager initialized.
    /// - `Unhealthy`: the bus is down, or no database is connected.
    /// - `Degraded`: anything in between.
    pub async fn health_report(&self) -> HealthReport {
        let databases = self.registry.status().await;
        let event_bus = self.manager.status();

        let bus_up = event_bus.initialized && event_bus.transport.ready;
        let connected = databases.values().filter(|s| s.is_connected()).count();
        let all_connected = !databases.is_empty() && connected == databases.len();

        let status = if !bus_up || connected == 0 {
            HealthStatus::Unhealthy
        } else if all_connected {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded
        };

        debug!(?status, connected, total = databases.len(), "[gateway] Health report");
        HealthReport {
            status,
            databases,
            event_bus,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }

    /// The 200/503 view of [`health_report`]: 200 only when every database
    /// is connected and the manager is initialized; degraded is 503.
    ///
    /// [`health_report`]: Self::health_report
    pub async fn is_healthy(&self) -> bool {
        self.health_report().await.status == HealthStatus::Healthy
    }
}
