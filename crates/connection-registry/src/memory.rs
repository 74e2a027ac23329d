//! # In-Memory Database Driver
//!
//! Single-process implementation of the driver seam. Suitable for the
//! default deployment and for tests; production wires a real client (e.g.
//! MongoDB, Postgres) behind the same trait.
//!
//! Failure injection covers the paths the registry has policy for:
//! refused establishment (`deny_service`), slow establishment
//! (`set_connect_delay`), failing pings/closes, and unexpected drops
//! (`simulate_drop`).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::debug;

use shared_types::{DatabaseConfig, ReadyState, RegistryError, RegistrySettings};

use crate::driver::{DatabaseDriver, DatabaseLink, LinkEvent};

/// One in-memory link.
pub struct InMemoryLink {
    service: String,
    state: RwLock<ReadyState>,
    events: broadcast::Sender<LinkEvent>,
    fail_ping: AtomicBool,
    fail_close: AtomicBool,
}

impl InMemoryLink {
    fn new(service: &str) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            service: service.to_string(),
            state: RwLock::new(ReadyState::Connected),
            events,
            fail_ping: AtomicBool::new(false),
            fail_close: AtomicBool::new(false),
        }
    }

    /// Drop the link as if the backend vanished (test helper).
    pub fn simulate_drop(&self) {
        if let Ok(mut state) = self.state.write() {
            *state = ReadyState::Disconnected;
        }
        let _ = self.events.send(LinkEvent::Disconnected);
        debug!(service = %self.service, "[driver] Simulated drop");
    }

    /// Make subsequent pings fail (test helper).
    pub fn fail_ping(&self) {
        self.fail_ping.store(true, Ordering::SeqCst);
    }

    /// Make `close` fail (test helper).
    pub fn fail_close(&self) {
        self.fail_close.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl DatabaseLink for InMemoryLink {
    fn ready_state(&self) -> ReadyState {
        self.state.read().map(|s| *s).unwrap_or(ReadyState::Disconnected)
    }

    async fn ping(&self) -> Result<(), RegistryError> {
        if self.fail_ping.load(Ordering::SeqCst) {
            return Err(RegistryError::Driver("ping failed".to_string()));
        }
        if !self.ready_state().is_connected() {
            return Err(RegistryError::Driver(format!(
                "{} is not connected",
                self.service
            )));
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), RegistryError> {
        if let Ok(mut state) = self.state.write() {
            *state = ReadyState::Disconnected;
        }
        if self.fail_close.load(Ordering::SeqCst) {
            return Err(RegistryError::Driver(format!(
                "close failed for {}",
                self.service
            )));
        }
        Ok(())
    }

    fn events(&self) -> broadcast::Receiver<LinkEvent> {
        self.events.subscribe()
    }
}

/// In-memory driver with per-service bookkeeping for tests.
pub struct InMemoryDriver {
    links: RwLock<HashMap<String, Arc<InMemoryLink>>>,
    connect_counts: RwLock<HashMap<String, Arc<AtomicU32>>>,
    denied: RwLock<HashMap<String, String>>,
    connect_delay: RwLock<Option<Duration>>,
}

impl InMemoryDriver {
    /// Create a driver that accepts every service.
    #[must_use]
    pub fn new() -> Self {
        Self {
            links: RwLock::new(HashMap::new()),
            connect_counts: RwLock::new(HashMap::new()),
            denied: RwLock::new(HashMap::new()),
            connect_delay: RwLock::new(None),
        }
    }

    /// Refuse establishment for a service (test helper).
    pub fn deny_service(&self, service: &str, reason: &str) {
        if let Ok(mut denied) = self.denied.write() {
            denied.insert(service.to_string(), reason.to_string());
        }
    }

    /// Accept a previously denied service again (test helper).
    pub fn allow_service(&self, service: &str) {
        if let Ok(mut denied) = self.denied.write() {
            denied.remove(service);
        }
    }

    /// Delay every establishment (test helper, for timeout coverage).
    pub fn set_connect_delay(&self, delay: Duration) {
        if let Ok(mut slot) = self.connect_delay.write() {
            *slot = Some(delay);
        }
    }

    /// The most recent link established for a service.
    #[must_use]
    pub fn link_for(&self, service: &str) -> Option<Arc<InMemoryLink>> {
        self.links.read().ok().and_then(|m| m.get(service).cloned())
    }

    /// How many times `connect` ran for a service.
    #[must_use]
    pub fn connect_count(&self, service: &str) -> u32 {
        self.connect_counts
            .read()
            .ok()
            .and_then(|m| m.get(service).map(|c| c.load(Ordering::SeqCst)))
            .unwrap_or(0)
    }
}

impl Default for InMemoryDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DatabaseDriver for InMemoryDriver {
    async fn connect(
        &self,
        service: &str,
        config: &DatabaseConfig,
        _settings: &RegistrySettings,
    ) -> Result<Arc<dyn DatabaseLink>, RegistryError> {
        let counter = {
            let mut counts = self
                .connect_counts
                .write()
                .map_err(|_| RegistryError::Driver("poisoned counter map".to_string()))?;
            Arc::clone(counts.entry(service.to_string()).or_default())
        };
        counter.fetch_add(1, Ordering::SeqCst);

        let delay = self.connect_delay.read().ok().and_then(|d| *d);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let denial = self
            .denied
            .read()
            .ok()
            .and_then(|d| d.get(service).cloned());
        if let Some(reason) = denial {
            return Err(RegistryError::ConnectionFailed {
                service: service.to_string(),
                reason,
            });
        }

        let link = Arc::new(InMemoryLink::new(service));
        if let Ok(mut links) = self.links.write() {
            links.insert(service.to_string(), Arc::clone(&link));
        }
        debug!(service, uri = %config.uri, "[driver] In-memory link established");
        Ok(link)
    }
}
