//! # Connection Registry
//!
//! Named database handles behind get/connect/disconnect/status. The registry
//! is a process-wide singleton by convention, but nothing here is global:
//! construct one per test if you like.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use futures::future::{join_all, try_join_all};
use tokio::sync::RwLock;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use shared_types::{DatabaseConfig, ReadyState, RegistryError, RegistrySettings};

use crate::driver::{DatabaseDriver, DatabaseLink};

/// One live database binding, keyed by service name.
pub struct ConnectionHandle {
    service: String,
    config: DatabaseConfig,
    link: Arc<dyn DatabaseLink>,
}

impl ConnectionHandle {
    fn new(service: &str, config: DatabaseConfig, link: Arc<dyn DatabaseLink>) -> Self {
        Self {
            service: service.to_string(),
            config,
            link,
        }
    }

    /// The service name this handle is registered under.
    #[must_use]
    pub fn service(&self) -> &str {
        &self.service
    }

    /// The config the link was established with.
    #[must_use]
    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// Current lifecycle state, as driven by link events.
    #[must_use]
    pub fn ready_state(&self) -> ReadyState {
        self.link.ready_state()
    }

    /// The underlying link.
    #[must_use]
    pub fn link(&self) -> &Arc<dyn DatabaseLink> {
        &self.link
    }
}

/// Registry of named database connections.
pub struct ConnectionRegistry {
    driver: Arc<dyn DatabaseDriver>,
    settings: RegistrySettings,
    handles: RwLock<HashMap<String, Arc<ConnectionHandle>>>,
}

impl ConnectionRegistry {
    /// Create an empty registry over a driver.
    #[must_use]
    pub fn new(driver: Arc<dyn DatabaseDriver>, settings: RegistrySettings) -> Self {
        Self {
            driver,
            settings,
            handles: RwLock::new(HashMap::new()),
        }
    }

    /// Connect a named service, reusing a healthy existing handle.
    ///
    /// If a handle exists and is `Connected`, it is returned unchanged and
    /// no new connection is opened. Otherwise establishment runs bounded by
    /// the configured connect timeout. Failures propagate; this layer never
    /// retries.
    pub async fn connect(
        &self,
        service: &str,
        config: &DatabaseConfig,
    ) -> Result<Arc<ConnectionHandle>, RegistryError> {
        if let Some(existing) = self.handles.read().await.get(service) {
            if existing.ready_state().is_connected() {
                debug!(service, "[registry] Reusing connected handle");
                return Ok(Arc::clone(existing));
            }
        }

        let link = timeout(
            self.settings.connect_timeout(),
            self.driver.connect(service, config, &self.settings),
        )
        .await
        .map_err(|_| RegistryError::Timeout {
            service: service.to_string(),
            waited_ms: self.settings.connect_timeout_ms,
        })??;

        let handle = Arc::new(ConnectionHandle::new(service, config.clone(), link));

        // We suspended during establishment; another task may have won the
        // race. Re-check instead of assuming the earlier read still holds.
        let mut handles = self.handles.write().await;
        if let Some(existing) = handles.get(service) {
            if existing.ready_state().is_connected() {
                let existing = Arc::clone(existing);
                drop(handles);
                warn!(service, "[registry] Concurrent connect won, closing duplicate link");
                if let Err(e) = handle.link().close().await {
                    warn!(service, error = %e, "[registry] Duplicate link close failed");
                }
                return Ok(existing);
            }
        }
        handles.insert(service.to_string(), Arc::clone(&handle));
        drop(handles);

        info!(service, database = %config.name, "[registry] Connected");
        Ok(handle)
    }

    /// Connect a fixed list of named services concurrently.
    ///
    /// Fails fast: the first error propagates and already-established
    /// handles stay registered (no rollback).
    pub async fn connect_all(
        &self,
        configs: &BTreeMap<String, DatabaseConfig>,
    ) -> Result<(), RegistryError> {
        try_join_all(
            configs
                .iter()
                .map(|(service, config)| self.connect(service, config)),
        )
        .await?;
        info!(count = configs.len(), "[registry] All services connected");
        Ok(())
    }

    /// Look up a handle by name.
    pub async fn get(&self, service: &str) -> Result<Arc<ConnectionHandle>, RegistryError> {
        self.handles
            .read()
            .await
            .get(service)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(service.to_string()))
    }

    /// Close a named connection and drop it from the registry.
    ///
    /// Unknown names are a no-op. Close errors are logged and swallowed: the
    /// entry is gone either way, and a flaky close must not abort a shutdown
    /// sequence.
    pub async fn disconnect(&self, service: &str) {
        if let Err(e) = self.remove_and_close(service).await {
            error!(service, error = %e, "[registry] Close failed during disconnect");
        }
    }

    async fn remove_and_close(&self, service: &str) -> Result<(), RegistryError> {
        let handle = self.handles.write().await.remove(service);
        let Some(handle) = handle else {
            debug!(service, "[registry] Disconnect of unknown service is a no-op");
            return Ok(());
        };

        handle.link().close().await?;
        info!(service, "[registry] Disconnected");
        Ok(())
    }

    /// Disconnect every registered service concurrently.
    ///
    /// Waits for all to settle and returns per-item close outcomes so the
    /// swallow policy stays observable; individual failures never abort the
    /// batch.
    pub async fn disconnect_all(&self) -> Vec<(String, Result<(), RegistryError>)> {
        let services: Vec<String> = self.handles.read().await.keys().cloned().collect();

        let outcomes = join_all(services.iter().map(|service| async move {
            let result = self.remove_and_close(service).await;
            if let Err(e) = &result {
                warn!(service = %service, error = %e, "[registry] Best-effort disconnect failed");
            }
            (service.clone(), result)
        }))
        .await;

        info!(count = outcomes.len(), "[registry] Disconnect sweep complete");
        outcomes
    }

    /// Current state per service name. Pure read.
    pub async fn status(&self) -> BTreeMap<String, ReadyState> {
        self.handles
            .read()
            .await
            .iter()
            .map(|(service, handle)| (service.clone(), handle.ready_state()))
            .collect()
    }
}
