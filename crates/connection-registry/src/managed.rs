//! # Managed Single Connection
//!
//! A self-healing wrapper around one database link. Where the registry
//! leaves retry policy to callers, this variant watches its link's event
//! stream and reconnects on unexpected drops, backing off further with each
//! attempt. Once the retry budget is exhausted the connection is marked
//! permanently failed and stops trying; `health_check` keeps reporting it.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use shared_types::{DatabaseConfig, ReadyState, RegistryError, RegistrySettings};

use crate::driver::{DatabaseDriver, DatabaseLink, LinkEvent};

/// Reconnect schedule: the delay grows with each attempt, and the attempt
/// count is capped.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    /// Delay before the first retry; attempt `n` waits `base_delay * n`.
    pub base_delay: Duration,
    /// Retries allowed before the connection is marked permanently failed.
    pub max_retries: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_retries: 5,
        }
    }
}

impl BackoffPolicy {
    /// Delay before retry `attempt` (1-based).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }
}

/// Point-in-time health snapshot. Never an error: an unreachable database
/// is a *reported* state, not a failure of the probe itself.
#[derive(Debug, Clone)]
pub struct HealthProbe {
    /// Lifecycle state at probe time.
    pub status: ReadyState,
    /// Whether a live round trip succeeded.
    pub healthy: bool,
    /// Free-form probe details (latency, failure reasons).
    pub details: BTreeMap<String, String>,
}

/// One database connection with automatic reconnection.
pub struct ManagedConnection {
    driver: Arc<dyn DatabaseDriver>,
    service: String,
    config: DatabaseConfig,
    settings: RegistrySettings,
    policy: BackoffPolicy,
    link: RwLock<Option<Arc<dyn DatabaseLink>>>,
    retry_count: AtomicU32,
    permanently_failed: AtomicBool,
    shutting_down: AtomicBool,
    /// Handed to watcher tasks so they never keep the connection alive.
    weak_self: Weak<Self>,
}

impl ManagedConnection {
    /// Create an unconnected managed connection.
    #[must_use]
    pub fn new(
        driver: Arc<dyn DatabaseDriver>,
        service: &str,
        config: DatabaseConfig,
        settings: RegistrySettings,
        policy: BackoffPolicy,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak_self| Self {
            driver,
            service: service.to_string(),
            config,
            settings,
            policy,
            link: RwLock::new(None),
            retry_count: AtomicU32::new(0),
            permanently_failed: AtomicBool::new(false),
            shutting_down: AtomicBool::new(false),
            weak_self: weak_self.clone(),
        })
    }

    /// The service name this connection serves.
    #[must_use]
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Establish the link and start watching it.
    ///
    /// Idempotent while connected. A successful connect clears any earlier
    /// permanent-failure mark and resets the retry budget.
    pub async fn connect(&self) -> Result<(), RegistryError> {
        if self.ready_state().await.is_connected() {
            debug!(service = %self.service, "[managed] Already connected");
            return Ok(());
        }

        let link = self
            .driver
            .connect(&self.service, &self.config, &self.settings)
            .await?;

        self.install(link).await;
        info!(service = %self.service, "[managed] Connected");
        Ok(())
    }

    async fn install(&self, link: Arc<dyn DatabaseLink>) {
        let mut events = link.events();
        *self.link.write().await = Some(link);
        self.retry_count.store(0, Ordering::SeqCst);
        self.permanently_failed.store(false, Ordering::SeqCst);

        let conn = self.weak_self.clone();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(LinkEvent::Disconnected) => {
                        let Some(conn) = conn.upgrade() else { return };
                        if conn.shutting_down.load(Ordering::SeqCst) {
                            return;
                        }
                        warn!(service = %conn.service, "[managed] Link dropped, starting reconnect");
                        conn.reconnect_loop().await;
                        return;
                    }
                    Ok(LinkEvent::Error(e)) => {
                        if let Some(conn) = conn.upgrade() {
                            warn!(service = %conn.service, error = %e, "[managed] Link error");
                        } else {
                            return;
                        }
                    }
                    Ok(_) => {}
                    Err(_) => return,
                }
            }
        });
    }

    // Boxed: reconnect awaits install, which spawns a watcher that awaits
    // reconnect again. The indirection keeps the recursive future sized and
    // `Send` for `tokio::spawn`.
    fn reconnect_loop(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            loop {
                if self.shutting_down.load(Ordering::SeqCst) {
                    return;
                }
                let attempt = self.retry_count.fetch_add(1, Ordering::SeqCst) + 1;
                if attempt > self.policy.max_retries {
                    self.permanently_failed.store(true, Ordering::SeqCst);
                    error!(
                        service = %self.service,
                        retries = self.policy.max_retries,
                        "[managed] Retry budget exhausted, giving up"
                    );
                    return;
                }

                let delay = self.policy.delay_for(attempt);
                debug!(
                    service = %self.service,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "[managed] Reconnect scheduled"
                );
                tokio::time::sleep(delay).await;

                match self
                    .driver
                    .connect(&self.service, &self.config, &self.settings)
                    .await
                {
                    Ok(link) => {
                        self.install(link).await;
                        info!(service = %self.service, attempt, "[managed] Reconnected");
                        return;
                    }
                    Err(e) => {
                        warn!(service = %self.service, attempt, error = %e, "[managed] Reconnect attempt failed");
                    }
                }
            }
        })
    }

    /// Current lifecycle state.
    pub async fn ready_state(&self) -> ReadyState {
        match self.link.read().await.as_ref() {
            Some(link) => link.ready_state(),
            None => ReadyState::Disconnected,
        }
    }

    /// Whether the retry budget has been exhausted.
    #[must_use]
    pub fn is_permanently_failed(&self) -> bool {
        self.permanently_failed.load(Ordering::SeqCst)
    }

    /// Probe the connection. Never errors; failures land in the report.
    pub async fn health_check(&self) -> HealthProbe {
        let mut details = BTreeMap::new();
        let link = self.link.read().await.clone();

        let Some(link) = link else {
            details.insert("reason".to_string(), "never connected".to_string());
            return HealthProbe {
                status: ReadyState::Disconnected,
                healthy: false,
                details,
            };
        };

        let status = link.ready_state();
        if self.is_permanently_failed() {
            details.insert("reason".to_string(), "retry budget exhausted".to_string());
        }

        let started = tokio::time::Instant::now();
        let healthy = match link.ping().await {
            Ok(()) => {
                let elapsed = started.elapsed().as_millis() as u64;
                details.insert("ping_ms".to_string(), elapsed.to_string());
                true
            }
            Err(e) => {
                details.insert("ping_error".to_string(), e.to_string());
                false
            }
        };

        HealthProbe {
            status,
            healthy,
            details,
        }
    }

    /// Close the link and stop the reconnect machinery.
    pub async fn disconnect(&self) -> Result<(), RegistryError> {
        self.shutting_down.store(true, Ordering::SeqCst);
        let link = self.link.write().await.take();
        if let Some(link) = link {
            link.close().await?;
            info!(service = %self.service, "[managed] Disconnected");
        }
        Ok(())
    }
}
