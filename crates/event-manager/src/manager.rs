//! # Event Manager
//!
//! Binds the choreography catalogue onto the transport and keeps the 1:1
//! channel-to-handler bookkeeping. The transport is additive about
//! listeners; the manager is not: re-registering a channel tears down the
//! prior transport binding first, so exactly one handler is ever active per
//! channel.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, Weak};

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use connection_registry::ConnectionRegistry;
use event_bus::{ChannelListener, ConnectionStatus, EventBusTransport, InboundMessage, WirePayload};
use shared_types::{BusError, EventEnvelope};

use crate::choreography;
use crate::handler::{EventHandler, EventPublisher};

/// Snapshot of the manager's bookkeeping, serialized into health documents.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagerStatus {
    /// Whether `initialize()` completed.
    pub initialized: bool,
    /// Number of channels with an active handler.
    pub channel_count: usize,
    /// The bound channel names, sorted.
    pub channel_names: Vec<String>,
    /// Transport readiness per role.
    pub transport: ConnectionStatus,
}

/// Choreography coordinator over one transport.
pub struct EventManager {
    transport: Arc<EventBusTransport>,
    registry: Arc<ConnectionRegistry>,
    agents: Vec<String>,
    bindings: RwLock<BTreeMap<String, Arc<dyn EventHandler>>>,
    initialized: AtomicBool,
    shutdown: watch::Sender<bool>,
    /// Handed to listeners and handlers so the transport's spawned tasks
    /// never keep the manager alive.
    weak_self: Weak<Self>,
}

impl EventManager {
    /// Create an uninitialized manager.
    #[must_use]
    pub fn new(
        transport: Arc<EventBusTransport>,
        registry: Arc<ConnectionRegistry>,
        agents: Vec<String>,
    ) -> Arc<Self> {
        let (shutdown, _) = watch::channel(false);
        Arc::new_cyclic(|weak_self| Self {
            transport,
            registry,
            agents,
            bindings: RwLock::new(BTreeMap::new()),
            initialized: AtomicBool::new(false),
            shutdown,
            weak_self: weak_self.clone(),
        })
    }

    /// Connect the transport and bind the full choreography catalogue.
    ///
    /// The transport connect is fatal. Individual channel bindings are not:
    /// a failed subscribe is logged and skipped, leaving the manager in a
    /// degraded but running state that `status()` makes visible.
    pub async fn initialize(&self) -> Result<(), BusError> {
        self.transport.connect().await?;

        let table = choreography::catalogue(
            &self.agents,
            &self.registry,
            &self.weak_self,
            self.shutdown.clone(),
        );
        let total = table.len();
        let mut bound = 0usize;

        for (channel, handler) in table {
            match self.register(&channel, handler).await {
                Ok(()) => bound += 1,
                Err(e) => {
                    warn!(channel = %channel, error = %e, "[manager] Binding failed, skipping channel");
                }
            }
        }

        self.initialized.store(true, Ordering::SeqCst);
        info!(bound, total, "[manager] Choreography initialized");
        Ok(())
    }

    /// Bind a handler to a channel, replacing any existing binding.
    ///
    /// The prior transport binding is torn down before the new subscribe, so
    /// the old handler can never fire alongside the new one.
    pub async fn register(
        &self,
        channel: &str,
        handler: Arc<dyn EventHandler>,
    ) -> Result<(), BusError> {
        let replacing = self
            .bindings
            .read()
            .map(|b| b.contains_key(channel))
            .unwrap_or(false);
        if replacing {
            debug!(channel, "[manager] Replacing existing handler");
            if let Err(e) = self.transport.unsubscribe(channel).await {
                // Local listeners are detached regardless, so the replace
                // still proceeds.
                warn!(channel, error = %e, "[manager] Unsubscribe during replace failed");
            }
        }

        let listener = self.listener_for(Arc::clone(&handler));
        self.transport.subscribe(channel, listener).await?;

        if let Ok(mut bindings) = self.bindings.write() {
            bindings.insert(channel.to_string(), handler);
        }
        Ok(())
    }

    fn listener_for(&self, handler: Arc<dyn EventHandler>) -> ChannelListener {
        let manager = self.weak_self.clone();
        Arc::new(move |message: InboundMessage| {
            let manager = manager.clone();
            let handler = Arc::clone(&handler);
            Box::pin(async move {
                let Some(manager) = manager.upgrade() else {
                    return;
                };
                let envelope = envelope_from(message.payload);
                if let Err(e) = handler.handle(&envelope, manager.as_ref()).await {
                    warn!(
                        channel = %message.channel,
                        handler = handler.name(),
                        error = %e,
                        "[manager] Handler failed"
                    );
                }
            })
        })
    }

    /// Publish a payload with envelope injection. Fire-and-forget: failures
    /// are logged, never returned.
    pub async fn publish(&self, channel: &str, payload: Value) {
        let envelope = EventEnvelope::new(payload);
        if let Err(e) = self.transport.publish(channel, envelope.to_value()).await {
            warn!(channel, error = %e, "[manager] Publish failed");
        }
    }

    /// Current bookkeeping snapshot.
    #[must_use]
    pub fn status(&self) -> ManagerStatus {
        let channel_names: Vec<String> = self
            .bindings
            .read()
            .map(|b| b.keys().cloned().collect())
            .unwrap_or_default();
        ManagerStatus {
            initialized: self.initialized.load(Ordering::SeqCst),
            channel_count: channel_names.len(),
            channel_names,
            transport: self.transport.connection_status(),
        }
    }

    /// Receiver that flips to `true` when a shutdown event arrives.
    #[must_use]
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }

    /// Unwind every binding and disconnect the transport.
    ///
    /// Best-effort throughout: each unsubscribe outcome is reported and the
    /// sequence always runs to completion.
    pub async fn graceful_shutdown(&self) -> Vec<(String, Result<(), BusError>)> {
        let channels: Vec<String> = self
            .bindings
            .read()
            .map(|b| b.keys().cloned().collect())
            .unwrap_or_default();

        let mut outcomes = Vec::with_capacity(channels.len());
        for channel in channels {
            let result = self.transport.unsubscribe(&channel).await;
            if let Err(e) = &result {
                warn!(channel = %channel, error = %e, "[manager] Unsubscribe failed during shutdown");
            }
            outcomes.push((channel, result));
        }

        if let Ok(mut bindings) = self.bindings.write() {
            bindings.clear();
        }
        self.initialized.store(false, Ordering::SeqCst);

        if let Err(e) = self.transport.disconnect().await {
            warn!(error = %e, "[manager] Transport disconnect failed during shutdown");
        }
        info!(channels = outcomes.len(), "[manager] Graceful shutdown complete");
        outcomes
    }
}

#[async_trait]
impl EventPublisher for EventManager {
    async fn emit(&self, channel: &str, payload: Value) {
        self.publish(channel, payload).await;
    }
}

/// Interpret an inbound wire payload as an envelope.
///
/// Well-formed envelopes deserialize as-is. JSON without the injected
/// fields, and raw non-JSON text, are wrapped into a fresh envelope so
/// handlers always see one shape; raw text lands under the `data` key.
pub(crate) fn envelope_from(payload: WirePayload) -> EventEnvelope {
    match payload {
        WirePayload::Json(value) => serde_json::from_value::<EventEnvelope>(value.clone())
            .unwrap_or_else(|_| EventEnvelope::new(value)),
        WirePayload::Raw(text) => EventEnvelope::new(Value::String(text)),
    }
}
