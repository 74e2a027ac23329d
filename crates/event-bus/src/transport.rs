//! # Event Bus Transport
//!
//! The transport owns the backend connection pair and the local listener
//! registry. Listeners are additive at this layer: subscribing a channel
//! twice leaves two callbacks firing. The 1:1 channel-to-handler policy
//! lives one level up, in the event manager's bookkeeping.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use futures::future::BoxFuture;
use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use shared_types::BusError;

use crate::backend::{BusBackend, LinkRole, WireMessage};
use crate::codec::{InboundMessage, WirePayload};

/// A channel callback: fired once per inbound message, as its own task.
pub type ChannelListener = Arc<dyn Fn(InboundMessage) -> BoxFuture<'static, ()> + Send + Sync>;

type ListenerMap = Arc<RwLock<HashMap<String, Vec<ChannelListener>>>>;

/// Readiness per logical role, as reported by `connection_status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConnectionStatus {
    /// Publish link readiness.
    pub publisher: bool,
    /// Subscribe link readiness.
    pub subscriber: bool,
    /// Auxiliary link readiness.
    pub control: bool,
    /// The transport-level ready flag.
    pub ready: bool,
}

/// Pub/sub transport over a [`BusBackend`].
pub struct EventBusTransport {
    backend: Arc<dyn BusBackend>,
    listeners: ListenerMap,
    ready: AtomicBool,
    /// Deliver published messages to same-process listeners without a wire
    /// round trip. Explicit configuration; see `BusConfig::local_echo`.
    local_echo: bool,
    shutdown: watch::Sender<bool>,
}

impl EventBusTransport {
    /// Create a transport over a backend. Not ready until `connect()`.
    #[must_use]
    pub fn new(backend: Arc<dyn BusBackend>, local_echo: bool) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            backend,
            listeners: Arc::new(RwLock::new(HashMap::new())),
            ready: AtomicBool::new(false),
            local_echo,
            shutdown,
        }
    }

    /// Establish the backend links and start the dispatch loop.
    ///
    /// Fatal on backend failure: callers must not build the event manager
    /// on top of a transport whose `connect` failed.
    pub async fn connect(&self) -> Result<(), BusError> {
        if self.ready.load(Ordering::SeqCst) {
            return Ok(());
        }
        self.backend.connect().await?;

        let rx = self.backend.incoming();
        let listeners = Arc::clone(&self.listeners);
        let shutdown_rx = self.shutdown.subscribe();
        tokio::spawn(dispatch_loop(rx, listeners, shutdown_rx));

        self.ready.store(true, Ordering::SeqCst);
        info!("[bus] Transport connected");
        Ok(())
    }

    /// Publish a payload on a channel.
    ///
    /// # Errors
    ///
    /// `BusError::NotConnected` before `connect()` (nothing reaches the
    /// wire); `BusError::Serialization` for unencodable payloads.
    pub async fn publish(
        &self,
        channel: &str,
        payload: impl Into<WirePayload>,
    ) -> Result<(), BusError> {
        if !self.ready.load(Ordering::SeqCst) {
            return Err(BusError::NotConnected);
        }
        let payload = payload.into();
        let text = payload.encode()?;
        self.backend.send(channel, &text).await?;

        if self.local_echo {
            // Same-process fast path: deliver without the wire round trip.
            deliver(&self.listeners, channel, payload);
        }
        Ok(())
    }

    /// Bind a callback to fire whenever a message arrives on `channel`.
    ///
    /// Additive: an existing callback on the same channel keeps firing.
    pub async fn subscribe(
        &self,
        channel: &str,
        listener: ChannelListener,
    ) -> Result<(), BusError> {
        if !self.ready.load(Ordering::SeqCst) {
            return Err(BusError::NotConnected);
        }
        self.backend.subscribe(channel).await?;
        if let Ok(mut map) = self.listeners.write() {
            map.entry(channel.to_string()).or_default().push(listener);
        }
        debug!(channel, "[bus] Subscribed");
        Ok(())
    }

    /// Remove the backend subscription and detach all local callbacks.
    pub async fn unsubscribe(&self, channel: &str) -> Result<(), BusError> {
        // Local callbacks are detached even if the backend refuses, so a
        // flaky backend cannot leave phantom listeners behind.
        if let Ok(mut map) = self.listeners.write() {
            map.remove(channel);
        }
        self.backend.unsubscribe(channel).await?;
        debug!(channel, "[bus] Unsubscribed");
        Ok(())
    }

    /// Close all backend links. Idempotent against partially-initialized
    /// state: calling before `connect()` is a no-op.
    pub async fn disconnect(&self) -> Result<(), BusError> {
        if !self.ready.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        let _ = self.shutdown.send(true);
        self.backend.disconnect().await?;
        info!("[bus] Transport disconnected");
        Ok(())
    }

    /// Readiness per logical role.
    #[must_use]
    pub fn connection_status(&self) -> ConnectionStatus {
        ConnectionStatus {
            publisher: self.backend.role_ready(LinkRole::Publisher),
            subscriber: self.backend.role_ready(LinkRole::Subscriber),
            control: self.backend.role_ready(LinkRole::Control),
            ready: self.ready.load(Ordering::SeqCst),
        }
    }

    /// Number of channels with at least one local callback.
    #[must_use]
    pub fn listener_channel_count(&self) -> usize {
        self.listeners.read().map(|m| m.len()).unwrap_or(0)
    }
}

/// Reads the backend's inbound feed and fans messages out to listeners.
///
/// Every delivery is spawned as its own task: a handler that publishes
/// further events re-enters through the scheduler, never through this stack.
async fn dispatch_loop(
    mut rx: broadcast::Receiver<WireMessage>,
    listeners: ListenerMap,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => {
                debug!("[bus] Dispatch loop shutting down");
                break;
            }
            result = rx.recv() => match result {
                Ok(wire) => {
                    let payload = WirePayload::decode(&wire.text);
                    deliver(&listeners, &wire.channel, payload);
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("[bus] Dispatch lagged by {} messages", n);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("[bus] Inbound feed closed, dispatch loop exiting");
                    break;
                }
            }
        }
    }
}

fn deliver(listeners: &ListenerMap, channel: &str, payload: WirePayload) {
    let bound: Vec<ChannelListener> = listeners
        .read()
        .ok()
        .and_then(|map| map.get(channel).cloned())
        .unwrap_or_default();

    for listener in bound {
        let message = InboundMessage {
            channel: channel.to_string(),
            payload: payload.clone(),
        };
        tokio::spawn(async move {
            listener(message).await;
        });
    }
}
