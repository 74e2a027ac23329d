//! # In-Memory Bus Backend
//!
//! Single-process implementation of [`BusBackend`] built on
//! `tokio::sync::broadcast`. Every backend created with [`peer`] shares the
//! same wire, so two backends behave like two processes on one broker.
//!
//! Suitable for single-node operation and tests; distributed deployments
//! would use a different implementation (e.g. Redis pub/sub) behind the same
//! trait.
//!
//! [`peer`]: InMemoryBusBackend::peer

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use shared_types::{BusError, DEFAULT_CHANNEL_CAPACITY};

use crate::backend::{BusBackend, LinkRole, WireMessage};

struct Inner {
    /// The shared wire: every peer's sends land here.
    wire: broadcast::Sender<WireMessage>,
    /// This backend's filtered inbound feed (subscribed channels only).
    inbound: broadcast::Sender<WireMessage>,
    /// Channels this backend registered interest in.
    subscribed: RwLock<HashSet<String>>,
    /// Failure injection: channels whose subscribe is refused.
    deny_subscribe: RwLock<HashSet<String>>,
    /// Failure injection: channels whose unsubscribe is refused.
    deny_unsubscribe: RwLock<HashSet<String>>,
    /// Both logical roles share this single readiness flag.
    connected: AtomicBool,
    /// The wire-to-inbound forwarder task, held for abort on disconnect.
    forwarder: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

/// In-memory wire shared by cloned peers.
pub struct InMemoryBusBackend {
    inner: Arc<Inner>,
}

impl InMemoryBusBackend {
    /// Create a backend with its own private wire.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a backend with a specific wire capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (wire, _) = broadcast::channel(capacity);
        Self::on_wire(wire)
    }

    /// Create another backend on the same wire (a second "process").
    #[must_use]
    pub fn peer(&self) -> Self {
        Self::on_wire(self.inner.wire.clone())
    }

    fn on_wire(wire: broadcast::Sender<WireMessage>) -> Self {
        let (inbound, _) = broadcast::channel(DEFAULT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                wire,
                inbound,
                subscribed: RwLock::new(HashSet::new()),
                deny_subscribe: RwLock::new(HashSet::new()),
                deny_unsubscribe: RwLock::new(HashSet::new()),
                connected: AtomicBool::new(false),
                forwarder: Mutex::new(None),
            }),
        }
    }

    /// Refuse future `subscribe` calls for a channel (failure injection).
    pub fn deny_subscribe(&self, channel: &str) {
        if let Ok(mut denied) = self.inner.deny_subscribe.write() {
            denied.insert(channel.to_string());
        }
    }

    /// Refuse future `unsubscribe` calls for a channel (failure injection).
    pub fn deny_unsubscribe(&self, channel: &str) {
        if let Ok(mut denied) = self.inner.deny_unsubscribe.write() {
            denied.insert(channel.to_string());
        }
    }

    /// Number of messages this send would reach, wire-wide.
    #[must_use]
    pub fn wire_receiver_count(&self) -> usize {
        self.inner.wire.receiver_count()
    }
}

impl Default for InMemoryBusBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BusBackend for InMemoryBusBackend {
    async fn connect(&self) -> Result<(), BusError> {
        if self.inner.connected.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        // Forward wire traffic for subscribed channels onto the inbound feed.
        let inner = Arc::clone(&self.inner);
        let mut wire_rx = self.inner.wire.subscribe();
        let handle = tokio::spawn(async move {
            loop {
                match wire_rx.recv().await {
                    Ok(message) => {
                        let wanted = inner
                            .subscribed
                            .read()
                            .map(|s| s.contains(&message.channel))
                            .unwrap_or(false);
                        if wanted {
                            let _ = inner.inbound.send(message);
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("[bus] Wire forwarder lagged by {} messages", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        if let Ok(mut slot) = self.inner.forwarder.lock() {
            *slot = Some(handle);
        }
        debug!("[bus] In-memory backend connected");
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), BusError> {
        // Idempotent: safe against partially-initialized state.
        if !self.inner.connected.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        if let Ok(mut slot) = self.inner.forwarder.lock() {
            if let Some(handle) = slot.take() {
                handle.abort();
            }
        }
        if let Ok(mut subscribed) = self.inner.subscribed.write() {
            subscribed.clear();
        }
        debug!("[bus] In-memory backend disconnected");
        Ok(())
    }

    async fn send(&self, channel: &str, text: &str) -> Result<(), BusError> {
        if !self.inner.connected.load(Ordering::SeqCst) {
            return Err(BusError::NotConnected);
        }
        let message = WireMessage {
            channel: channel.to_string(),
            text: text.to_string(),
        };
        match self.inner.wire.send(message) {
            Ok(receivers) => {
                debug!(channel, receivers, "[bus] Wire send");
                Ok(())
            }
            Err(_) => {
                // No receivers on the wire; the message is dropped.
                warn!(channel, "[bus] Wire send dropped (no receivers)");
                Ok(())
            }
        }
    }

    async fn subscribe(&self, channel: &str) -> Result<(), BusError> {
        if !self.inner.connected.load(Ordering::SeqCst) {
            return Err(BusError::NotConnected);
        }
        let denied = self
            .inner
            .deny_subscribe
            .read()
            .map(|d| d.contains(channel))
            .unwrap_or(false);
        if denied {
            return Err(BusError::Backend(format!("subscribe refused: {channel}")));
        }
        if let Ok(mut subscribed) = self.inner.subscribed.write() {
            subscribed.insert(channel.to_string());
        }
        Ok(())
    }

    async fn unsubscribe(&self, channel: &str) -> Result<(), BusError> {
        let denied = self
            .inner
            .deny_unsubscribe
            .read()
            .map(|d| d.contains(channel))
            .unwrap_or(false);
        if denied {
            return Err(BusError::Backend(format!("unsubscribe refused: {channel}")));
        }
        if let Ok(mut subscribed) = self.inner.subscribed.write() {
            subscribed.remove(channel);
        }
        Ok(())
    }

    fn incoming(&self) -> broadcast::Receiver<WireMessage> {
        self.inner.inbound.subscribe()
    }

    fn role_ready(&self, _role: LinkRole) -> bool {
        // One physical link serves every logical role here.
        self.inner.connected.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_send_before_connect_fails() {
        let backend = InMemoryBusBackend::new();
        let result = backend.send("a.request", "{}").await;
        assert_eq!(result, Err(BusError::NotConnected));
    }

    #[tokio::test]
    async fn test_subscribed_channel_delivers() {
        let backend = InMemoryBusBackend::new();
        backend.connect().await.unwrap();
        backend.subscribe("a.request").await.unwrap();
        let mut rx = backend.incoming();

        backend.send("a.request", "hello").await.unwrap();

        let message = timeout(Duration::from_millis(200), rx.recv())
            .await
            .expect("timeout")
            .expect("message");
        assert_eq!(message.channel, "a.request");
        assert_eq!(message.text, "hello");
    }

    #[tokio::test]
    async fn test_unsubscribed_channel_filtered() {
        let backend = InMemoryBusBackend::new();
        backend.connect().await.unwrap();
        backend.subscribe("a.request").await.unwrap();
        let mut rx = backend.incoming();

        backend.send("b.request", "not for us").await.unwrap();
        backend.send("a.request", "for us").await.unwrap();

        let message = timeout(Duration::from_millis(200), rx.recv())
            .await
            .expect("timeout")
            .expect("message");
        assert_eq!(message.text, "for us");
    }

    #[tokio::test]
    async fn test_peers_share_wire() {
        let left = InMemoryBusBackend::new();
        let right = left.peer();
        left.connect().await.unwrap();
        right.connect().await.unwrap();
        right.subscribe("x").await.unwrap();
        let mut rx = right.incoming();

        left.send("x", "cross-process").await.unwrap();

        let message = timeout(Duration::from_millis(200), rx.recv())
            .await
            .expect("timeout")
            .expect("message");
        assert_eq!(message.text, "cross-process");
    }

    #[tokio::test]
    async fn test_deny_subscribe() {
        let backend = InMemoryBusBackend::new();
        backend.connect().await.unwrap();
        backend.deny_subscribe("forbidden");
        assert!(backend.subscribe("forbidden").await.is_err());
        assert!(backend.subscribe("allowed").await.is_ok());
    }

    #[tokio::test]
    async fn test_disconnect_idempotent() {
        let backend = InMemoryBusBackend::new();
        assert!(backend.disconnect().await.is_ok());
        backend.connect().await.unwrap();
        assert!(backend.disconnect().await.is_ok());
        assert!(backend.disconnect().await.is_ok());
        assert!(!backend.role_ready(LinkRole::Publisher));
    }
}
