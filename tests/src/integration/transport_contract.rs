//! # Transport Contract Tests
//!
//! Wire-level guarantees of the event bus, exercised across two backends on
//! one shared wire (two logical processes):
//!
//! 1. **Fail-closed**: nothing reaches the wire before `connect()`.
//! 2. **Round-trip law**: a published payload arrives with its fields intact
//!    plus the injected `timestamp`/`eventId`.
//! 3. **Raw fallback**: malformed wire text is delivered raw and leaves the
//!    dispatch loop running.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::json;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    use event_bus::{
        BusBackend, ChannelListener, EventBusTransport, InMemoryBusBackend, InboundMessage,
        WirePayload,
    };
    use shared_types::{BusError, EventEnvelope};

    fn capture() -> (ChannelListener, mpsc::UnboundedReceiver<InboundMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let listener: ChannelListener = Arc::new(move |message| {
            let tx = tx.clone();
            Box::pin(async move {
                let _ = tx.send(message);
            })
        });
        (listener, rx)
    }

    /// Two transports on one wire, like two relay processes on one broker.
    fn linked_pair() -> (EventBusTransport, EventBusTransport, Arc<InMemoryBusBackend>) {
        let left_backend = Arc::new(InMemoryBusBackend::new());
        let right_backend = Arc::new(left_backend.peer());
        let left = EventBusTransport::new(
            Arc::clone(&left_backend) as Arc<dyn BusBackend>,
            false,
        );
        let right = EventBusTransport::new(right_backend, false);
        (left, right, left_backend)
    }

    #[tokio::test]
    async fn test_publish_before_connect_reaches_nothing() {
        let (left, right, _backend) = linked_pair();
        right.connect().await.unwrap();
        let (listener, mut rx) = capture();
        right.subscribe("a.request", listener).await.unwrap();

        let result = left.publish("a.request", json!({"n": 1})).await;

        assert_eq!(result, Err(BusError::NotConnected));
        assert!(
            timeout(Duration::from_millis(150), rx.recv()).await.is_err(),
            "nothing may cross the wire before connect"
        );
    }

    #[tokio::test]
    async fn test_round_trip_preserves_payload_and_injects_fields() {
        let (left, right, _backend) = linked_pair();
        left.connect().await.unwrap();
        right.connect().await.unwrap();
        let (listener, mut rx) = capture();
        right.subscribe("a.request", listener).await.unwrap();

        let envelope = EventEnvelope::new(json!({
            "userId": "u1",
            "nested": {"values": [1, 2, 3]},
        }));
        left.publish("a.request", envelope.to_value()).await.unwrap();

        let message = timeout(Duration::from_millis(300), rx.recv())
            .await
            .expect("timeout")
            .expect("message");
        let value = message.payload.as_json().expect("json").clone();
        assert_eq!(value["userId"], json!("u1"));
        assert_eq!(value["nested"]["values"], json!([1, 2, 3]));
        assert_eq!(value["eventId"], json!(envelope.event_id));
        assert_eq!(value["timestamp"], json!(envelope.timestamp));
    }

    #[tokio::test]
    async fn test_malformed_text_is_delivered_raw_and_dispatch_survives() {
        let (left, right, left_backend) = linked_pair();
        left.connect().await.unwrap();
        right.connect().await.unwrap();
        let (listener, mut rx) = capture();
        right.subscribe("a.request", listener).await.unwrap();

        // Garbage straight onto the wire, then a well-formed publish.
        left_backend.send("a.request", "{not json").await.unwrap();
        left.publish("a.request", json!({"ok": true})).await.unwrap();

        let first = timeout(Duration::from_millis(300), rx.recv())
            .await
            .expect("timeout")
            .expect("message");
        assert_eq!(first.payload, WirePayload::Raw("{not json".to_string()));

        let second = timeout(Duration::from_millis(300), rx.recv())
            .await
            .expect("timeout")
            .expect("message");
        assert_eq!(second.payload.as_json().expect("json")["ok"], json!(true));
    }

    #[tokio::test]
    async fn test_plain_string_payload_passes_through() {
        let (left, right, _backend) = linked_pair();
        left.connect().await.unwrap();
        right.connect().await.unwrap();
        let (listener, mut rx) = capture();
        right.subscribe("notes", listener).await.unwrap();

        left.publish("notes", "plain text").await.unwrap();

        let message = timeout(Duration::from_millis(300), rx.recv())
            .await
            .expect("timeout")
            .expect("message");
        // A plain string travels unquoted and arrives raw.
        assert_eq!(message.payload, WirePayload::Raw("plain text".to_string()));
    }
}
