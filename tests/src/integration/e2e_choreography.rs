//! # End-to-End Choreography Tests
//!
//! The full event flow through an assembled relay:
//!
//! ```text
//! [External publisher] ──<agent>.request──→ [Event Bus]
//!                                               │
//!                                               ▼
//!                                        [Event Manager]
//!                                               │ choreography
//!           ┌───────────────────────────────────┼──────────────────────┐
//!           ▼                                   ▼                      ▼
//! internal.<agent>.process        usage-guardian.update-usage   system.agent-error
//! ```
//!
//! Every test runs a real `RelayRuntime` over in-memory driver/backend
//! doubles and observes outcomes from a second transport on the same wire,
//! the way a separate process would.

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, HashSet};
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::{json, Value};
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    use connection_registry::{DatabaseDriver, InMemoryDriver};
    use event_bus::{
        BusBackend, ChannelListener, EventBusTransport, InMemoryBusBackend, InboundMessage,
    };
    use relay_runtime::RelayRuntime;
    use shared_types::{channels, BusConfig, DatabaseConfig, RegistrySettings, RelayConfig};

    struct Relay {
        runtime: RelayRuntime,
        observer: Arc<EventBusTransport>,
    }

    impl Relay {
        /// Start a relay and a wire-sharing observer transport.
        async fn start() -> Self {
            let mut databases = BTreeMap::new();
            databases.insert(
                "strategy".to_string(),
                DatabaseConfig {
                    uri: "db://localhost/strategy".to_string(),
                    name: "strategy".to_string(),
                },
            );
            let config = RelayConfig {
                databases,
                registry: RegistrySettings::default(),
                bus: BusConfig::default(),
                agents: vec![
                    "business-strategy".to_string(),
                    "asset-generator".to_string(),
                ],
            };

            let backend = Arc::new(InMemoryBusBackend::with_capacity(8192));
            let observer = Arc::new(EventBusTransport::new(
                Arc::new(backend.peer()) as Arc<dyn BusBackend>,
                false,
            ));
            observer.connect().await.unwrap();

            let runtime = RelayRuntime::build(
                config,
                Arc::new(InMemoryDriver::new()) as Arc<dyn DatabaseDriver>,
                backend,
            );
            runtime.start().await.unwrap();

            Self { runtime, observer }
        }

        /// Watch a channel from the observer process.
        async fn observe(&self, channel: &str) -> mpsc::UnboundedReceiver<InboundMessage> {
            let (tx, rx) = mpsc::unbounded_channel();
            let listener: ChannelListener = Arc::new(move |message| {
                let tx = tx.clone();
                Box::pin(async move {
                    let _ = tx.send(message);
                })
            });
            self.observer.subscribe(channel, listener).await.unwrap();
            rx
        }

        /// Publish from the observer process, as an external component would.
        async fn inject(&self, channel: &str, payload: Value) {
            self.observer.publish(channel, payload).await.unwrap();
        }
    }

    async fn next_json(rx: &mut mpsc::UnboundedReceiver<InboundMessage>) -> Value {
        let message = timeout(Duration::from_millis(500), rx.recv())
            .await
            .expect("timeout waiting for choreography output")
            .expect("channel closed");
        message.payload.as_json().expect("json payload").clone()
    }

    #[tokio::test]
    async fn test_agent_request_forwarded_to_internal_channel() {
        let relay = Relay::start().await;
        let mut rx = relay.observe("internal.business-strategy.process").await;

        relay
            .inject(
                "business-strategy.request",
                json!({"userId": "u1", "prompt": "expand into new markets"}),
            )
            .await;

        let forwarded = next_json(&mut rx).await;
        assert_eq!(forwarded["userId"], json!("u1"));
        assert_eq!(forwarded["prompt"], json!("expand into new markets"));
        assert!(forwarded["eventId"].is_string());
        assert!(forwarded["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_completion_billed_as_usage() {
        let relay = Relay::start().await;
        let mut rx = relay.observe(channels::USAGE_UPDATE_USAGE).await;

        relay
            .inject(
                "business-strategy.completed",
                json!({"userId": "u1", "tokensUsed": 42}),
            )
            .await;

        let usage = next_json(&mut rx).await;
        assert_eq!(usage["userId"], json!("u1"));
        assert_eq!(usage["agentType"], json!("business-strategy"));
        assert_eq!(usage["action"], json!("generate-strategy"));
        assert_eq!(usage["tokensUsed"], json!(42));
        assert!(usage["eventId"].is_string());
        assert!(usage["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_each_agent_bills_its_own_action() {
        let relay = Relay::start().await;
        let mut rx = relay.observe(channels::USAGE_UPDATE_USAGE).await;

        relay
            .inject(
                "asset-generator.completed",
                json!({"userId": "u2", "tokensUsed": 7}),
            )
            .await;

        let usage = next_json(&mut rx).await;
        assert_eq!(usage["agentType"], json!("asset-generator"));
        assert_eq!(usage["action"], json!("generate-asset"));
    }

    #[tokio::test]
    async fn test_agent_error_reaches_system_channel() {
        let relay = Relay::start().await;
        let mut rx = relay.observe(channels::SYSTEM_AGENT_ERROR).await;

        relay
            .inject(
                "business-strategy.error",
                json!({"userId": "u1", "error": "model timeout"}),
            )
            .await;

        let report = next_json(&mut rx).await;
        assert_eq!(report["agent"], json!("business-strategy"));
        assert_eq!(report["error"], json!("model timeout"));
        assert_eq!(report["userId"], json!("u1"));
    }

    #[tokio::test]
    async fn test_limit_breach_republished_for_operators() {
        let relay = Relay::start().await;
        let mut rx = relay.observe(channels::SYSTEM_USAGE_LIMIT_EXCEEDED).await;

        relay
            .inject(
                channels::USAGE_LIMIT_EXCEEDED,
                json!({"userId": "u1", "limit": 1000, "used": 1042}),
            )
            .await;

        let breach = next_json(&mut rx).await;
        assert_eq!(breach["userId"], json!("u1"));
        assert_eq!(breach["used"], json!(1042));
    }

    #[tokio::test]
    async fn test_user_lifecycle_tracked_as_activity() {
        let relay = Relay::start().await;
        let mut rx = relay.observe(channels::ANALYTICS_USER_ACTIVITY).await;

        relay.inject(channels::USER_LOGIN, json!({"userId": "u1"})).await;
        let login = next_json(&mut rx).await;
        assert_eq!(login["action"], json!("login"));
        assert_eq!(login["userId"], json!("u1"));

        relay.inject(channels::USER_LOGOUT, json!({"userId": "u1"})).await;
        let logout = next_json(&mut rx).await;
        assert_eq!(logout["action"], json!("logout"));
    }

    #[tokio::test]
    async fn test_subscription_change_forwarded_to_guardian() {
        let relay = Relay::start().await;
        let mut rx = relay.observe(channels::USAGE_SUBSCRIPTION_UPDATED).await;

        relay
            .inject(
                channels::USER_SUBSCRIPTION_CHANGED,
                json!({"userId": "u1", "tier": "pro"}),
            )
            .await;

        let update = next_json(&mut rx).await;
        assert_eq!(update["tier"], json!("pro"));
    }

    #[tokio::test]
    async fn test_health_check_answered_on_status_channel() {
        let relay = Relay::start().await;
        let mut rx = relay.observe(channels::SYSTEM_HEALTH_STATUS).await;

        relay.inject(channels::SYSTEM_HEALTH_CHECK, json!({})).await;

        let report = next_json(&mut rx).await;
        assert_eq!(report["databases"]["strategy"], json!("connected"));
        assert_eq!(report["manager"]["initialized"], json!(true));
        assert!(report["manager"]["channelCount"].as_u64().unwrap() > 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_event_ids_unique_across_many_publishes() {
        let relay = Relay::start().await;
        let mut rx = relay.observe("metrics.sample").await;

        const N: usize = 1000;
        for i in 0..N {
            relay
                .runtime
                .manager()
                .publish("metrics.sample", json!({"seq": i}))
                .await;
            // Let the wire drain between publishes.
            tokio::task::yield_now().await;
        }

        let mut ids = HashSet::new();
        for _ in 0..N {
            let value = next_json(&mut rx).await;
            let id = value["eventId"].as_str().expect("eventId").to_string();
            assert!(ids.insert(id), "duplicate eventId observed");
        }
        assert_eq!(ids.len(), N);
    }
}
