//! # Lifecycle Tests
//!
//! Startup sequencing, registry lifecycle semantics, subscription
//! replacement, and shutdown behavior of the assembled relay.

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::json;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    use connection_registry::{
        BackoffPolicy, ConnectionRegistry, DatabaseDriver, InMemoryDriver, ManagedConnection,
    };
    use event_bus::{BusBackend, EventBusTransport, InMemoryBusBackend};
    use event_manager::{EventHandler, EventManager, EventPublisher};
    use relay_runtime::RelayRuntime;
    use shared_types::{
        channels, BusConfig, DatabaseConfig, EventEnvelope, HandlerError, HealthStatus,
        ReadyState, RegistryError, RegistrySettings, RelayConfig,
    };

    fn db(name: &str) -> DatabaseConfig {
        DatabaseConfig {
            uri: format!("db://localhost/{name}"),
            name: name.to_string(),
        }
    }

    fn config(names: &[&str]) -> RelayConfig {
        let databases = names
            .iter()
            .map(|n| ((*n).to_string(), db(n)))
            .collect::<BTreeMap<_, _>>();
        RelayConfig {
            databases,
            registry: RegistrySettings::default(),
            bus: BusConfig::default(),
            agents: vec!["business-strategy".to_string()],
        }
    }

    // ---------------------------------------------------------------------
    // Registry lifecycle
    // ---------------------------------------------------------------------

    #[tokio::test]
    async fn test_connect_all_reports_every_service_connected() {
        let driver = Arc::new(InMemoryDriver::new());
        let registry = ConnectionRegistry::new(
            Arc::clone(&driver) as Arc<dyn DatabaseDriver>,
            RegistrySettings::default(),
        );
        let configs: BTreeMap<String, DatabaseConfig> = [
            ("strategy".to_string(), db("strategy")),
            ("assets".to_string(), db("assets")),
            ("growth".to_string(), db("growth")),
        ]
        .into();

        registry.connect_all(&configs).await.unwrap();

        let status = registry.status().await;
        assert_eq!(status.len(), 3);
        assert!(status.values().all(|s| *s == ReadyState::Connected));
    }

    #[tokio::test]
    async fn test_disconnect_of_never_connected_service_is_noop() {
        let registry = ConnectionRegistry::new(
            Arc::new(InMemoryDriver::new()) as Arc<dyn DatabaseDriver>,
            RegistrySettings::default(),
        );

        // No panic, no error surfaced, and the service stays unknown.
        registry.disconnect("assets").await;
        assert!(matches!(
            registry.get("assets").await,
            Err(RegistryError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_repeat_connect_reuses_live_connection() {
        let driver = Arc::new(InMemoryDriver::new());
        let registry = ConnectionRegistry::new(
            Arc::clone(&driver) as Arc<dyn DatabaseDriver>,
            RegistrySettings::default(),
        );

        let first = registry.connect("strategy", &db("strategy")).await.unwrap();
        let second = registry.connect("strategy", &db("strategy")).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(driver.connect_count("strategy"), 1);
    }

    #[tokio::test]
    async fn test_managed_connection_recovers_from_transient_outage() {
        let driver = Arc::new(InMemoryDriver::new());
        let conn = ManagedConnection::new(
            Arc::clone(&driver) as Arc<dyn DatabaseDriver>,
            "strategy",
            db("strategy"),
            RegistrySettings::default(),
            BackoffPolicy {
                base_delay: Duration::from_millis(5),
                max_retries: 5,
            },
        );
        conn.connect().await.unwrap();

        // One failed attempt, then the service comes back.
        driver.deny_service("strategy", "restarting");
        driver.link_for("strategy").unwrap().simulate_drop();
        tokio::time::sleep(Duration::from_millis(8)).await;
        driver.allow_service("strategy");

        timeout(Duration::from_secs(1), async {
            while !conn.ready_state().await.is_connected() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("should reconnect once the outage clears");
        assert!(!conn.is_permanently_failed());
    }

    // ---------------------------------------------------------------------
    // Subscription replacement
    // ---------------------------------------------------------------------

    struct TagHandler {
        tag: &'static str,
        hits: mpsc::UnboundedSender<&'static str>,
    }

    #[async_trait]
    impl EventHandler for TagHandler {
        fn name(&self) -> &'static str {
            "tag"
        }

        async fn handle(
            &self,
            _envelope: &EventEnvelope,
            _bus: &dyn EventPublisher,
        ) -> Result<(), HandlerError> {
            let _ = self.hits.send(self.tag);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_resubscribe_replaces_previous_handler() {
        let backend = Arc::new(InMemoryBusBackend::new());
        let transport = Arc::new(EventBusTransport::new(
            Arc::clone(&backend) as Arc<dyn BusBackend>,
            false,
        ));
        transport.connect().await.unwrap();
        let registry = Arc::new(ConnectionRegistry::new(
            Arc::new(InMemoryDriver::new()) as Arc<dyn DatabaseDriver>,
            RegistrySettings::default(),
        ));
        let manager = EventManager::new(Arc::clone(&transport), registry, vec![]);

        let (hits, mut rx) = mpsc::unbounded_channel();
        for tag in ["first", "second"] {
            manager
                .register(
                    "jobs.created",
                    Arc::new(TagHandler {
                        tag,
                        hits: hits.clone(),
                    }),
                )
                .await
                .unwrap();
        }

        manager.publish("jobs.created", json!({"id": 1})).await;

        let tag = timeout(Duration::from_millis(300), rx.recv())
            .await
            .expect("timeout")
            .expect("hit");
        assert_eq!(tag, "second");
        assert!(
            timeout(Duration::from_millis(150), rx.recv()).await.is_err(),
            "replaced handler must not fire"
        );
    }

    // ---------------------------------------------------------------------
    // Runtime startup and shutdown
    // ---------------------------------------------------------------------

    #[tokio::test]
    async fn test_startup_failure_propagates() {
        let driver = Arc::new(InMemoryDriver::new());
        driver.deny_service("assets", "refused");
        let runtime = RelayRuntime::build(
            config(&["strategy", "assets"]),
            Arc::clone(&driver) as Arc<dyn DatabaseDriver>,
            Arc::new(InMemoryBusBackend::new()),
        );

        assert!(runtime.start().await.is_err());
        assert!(!runtime.manager().status().initialized);
    }

    #[tokio::test]
    async fn test_full_cycle_start_to_shutdown() {
        let runtime = RelayRuntime::build(
            config(&["strategy", "assets"]),
            Arc::new(InMemoryDriver::new()) as Arc<dyn DatabaseDriver>,
            Arc::new(InMemoryBusBackend::new()),
        );
        runtime.start().await.unwrap();
        assert_eq!(
            runtime.facade().health_report().await.status,
            HealthStatus::Healthy
        );

        assert!(runtime.shutdown().await, "shutdown should settle in time");

        let report = runtime.facade().health_report().await;
        assert_eq!(report.status, HealthStatus::Unhealthy);
        assert!(report.databases.is_empty());
        assert!(!report.event_bus.transport.ready);
    }

    #[tokio::test]
    async fn test_graceful_shutdown_continues_past_failures() {
        let backend = Arc::new(InMemoryBusBackend::new());
        let runtime = RelayRuntime::build(
            config(&["strategy"]),
            Arc::new(InMemoryDriver::new()) as Arc<dyn DatabaseDriver>,
            Arc::clone(&backend) as Arc<dyn BusBackend>,
        );
        runtime.start().await.unwrap();
        backend.deny_unsubscribe(channels::USER_LOGIN);

        let outcomes = runtime.manager().graceful_shutdown().await;

        let (failed, ok): (Vec<_>, Vec<_>) = outcomes.iter().partition(|(_, r)| r.is_err());
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].0, channels::USER_LOGIN);
        assert!(!ok.is_empty());
        // The transport still came down.
        assert!(!runtime.manager().status().transport.ready);
    }
}
