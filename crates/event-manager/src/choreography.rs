//! # Choreography Catalogue
//!
//! The fixed channel-to-handler table. Per-agent channels are derived from
//! the configured agent list; everything else is a constant. The catalogue
//! is data, not behavior: [`catalogue`] builds the full table and the
//! manager binds it, one handler per channel.
//!
//! ```text
//!   <agent>.request ───────────────▶ internal.<agent>.process
//!   <agent>.completed ─────────────▶ usage-guardian.update-usage
//!   <agent>.error ─────────────────▶ system.agent-error
//!   usage-guardian.check ──────────▶ internal.usage-guardian.check
//!   usage-guardian.limit-exceeded ─▶ system.usage-limit-exceeded (+ warn)
//!   usage-guardian.usage-updated ──▶ (record only)
//!   system.health-check ───────────▶ system.health-status
//!   system.shutdown ───────────────▶ graceful-shutdown trigger
//!   user.login / user.logout ──────▶ analytics.user-activity
//!   user.subscription-changed ─────▶ usage-guardian.subscription-updated
//! ```

use std::sync::{Arc, Weak};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use connection_registry::ConnectionRegistry;
use shared_types::{channels, EventEnvelope, HandlerError};

use crate::handler::{EventHandler, EventPublisher};
use crate::manager::EventManager;

/// The payload fields of an envelope as a JSON object, injected fields
/// excluded. Forwarded messages get a fresh timestamp and eventId at their
/// own publish.
fn payload_of(envelope: &EventEnvelope) -> Value {
    Value::Object(envelope.payload.clone())
}

/// Forwards the payload unchanged to a fixed target channel.
pub struct ForwardHandler {
    name: &'static str,
    target: String,
}

impl ForwardHandler {
    #[must_use]
    pub fn new(name: &'static str, target: impl Into<String>) -> Self {
        Self {
            name,
            target: target.into(),
        }
    }
}

#[async_trait]
impl EventHandler for ForwardHandler {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn handle(
        &self,
        envelope: &EventEnvelope,
        bus: &dyn EventPublisher,
    ) -> Result<(), HandlerError> {
        bus.emit(&self.target, payload_of(envelope)).await;
        Ok(())
    }
}

/// Maps an agent completion to a usage-recording command.
///
/// Carries the completion's own fields (`userId`, metrics such as
/// `tokensUsed`) and adds `agentType` plus the billed `action`, taken from
/// the payload when present and derived from the agent name otherwise.
pub struct CompletedHandler {
    agent: String,
}

impl CompletedHandler {
    #[must_use]
    pub fn new(agent: impl Into<String>) -> Self {
        Self {
            agent: agent.into(),
        }
    }
}

#[async_trait]
impl EventHandler for CompletedHandler {
    fn name(&self) -> &'static str {
        "agent-completed"
    }

    async fn handle(
        &self,
        envelope: &EventEnvelope,
        bus: &dyn EventPublisher,
    ) -> Result<(), HandlerError> {
        if envelope.get_str("userId").is_none() {
            return Err(HandlerError::MissingField("userId".to_string()));
        }

        let action = envelope
            .get_str("action")
            .map(str::to_string)
            .unwrap_or_else(|| channels::default_action(&self.agent));

        let mut usage = envelope.payload.clone();
        usage.insert("agentType".to_string(), json!(self.agent));
        usage.insert("action".to_string(), json!(action));

        bus.emit(channels::USAGE_UPDATE_USAGE, Value::Object(usage))
            .await;
        Ok(())
    }
}

/// Maps an agent error to the system error channel.
pub struct AgentErrorHandler {
    agent: String,
}

impl AgentErrorHandler {
    #[must_use]
    pub fn new(agent: impl Into<String>) -> Self {
        Self {
            agent: agent.into(),
        }
    }
}

#[async_trait]
impl EventHandler for AgentErrorHandler {
    fn name(&self) -> &'static str {
        "agent-error"
    }

    async fn handle(
        &self,
        envelope: &EventEnvelope,
        bus: &dyn EventPublisher,
    ) -> Result<(), HandlerError> {
        let error = envelope.get("error").cloned().unwrap_or(Value::Null);
        let user_id = envelope.get("userId").cloned().unwrap_or(Value::Null);
        warn!(agent = %self.agent, error = %error, "[manager] Agent reported an error");

        bus.emit(
            channels::SYSTEM_AGENT_ERROR,
            json!({
                "agent": self.agent,
                "error": error,
                "userId": user_id,
            }),
        )
        .await;
        Ok(())
    }
}

/// Records a usage-limit breach and re-publishes it for operators.
pub struct LimitExceededHandler;

#[async_trait]
impl EventHandler for LimitExceededHandler {
    fn name(&self) -> &'static str {
        "limit-exceeded"
    }

    async fn handle(
        &self,
        envelope: &EventEnvelope,
        bus: &dyn EventPublisher,
    ) -> Result<(), HandlerError> {
        // Security-relevant, so warn level regardless of filter defaults.
        warn!(
            user_id = envelope.get_str("userId").unwrap_or("unknown"),
            "[manager] Usage limit exceeded"
        );
        bus.emit(channels::SYSTEM_USAGE_LIMIT_EXCEEDED, payload_of(envelope))
            .await;
        Ok(())
    }
}

/// Record-only sink for usage counter updates.
pub struct UsageUpdatedHandler;

#[async_trait]
impl EventHandler for UsageUpdatedHandler {
    fn name(&self) -> &'static str {
        "usage-updated"
    }

    async fn handle(
        &self,
        envelope: &EventEnvelope,
        _bus: &dyn EventPublisher,
    ) -> Result<(), HandlerError> {
        debug!(
            user_id = envelope.get_str("userId").unwrap_or("unknown"),
            "[manager] Usage counters updated"
        );
        Ok(())
    }
}

/// Answers health probes with an aggregate document.
pub struct HealthCheckHandler {
    registry: Arc<ConnectionRegistry>,
    manager: Weak<EventManager>,
}

impl HealthCheckHandler {
    #[must_use]
    pub fn new(registry: Arc<ConnectionRegistry>, manager: Weak<EventManager>) -> Self {
        Self { registry, manager }
    }
}

#[async_trait]
impl EventHandler for HealthCheckHandler {
    fn name(&self) -> &'static str {
        "health-check"
    }

    async fn handle(
        &self,
        _envelope: &EventEnvelope,
        bus: &dyn EventPublisher,
    ) -> Result<(), HandlerError> {
        let databases = self.registry.status().await;
        let manager = match self.manager.upgrade() {
            Some(m) => serde_json::to_value(m.status())
                .map_err(|e| HandlerError::Derivation(e.to_string()))?,
            None => Value::Null,
        };

        let report = json!({
            "databases": databases,
            "manager": manager,
        });
        bus.emit(channels::SYSTEM_HEALTH_STATUS, report).await;
        Ok(())
    }
}

/// Triggers the graceful-shutdown sequence.
pub struct ShutdownHandler {
    trigger: watch::Sender<bool>,
}

impl ShutdownHandler {
    #[must_use]
    pub fn new(trigger: watch::Sender<bool>) -> Self {
        Self { trigger }
    }
}

#[async_trait]
impl EventHandler for ShutdownHandler {
    fn name(&self) -> &'static str {
        "shutdown"
    }

    async fn handle(
        &self,
        _envelope: &EventEnvelope,
        _bus: &dyn EventPublisher,
    ) -> Result<(), HandlerError> {
        info!("[manager] Shutdown event received, signalling runtime");
        let _ = self.trigger.send(true);
        Ok(())
    }
}

/// Maps user lifecycle events to the analytics activity sink.
pub struct UserActivityHandler {
    activity: &'static str,
}

impl UserActivityHandler {
    #[must_use]
    pub fn new(activity: &'static str) -> Self {
        Self { activity }
    }
}

#[async_trait]
impl EventHandler for UserActivityHandler {
    fn name(&self) -> &'static str {
        "user-activity"
    }

    async fn handle(
        &self,
        envelope: &EventEnvelope,
        bus: &dyn EventPublisher,
    ) -> Result<(), HandlerError> {
        let user_id = envelope
            .get_str("userId")
            .ok_or_else(|| HandlerError::MissingField("userId".to_string()))?;

        bus.emit(
            channels::ANALYTICS_USER_ACTIVITY,
            json!({
                "userId": user_id,
                "action": self.activity,
            }),
        )
        .await;
        Ok(())
    }
}

/// Build the full channel-to-handler table for a configured agent list.
#[must_use]
pub fn catalogue(
    agents: &[String],
    registry: &Arc<ConnectionRegistry>,
    manager: &Weak<EventManager>,
    shutdown: watch::Sender<bool>,
) -> Vec<(String, Arc<dyn EventHandler>)> {
    let mut table: Vec<(String, Arc<dyn EventHandler>)> = Vec::new();

    for agent in agents {
        table.push((
            channels::agent_request(agent),
            Arc::new(ForwardHandler::new(
                "agent-request",
                channels::internal_process(agent),
            )),
        ));
        table.push((
            channels::agent_completed(agent),
            Arc::new(CompletedHandler::new(agent.as_str())),
        ));
        table.push((
            channels::agent_error(agent),
            Arc::new(AgentErrorHandler::new(agent.as_str())),
        ));
    }

    table.push((
        channels::USAGE_CHECK.to_string(),
        Arc::new(ForwardHandler::new(
            "usage-check",
            channels::INTERNAL_USAGE_CHECK,
        )),
    ));
    table.push((
        channels::USAGE_LIMIT_EXCEEDED.to_string(),
        Arc::new(LimitExceededHandler),
    ));
    table.push((
        channels::USAGE_UPDATED.to_string(),
        Arc::new(UsageUpdatedHandler),
    ));
    table.push((
        channels::SYSTEM_HEALTH_CHECK.to_string(),
        Arc::new(HealthCheckHandler::new(Arc::clone(registry), manager.clone())),
    ));
    table.push((
        channels::SYSTEM_SHUTDOWN.to_string(),
        Arc::new(ShutdownHandler::new(shutdown)),
    ));
    table.push((
        channels::USER_LOGIN.to_string(),
        Arc::new(UserActivityHandler::new("login")),
    ));
    table.push((
        channels::USER_LOGOUT.to_string(),
        Arc::new(UserActivityHandler::new("logout")),
    ));
    table.push((
        channels::USER_SUBSCRIPTION_CHANGED.to_string(),
        Arc::new(ForwardHandler::new(
            "subscription-changed",
            channels::USAGE_SUBSCRIPTION_UPDATED,
        )),
    ));

    table
}
