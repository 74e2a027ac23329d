//! # Channel Names
//!
//! The fixed pub/sub topic vocabulary of the relay. Per-agent channels are
//! derived from the configured agent list (`<agent>.request` and friends);
//! everything else is a fixed name.
//!
//! Keeping every channel name in one module means the choreography catalogue
//! in `event-manager` and the tests agree on a single spelling.

/// Usage guardian: quota check requests from the HTTP layer.
pub const USAGE_CHECK: &str = "usage-guardian.check";

/// Usage guardian: internal forwarding target for quota checks.
pub const INTERNAL_USAGE_CHECK: &str = "internal.usage-guardian.check";

/// Usage guardian: a user exceeded a usage limit.
pub const USAGE_LIMIT_EXCEEDED: &str = "usage-guardian.limit-exceeded";

/// Usage guardian: usage counters were updated.
pub const USAGE_UPDATED: &str = "usage-guardian.usage-updated";

/// Usage guardian: command channel for recording consumed usage.
pub const USAGE_UPDATE_USAGE: &str = "usage-guardian.update-usage";

/// Usage guardian: a user's subscription tier changed.
pub const USAGE_SUBSCRIPTION_UPDATED: &str = "usage-guardian.subscription-updated";

/// System: health probe request.
pub const SYSTEM_HEALTH_CHECK: &str = "system.health-check";

/// System: aggregate health response.
pub const SYSTEM_HEALTH_STATUS: &str = "system.health-status";

/// System: an agent handler reported an error.
pub const SYSTEM_AGENT_ERROR: &str = "system.agent-error";

/// System: usage-limit breach, re-published for operators.
pub const SYSTEM_USAGE_LIMIT_EXCEEDED: &str = "system.usage-limit-exceeded";

/// System: graceful-shutdown trigger.
pub const SYSTEM_SHUTDOWN: &str = "system.shutdown";

/// User lifecycle: login.
pub const USER_LOGIN: &str = "user.login";

/// User lifecycle: logout.
pub const USER_LOGOUT: &str = "user.logout";

/// User lifecycle: subscription tier changed.
pub const USER_SUBSCRIPTION_CHANGED: &str = "user.subscription-changed";

/// Analytics: user activity sink.
pub const ANALYTICS_USER_ACTIVITY: &str = "analytics.user-activity";

/// Inbound request channel for an agent.
#[must_use]
pub fn agent_request(agent: &str) -> String {
    format!("{agent}.request")
}

/// Completion channel for an agent.
#[must_use]
pub fn agent_completed(agent: &str) -> String {
    format!("{agent}.completed")
}

/// Error channel for an agent.
#[must_use]
pub fn agent_error(agent: &str) -> String {
    format!("{agent}.error")
}

/// Internal processing channel an agent's requests are forwarded to.
#[must_use]
pub fn internal_process(agent: &str) -> String {
    format!("internal.{agent}.process")
}

/// The action an agent's completion is billed under.
///
/// Completions may carry an explicit `action` field; this is the fallback
/// mapping for the known agent set when they do not.
#[must_use]
pub fn default_action(agent: &str) -> String {
    match agent {
        "business-strategy" => "generate-strategy".to_string(),
        "asset-generator" => "generate-asset".to_string(),
        "growth-advisor" => "generate-advice".to_string(),
        other => format!("run-{other}"),
    }
}
