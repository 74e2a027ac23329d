//! # Handler Capability Traits
//!
//! A choreography handler is a pure mapping from an inbound envelope plus a
//! publish capability to an outcome. Handlers never see the transport, the
//! wire codec, or the subscription bookkeeping, which keeps every mapping
//! testable with a stub publisher and no live bus.

use async_trait::async_trait;
use serde_json::Value;

use shared_types::{EventEnvelope, HandlerError};

/// The publish capability handed to handlers.
///
/// Fire-and-forget: implementations log failures instead of returning them,
/// so a dead bus degrades choreography without crashing it.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish `payload` on `channel`, injecting envelope fields.
    async fn emit(&self, channel: &str, payload: Value);
}

/// One channel's choreography mapping.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Stable name for logs.
    fn name(&self) -> &'static str;

    /// React to one inbound envelope.
    ///
    /// Errors are caught and logged at the dispatch boundary; they never
    /// propagate into the dispatch loop.
    async fn handle(
        &self,
        envelope: &EventEnvelope,
        bus: &dyn EventPublisher,
    ) -> Result<(), HandlerError>;
}
