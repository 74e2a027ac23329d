//! # Event Envelope
//!
//! The message unit flowing through the bus: an arbitrary JSON object payload
//! plus two system-injected fields, `timestamp` and `eventId`, assigned at
//! publish time. Envelopes are immutable once published; consumers always
//! receive a deserialized copy, never a reference to the wire bytes.
//!
//! ## Event Id Uniqueness
//!
//! `eventId` combines the current time at microsecond resolution with a
//! random UUIDv4 component. Collisions are negligible, not formally
//! impossible; nothing in the relay depends on more than that.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// A published message: payload fields plus injected `timestamp`/`eventId`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// ISO-8601 publish time, injected at publish.
    pub timestamp: String,

    /// Opaque unique token, injected at publish.
    #[serde(rename = "eventId")]
    pub event_id: String,

    /// The caller-supplied payload fields.
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl EventEnvelope {
    /// Wrap a payload, injecting `timestamp` and `eventId`.
    ///
    /// Object payloads keep their fields at the top level. A non-object
    /// payload (string, number, array) is carried under a `data` key so the
    /// envelope stays a flat JSON object on the wire.
    #[must_use]
    pub fn new(payload: Value) -> Self {
        let payload = match payload {
            Value::Object(map) => map,
            other => {
                let mut map = Map::new();
                map.insert("data".to_string(), other);
                map
            }
        };

        Self {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            event_id: next_event_id(),
            payload,
        }
    }

    /// Read a payload field.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }

    /// Read a payload field as a string slice.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(Value::as_str)
    }

    /// The full envelope as a JSON value (payload + injected fields).
    #[must_use]
    pub fn to_value(&self) -> Value {
        // Serializing a flattened struct cannot fail.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Generate the next event id: hex microseconds since epoch + UUIDv4.
#[must_use]
fn next_event_id() -> String {
    let micros = Utc::now().timestamp_micros();
    format!("{micros:x}-{}", Uuid::new_v4().simple())
}
