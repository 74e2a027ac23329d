//! # Wire Codec
//!
//! Bus messages travel as UTF-8 text. Structured payloads use canonical JSON;
//! plain string payloads pass through unchanged. Decoding is best-effort:
//! text that fails to parse as JSON is handed to the subscriber raw rather
//! than dropped or turned into an error.

use serde_json::Value;

use shared_types::BusError;

/// A payload on its way to or from the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum WirePayload {
    /// A structured payload (serialized to canonical JSON text on send).
    Json(Value),
    /// An opaque string (passed through unchanged).
    Raw(String),
}

impl WirePayload {
    /// Encode for the wire.
    ///
    /// # Errors
    ///
    /// `BusError::Serialization` if the JSON value cannot be rendered
    /// (non-string map keys and the like).
    pub fn encode(&self) -> Result<String, BusError> {
        match self {
            Self::Json(value) => {
                serde_json::to_string(value).map_err(|e| BusError::Serialization(e.to_string()))
            }
            Self::Raw(text) => Ok(text.clone()),
        }
    }

    /// Decode inbound wire text.
    ///
    /// JSON parses to `Json`; anything else degrades to `Raw`, since
    /// malformed messages must never crash dispatch.
    #[must_use]
    pub fn decode(text: &str) -> Self {
        match serde_json::from_str::<Value>(text) {
            Ok(value) => Self::Json(value),
            Err(_) => Self::Raw(text.to_string()),
        }
    }

    /// The payload as a JSON value, if structured.
    #[must_use]
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            Self::Raw(_) => None,
        }
    }
}

impl From<Value> for WirePayload {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

impl From<&str> for WirePayload {
    fn from(text: &str) -> Self {
        Self::Raw(text.to_string())
    }
}

/// A decoded message delivered to a channel listener.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    /// The channel the message arrived on.
    pub channel: String,
    /// The decoded payload.
    pub payload: WirePayload,
}
