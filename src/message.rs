//! Provider-agnostic message value and quality-of-service settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A message as seen by this layer: an opaque body plus transport headers.
///
/// The body encoding is the application's business; the template moves bytes.
/// `encode`/`decode` offer a compact binary codec for typed payloads.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Provider-assigned message id. `None` until the message has been sent,
    /// or permanently when id generation is suppressed.
    pub id: Option<String>,
    /// Send timestamp in milliseconds since the epoch; same suppression rule.
    pub timestamp: Option<u64>,
    /// Optional correlation id linking this message to another.
    pub correlation_id: Option<String>,
    /// Ordered application headers.
    pub properties: Vec<(String, String)>,
    /// Opaque payload.
    pub body: Vec<u8>,
}

impl Message {
    /// Create a message with a UTF-8 text body.
    pub fn text(body: impl Into<String>) -> Self {
        Self::bytes(body.into().into_bytes())
    }

    /// Create a message with a raw byte body.
    pub fn bytes(body: Vec<u8>) -> Self {
        Self {
            id: None,
            timestamp: None,
            correlation_id: None,
            properties: Vec::new(),
            body,
        }
    }

    /// Create a message with a bitcode-serialized payload.
    pub fn encode<T: Serialize>(payload: &T) -> Result<Self, bitcode::Error> {
        let body = bitcode::serialize(payload)?;
        Ok(Self::bytes(body))
    }

    /// Decode the body from bitcode binary format.
    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> Result<T, bitcode::Error> {
        bitcode::deserialize(&self.body)
    }

    /// Get the body as a string (if valid UTF-8).
    pub fn body_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }

    /// Set the correlation id.
    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    /// Add an application header.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.push((key.into(), value.into()));
        self
    }

    /// Look up an application header by key (first match wins).
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Whether the broker should persist the message before acknowledging the send.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeliveryMode {
    Persistent,
    NonPersistent,
}

/// Explicit quality-of-service parameters for sends.
///
/// Only applied when the template has explicit QoS enabled; otherwise the
/// provider's own defaults are used.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QosSettings {
    pub delivery_mode: DeliveryMode,
    /// 0 (lowest) to 9 (highest).
    pub priority: u8,
    /// `None` means the message never expires.
    pub time_to_live: Option<Duration>,
}

impl Default for QosSettings {
    fn default() -> Self {
        Self {
            delivery_mode: DeliveryMode::Persistent,
            priority: 4,
            time_to_live: None,
        }
    }
}

impl QosSettings {
    pub fn with_delivery_mode(mut self, mode: DeliveryMode) -> Self {
        self.delivery_mode = mode;
        self
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_time_to_live(mut self, ttl: Duration) -> Self {
        self.time_to_live = Some(ttl);
        self
    }
}
