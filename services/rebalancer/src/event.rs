//! Inbound notification envelope and event decoding.
//!
//! The event bus wraps every container-instance state change in a common
//! envelope and carries the instance fields in `detail`. Depending on the
//! delivery path, `detail` arrives either as an embedded JSON object or as
//! a JSON-encoded string; both forms are accepted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Notification envelope delivered by the event bus.
#[derive(Debug, Clone, Deserialize)]
pub struct NotificationEnvelope {
    /// Delivery identifier, if the bus provides one.
    #[serde(default)]
    pub id: Option<String>,

    /// Human-readable event kind (e.g. "ECS Container Instance State Change").
    #[serde(rename = "detail-type", default)]
    pub detail_type: Option<String>,

    /// Emitting subsystem.
    #[serde(default)]
    pub source: Option<String>,

    /// When the state change occurred.
    #[serde(default)]
    pub time: Option<DateTime<Utc>>,

    /// Event payload; object or JSON-encoded string.
    #[serde(default)]
    pub detail: Value,
}

/// Decoded container-instance state-change event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceEvent {
    /// ARN of the container instance the event describes.
    pub container_instance_arn: String,

    /// Whether the instance's agent is reachable by the control plane.
    pub agent_connected: bool,
}

/// Errors produced while decoding the notification detail.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The detail payload is not valid structured data.
    #[error("event detail is not valid JSON: {0}")]
    Malformed(String),

    /// The detail payload is missing a required field.
    #[error("event detail is incomplete: {0}")]
    Incomplete(String),
}

impl NotificationEnvelope {
    /// Decode the `detail` payload into an [`InstanceEvent`].
    ///
    /// Field order is irrelevant and unknown fields are ignored; only the
    /// presence of the required fields matters.
    pub fn decode(&self) -> Result<InstanceEvent, DecodeError> {
        let detail = match &self.detail {
            Value::String(raw) => serde_json::from_str::<Value>(raw)
                .map_err(|e| DecodeError::Malformed(e.to_string()))?,
            other => other.clone(),
        };

        if !detail.is_object() {
            return Err(DecodeError::Malformed(
                "detail is not a JSON object".to_string(),
            ));
        }

        serde_json::from_value(detail).map_err(|e| DecodeError::Incomplete(e.to_string()))
    }
}
