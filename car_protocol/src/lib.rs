mod catalog;

pub use catalog::{operation_id, ACTIONS};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EnvelopeKind {
    Control,
}

/// One user command on the wire. Field order matches what the vehicle
/// controller expects: `type, action, deviceId, operationId, timestamp`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CommandEnvelope {
    #[serde(rename = "type")]
    pub kind: EnvelopeKind,
    pub action: String,
    pub device_id: u32,
    pub operation_id: u32,
    pub timestamp: String,
}

impl CommandEnvelope {
    pub fn control(action: &str, device_id: u32, operation_id: u32, at: DateTime<Utc>) -> Self {
        Self {
            kind: EnvelopeKind::Control,
            action: action.to_string(),
            device_id,
            operation_id,
            timestamp: iso_timestamp(at),
        }
    }
}

/// `2024-05-01T10:20:30.123Z`, the same shape a browser's `toISOString` emits.
pub fn iso_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum ServerMessage {
    ControlResponse {
        #[serde(default)]
        message: Option<String>,
        #[serde(default)]
        action: Option<String>,
    },
    Error {
        #[serde(default)]
        message: Option<String>,
    },
    Connection {
        #[serde(default)]
        message: Option<String>,
    },
    Pong {
        #[serde(default)]
        message: Option<String>,
    },
    #[serde(other)]
    Unknown,
}
