//! JSON request/response payloads carried inside length-prefixed frames.
//!
//! Requests are tagged by `"op"`, responses by `"type"`:
//!
//! ```text
//! → {"op":"report","device_id":"node1","motion":true,"relay":false}
//! ← {"type":"ack","success":true,"message":null}
//!
//! → {"op":"poll"}
//! ← {"type":"command","device_id":"node1","command":"relay_on","timestamp":1700000000000}
//!
//! → {"op":"relay_state"}
//! ← {"type":"relay_state","value":"1"}
//! ```

use serde::{Deserialize, Deserializer, Serialize};

use crate::app::commands::DeviceCommand;
use crate::app::events::{DecisionRecord, DeviceRecord, HistorySample, LogEvent, LogLevel};
use crate::fsm::Label;
use crate::fsm::context::{ControllerState, Timestamp};

// ───────────────────────────────────────────────────────────────
// Requests
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    /// Presence report from the device.
    Report(ReportPayload),
    /// Device asks for its next instruction.
    Poll,
    /// Device asks for the minimal relay signal.
    RelayState,
    /// Operator override.
    Command {
        #[serde(default)]
        command: Option<String>,
        #[serde(default)]
        note: Option<String>,
    },
    /// Aggregated status for dashboards.
    FullStatus,
    /// Audit log listing.
    Logs {
        #[serde(default)]
        device_id: Option<String>,
        #[serde(default)]
        limit: Option<usize>,
        #[serde(default)]
        exclude_level: Option<LogLevel>,
    },
    /// Decision trail listing.
    Decisions {
        #[serde(default)]
        device_id: Option<String>,
        #[serde(default)]
        limit: Option<usize>,
    },
}

/// Raw report fields.  Every field is optional on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportPayload {
    /// Anything but a string reads as absent.
    #[serde(deserialize_with = "text_or_none")]
    pub device_id: Option<String>,
    #[serde(deserialize_with = "truthy")]
    pub motion: bool,
    #[serde(deserialize_with = "truthy")]
    pub relay: bool,
    /// Compact device code; overrides `motion`/`relay` when present.
    /// Non-integer or out-of-range values read as absent.
    #[serde(deserialize_with = "code_or_none")]
    pub situation: Option<u8>,
}

impl ReportPayload {
    /// Resolve `(motion, relay)` from the situation code or the flags.
    ///
    /// | situation | motion | relay |
    /// |-----------|--------|-------|
    /// | 1         | true   | true  |
    /// | 2         | false  | true  |
    /// | 3         | false  | false |
    pub fn resolve(&self) -> (bool, bool) {
        match self.situation {
            Some(1) => (true, true),
            Some(2) => (false, true),
            Some(3) => (false, false),
            _ => (self.motion, self.relay),
        }
    }
}

/// Accept `true`/`false`, numbers (non-zero is true), strings (non-empty
/// is true) and `null` (false) for device flags.
fn truthy<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    use serde_json::Value;
    Ok(match Value::deserialize(deserializer)? {
        Value::Bool(b) => b,
        Value::Number(n) => n.as_f64().is_some_and(|v| v != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Null => false,
        Value::Array(_) | Value::Object(_) => true,
    })
}

fn text_or_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde_json::Value;
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        _ => None,
    })
}

fn code_or_none<'de, D>(deserializer: D) -> Result<Option<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde_json::Value;
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_u64().and_then(|v| u8::try_from(v).ok()),
        _ => None,
    })
}

// ───────────────────────────────────────────────────────────────
// Responses
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    Ack {
        success: bool,
        message: Option<String>,
    },
    Command {
        device_id: String,
        command: Option<DeviceCommand>,
        timestamp: Timestamp,
    },
    RelayState {
        value: String,
    },
    FullStatus(FullStatus),
    Logs {
        logs: Vec<LogEvent>,
    },
    Decisions {
        decisions: Vec<DecisionRecord>,
    },
    Error {
        message: String,
    },
}

impl Response {
    pub fn ok(message: Option<String>) -> Self {
        Self::Ack {
            success: true,
            message,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}

/// Everything a dashboard needs in one response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FullStatus {
    pub status: ControllerState,
    pub label: Label,
    pub remaining_time_ms: u64,
    pub devices: Vec<DeviceRecord>,
    /// Recent log lines of every level.
    pub logs: Vec<LogEvent>,
    /// Recent log lines excluding `DEBUG`.
    pub info_logs: Vec<LogEvent>,
    pub history: Vec<HistorySample>,
    /// True when storage did not answer and only live state is included.
    pub degraded: bool,
}
