//! Outbound application events and the records the core hands to storage.
//!
//! The [`GuardianService`](super::service::GuardianService) emits
//! [`AppEvent`]s through the [`EventSink`](super::ports::EventSink) port and
//! writes the audit records below through the
//! [`StoragePort`](super::ports::StoragePort).

use core::fmt;

use serde::{Deserialize, Serialize};

use super::commands::{DeviceCommand, OperatorCommand};
use crate::fsm::Label;
use crate::fsm::context::Timestamp;

// ───────────────────────────────────────────────────────────────
// Audit records
// ───────────────────────────────────────────────────────────────

/// Severity of a persisted audit log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line of the persisted audit log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEvent {
    pub device_id: String,
    pub level: LogLevel,
    pub message: String,
    pub timestamp: Timestamp,
}

/// An operator command as recorded in the decision trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub device_id: String,
    pub decision: String,
    pub note: Option<String>,
    pub timestamp: Timestamp,
}

/// One point of the label timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistorySample {
    pub timestamp: Timestamp,
    pub label: Label,
}

/// Coarse device status kept on the device record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceStatus {
    MotionDetected,
    Idle,
}

impl DeviceStatus {
    pub const fn from_motion(motion: bool) -> Self {
        if motion { Self::MotionDetected } else { Self::Idle }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MotionDetected => "motion_detected",
            Self::Idle => "idle",
        }
    }
}

/// Last-known snapshot of a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub device_id: String,
    pub status: DeviceStatus,
    pub last_seen: Timestamp,
    pub pending_action: bool,
    pub last_decision: Option<String>,
    pub created_time: Timestamp,
}

/// A presence report as accepted by the transition engine.
///
/// `relay_reported` is what the device *claims* its relay is doing; it is
/// logged and otherwise ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceReport {
    pub device_id: String,
    pub motion_detected: bool,
    pub relay_reported: bool,
}

// ───────────────────────────────────────────────────────────────
// Domain events
// ───────────────────────────────────────────────────────────────

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    /// The service has started (carries the initial label).
    Started(Label),

    /// A presence report was accepted.
    ReportReceived {
        motion: bool,
        relay_reported: bool,
    },

    /// The derived label changed.
    LabelChanged { from: Label, to: Label },

    /// An operator command was applied.
    CommandApplied(OperatorCommand),

    /// The delayed-off countdown ran out.
    CountdownExpired,

    /// No report arrived within the liveness window.
    DeviceOffline { silent_for_ms: u64 },

    /// A queued instruction was handed to the device.
    CommandDelivered(DeviceCommand),
}
