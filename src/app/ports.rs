//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ GuardianService (domain)
//! ```
//!
//! Driven adapters (storage, event sinks, clocks, config files) implement
//! these traits.  The [`GuardianService`](super::service::GuardianService)
//! consumes them via generics, so the domain core never touches a socket,
//! a file or the system clock directly.
//!
//! ## Failure model
//!
//! - **StoragePort** writes are fire-and-forget from the core's point of
//!   view: an `Err` is logged by the caller and never rolls back the
//!   in-memory decision.
//! - **StatusQueryPort** reads may be slow; callers bound them with a
//!   timeout and degrade to a partial answer.

use core::future::Future;

use serde::{Deserialize, Serialize};

use super::events::{
    DecisionRecord, DeviceRecord, DeviceStatus, HistorySample, LogEvent, LogLevel,
};
use crate::config::GuardianConfig;
use crate::fsm::context::Timestamp;

// ───────────────────────────────────────────────────────────────
// Storage port (driven adapter: domain → audit store)
// ───────────────────────────────────────────────────────────────

/// Write side of the audit store.
pub trait StoragePort {
    /// Create the device record if missing, otherwise refresh its status
    /// and `last_seen`.
    fn upsert_device_status(
        &mut self,
        device_id: &str,
        status: DeviceStatus,
        now: Timestamp,
    ) -> Result<(), StorageError>;

    /// Flag (or clear) an action awaiting the device.
    fn set_pending_action(&mut self, device_id: &str, pending: bool) -> Result<(), StorageError>;

    fn append_log(
        &mut self,
        device_id: &str,
        level: LogLevel,
        message: &str,
        now: Timestamp,
    ) -> Result<(), StorageError>;

    fn append_decision(
        &mut self,
        device_id: &str,
        decision: &str,
        note: Option<&str>,
        now: Timestamp,
    ) -> Result<(), StorageError>;

    /// Mirror the most recent decision onto the device record.
    fn set_last_decision(&mut self, device_id: &str, decision: &str) -> Result<(), StorageError>;

    /// Append one timeline point; the store evicts the oldest beyond its cap.
    fn append_history_sample(&mut self, sample: HistorySample) -> Result<(), StorageError>;
}

// ───────────────────────────────────────────────────────────────
// Query port (driven adapter: audit store → status endpoint)
// ───────────────────────────────────────────────────────────────

/// Row limits for one aggregated status read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusLimits {
    /// Most recent log lines of any level.
    pub logs: usize,
    /// Most recent log lines excluding `DEBUG`.
    pub alerts: usize,
    /// Most recent history samples.
    pub history: usize,
}

/// Everything the full-status view reads from storage in one round-trip.
///
/// Every list is ordered most recent first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusBundle {
    pub devices: Vec<DeviceRecord>,
    pub logs: Vec<LogEvent>,
    pub alerts: Vec<LogEvent>,
    pub history: Vec<HistorySample>,
}

/// Filter for a log listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFilter {
    pub device_id: Option<String>,
    pub limit: usize,
    pub exclude_level: Option<LogLevel>,
}

/// Read side of the audit store.  Every list is ordered most recent first.
pub trait StatusQueryPort {
    fn status_bundle(
        &self,
        limits: StatusLimits,
    ) -> impl Future<Output = Result<StatusBundle, StorageError>>;

    fn logs(&self, filter: LogFilter) -> impl Future<Output = Result<Vec<LogEvent>, StorageError>>;

    fn decisions(
        &self,
        device_id: Option<String>,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<DecisionRecord>, StorageError>>;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → diagnostics)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Clock port
// ───────────────────────────────────────────────────────────────

/// Wall-clock source in milliseconds since the UNIX epoch.
pub trait ClockPort {
    fn now_ms(&self) -> Timestamp;
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists [`GuardianConfig`].
///
/// Invalid ranges are rejected with [`ConfigError::ValidationFailed`],
/// never silently clamped.
pub trait ConfigPort {
    /// Load configuration.  Returns [`GuardianConfig::default()`] when
    /// nothing is stored yet.
    fn load(&self) -> Result<GuardianConfig, ConfigError>;

    /// Validate and persist configuration.
    fn save(&self, config: &GuardianConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Scheduler delegate (decouples scheduler from the gateway)
// ───────────────────────────────────────────────────────────────

/// Callback trait that the scheduler invokes when a schedule fires.
pub trait SchedulerDelegate {
    /// * `label` - the human-readable label of the schedule that fired.
    /// * `timer` - which periodic driver it belongs to.
    fn on_schedule_fired(&mut self, label: &str, timer: TimerKind);
}

/// The periodic drivers ticking the controller state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Delayed-off countdown expiry check.
    Countdown,
    /// Report-silence check.
    Liveness,
    /// Label timeline sampler.
    HistorySample,
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug)]
pub enum ConfigError {
    /// Stored config failed to parse.
    Corrupted,
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// Generic I/O error from the backing file.
    IoError,
}

/// Errors from [`StoragePort`] and [`StatusQueryPort`] operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// The storage worker's request queue is full; the write was dropped.
    QueueFull,
    /// The storage worker is gone or did not answer.
    Unavailable,
    /// Journal read or write failed.
    IoError,
    /// A journal record failed to decode.
    Corrupted,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::QueueFull => write!(f, "storage queue full"),
            Self::Unavailable => write!(f, "storage unavailable"),
            Self::IoError => write!(f, "I/O error"),
            Self::Corrupted => write!(f, "journal corrupted"),
        }
    }
}

impl std::error::Error for ConfigError {}
impl std::error::Error for StorageError {}
