//! Controller configuration parameters
//!
//! All tunable parameters for the guardian controller.
//! Values can be overridden from a JSON config file and a few environment
//! variables (see `main.rs`).

use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigError;

/// Core controller configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardianConfig {
    // --- Network ---
    /// Address the RPC listener binds to
    pub bind_address: String,
    /// TCP port the RPC listener binds to
    pub listen_port: u16,
    /// Largest inbound request frame accepted (bytes)
    pub max_request_frame: usize,

    // --- Identity ---
    /// Device id used when a report omits one, and for startup records
    pub device_id: String,

    // --- Storage ---
    /// Append-only journal file; `None` keeps storage in memory only
    pub journal_path: Option<String>,
    /// Audit log lines retained
    pub log_capacity: usize,
    /// Decision records retained
    pub decision_capacity: usize,
    /// History samples retained (28 800 = 24 h at 3 s)
    pub history_capacity: usize,

    // --- Decision engine ---
    /// Delayed-off countdown length (milliseconds)
    pub countdown_duration_ms: u64,
    /// Report silence after which the device is offline (milliseconds)
    pub liveness_timeout_ms: u64,

    // --- Timing ---
    /// Scheduler granularity (milliseconds)
    pub scheduler_tick_ms: u32,
    /// Countdown expiry check interval (milliseconds)
    pub countdown_check_interval_ms: u32,
    /// Liveness check interval (milliseconds)
    pub liveness_check_interval_ms: u32,
    /// History sampler interval (milliseconds)
    pub history_sample_interval_ms: u32,

    // --- Status reads ---
    /// Bound on the aggregated status read (milliseconds)
    pub status_timeout_ms: u64,
    /// Recent log lines in a full status read
    pub status_log_limit: usize,
    /// Recent non-DEBUG log lines in a full status read
    pub status_alert_limit: usize,
    /// History samples in a full status read
    pub status_history_limit: usize,
    /// Default row count of a log listing
    pub log_query_default_limit: usize,
    /// Default row count of a decision listing
    pub decision_query_default_limit: usize,
}

impl Default for GuardianConfig {
    fn default() -> Self {
        Self {
            // Network
            bind_address: "0.0.0.0".into(),
            listen_port: 5000,
            max_request_frame: 4096,

            // Identity
            device_id: "esp32_smart_guardian".into(),

            // Storage
            journal_path: None,
            log_capacity: 50_000,
            decision_capacity: 10_000,
            history_capacity: 28_800,

            // Decision engine
            countdown_duration_ms: 180_000, // 3 min
            liveness_timeout_ms: 60_000,    // 1 min

            // Timing
            scheduler_tick_ms: 100,
            countdown_check_interval_ms: 1_000,
            liveness_check_interval_ms: 5_000,
            history_sample_interval_ms: 3_000,

            // Status reads
            status_timeout_ms: 1_500,
            status_log_limit: 500,
            status_alert_limit: 100,
            status_history_limit: 28_800,
            log_query_default_limit: 20,
            decision_query_default_limit: 10,
        }
    }
}

impl GuardianConfig {
    /// Range-check every field.  Out-of-range values are rejected, never clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bind_address.is_empty() {
            return Err(ConfigError::ValidationFailed("bind_address must not be empty"));
        }
        if self.listen_port == 0 {
            return Err(ConfigError::ValidationFailed("listen_port must be 1-65535"));
        }
        if !(256..=1_048_576).contains(&self.max_request_frame) {
            return Err(ConfigError::ValidationFailed(
                "max_request_frame must be 256-1048576",
            ));
        }
        if self.device_id.is_empty() || self.device_id.len() > 64 {
            return Err(ConfigError::ValidationFailed(
                "device_id must be 1-64 bytes",
            ));
        }
        if self.journal_path.as_deref() == Some("") {
            return Err(ConfigError::ValidationFailed(
                "journal_path must not be empty when set",
            ));
        }
        if !(1..=1_000_000).contains(&self.log_capacity) {
            return Err(ConfigError::ValidationFailed("log_capacity must be 1-1000000"));
        }
        if !(1..=1_000_000).contains(&self.decision_capacity) {
            return Err(ConfigError::ValidationFailed(
                "decision_capacity must be 1-1000000",
            ));
        }
        if !(1..=1_000_000).contains(&self.history_capacity) {
            return Err(ConfigError::ValidationFailed(
                "history_capacity must be 1-1000000",
            ));
        }
        if !(1_000..=86_400_000).contains(&self.countdown_duration_ms) {
            return Err(ConfigError::ValidationFailed(
                "countdown_duration_ms must be 1000-86400000",
            ));
        }
        if !(1_000..=86_400_000).contains(&self.liveness_timeout_ms) {
            return Err(ConfigError::ValidationFailed(
                "liveness_timeout_ms must be 1000-86400000",
            ));
        }
        if !(10..=1_000).contains(&self.scheduler_tick_ms) {
            return Err(ConfigError::ValidationFailed(
                "scheduler_tick_ms must be 10-1000",
            ));
        }
        for interval in [
            self.countdown_check_interval_ms,
            self.liveness_check_interval_ms,
            self.history_sample_interval_ms,
        ] {
            if interval < self.scheduler_tick_ms || interval > 3_600_000 {
                return Err(ConfigError::ValidationFailed(
                    "timer intervals must be between scheduler_tick_ms and 3600000",
                ));
            }
        }
        if !(100..=60_000).contains(&self.status_timeout_ms) {
            return Err(ConfigError::ValidationFailed(
                "status_timeout_ms must be 100-60000",
            ));
        }
        if self.status_log_limit == 0 || self.status_log_limit > self.log_capacity {
            return Err(ConfigError::ValidationFailed(
                "status_log_limit must be 1-log_capacity",
            ));
        }
        if self.status_alert_limit == 0 || self.status_alert_limit > self.log_capacity {
            return Err(ConfigError::ValidationFailed(
                "status_alert_limit must be 1-log_capacity",
            ));
        }
        if self.status_history_limit == 0 || self.status_history_limit > self.history_capacity {
            return Err(ConfigError::ValidationFailed(
                "status_history_limit must be 1-history_capacity",
            ));
        }
        if self.log_query_default_limit == 0 || self.decision_query_default_limit == 0 {
            return Err(ConfigError::ValidationFailed(
                "default query limits must be positive",
            ));
        }
        Ok(())
    }
}
