//! Application service: the hexagonal core.
//!
//! [`GuardianService`] owns the [`ControllerState`] and the last logged
//! label.  It exposes a transport-agnostic API: presence reports, operator
//! commands, the three periodic checks and the mailbox drain.  All I/O
//! flows through port traits injected at call sites, making the entire
//! service testable with mock adapters.
//!
//! ```text
//!   PresenceReport ──▶ ┌──────────────────────────┐ ──▶ EventSink
//!                      │     GuardianService      │
//!  OperatorCommand ──▶ │ transitions · classifier │ ──▶ StoragePort
//!                      └──────────────────────────┘
//! ```

use log::{info, warn};

use crate::config::GuardianConfig;
use crate::fsm::context::{ControllerState, Timestamp};
use crate::fsm::states::descriptor;
use crate::fsm::{Label, RelayMirror, classify};

use super::commands::{DeviceCommand, OperatorCommand, UnknownCommand};
use super::events::{AppEvent, DeviceStatus, HistorySample, LogLevel, PresenceReport};
use super::ports::{EventSink, StorageError, StoragePort};

// ───────────────────────────────────────────────────────────────
// GuardianService
// ───────────────────────────────────────────────────────────────

/// The application service orchestrates all decision logic.
pub struct GuardianService {
    state: ControllerState,
    /// Label at the time of the last transition log entry.
    last_label: Label,
    /// Identity used for timer-driven and command-driven audit entries.
    device_id: String,
    liveness_timeout_ms: u64,
}

impl GuardianService {
    /// Construct the service from configuration.  The device starts
    /// disconnected, so the initial label is `OFFLINE`.
    pub fn new(config: &GuardianConfig) -> Self {
        let state = ControllerState::new(config.countdown_duration_ms);
        let last_label = classify(&state);
        Self {
            state,
            last_label,
            device_id: config.device_id.clone(),
            liveness_timeout_ms: config.liveness_timeout_ms,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    pub fn start(&mut self, sink: &mut impl EventSink) {
        sink.emit(&AppEvent::Started(self.last_label));
        info!("GuardianService started in {}", self.last_label);
    }

    // ── Report ingestion ──────────────────────────────────────

    /// Apply one presence report from the device.
    ///
    /// The reported relay value is audit-only: `relay_active` stays the
    /// controller's own decision.
    pub fn apply_report(
        &mut self,
        report: &PresenceReport,
        now: Timestamp,
        store: &mut impl StoragePort,
        sink: &mut impl EventSink,
    ) {
        let s = &mut self.state;
        s.connected = true;
        s.last_update = now;

        if report.motion_detected != s.motion_detected {
            if report.motion_detected {
                self.on_presence(now);
            } else {
                self.on_absence(now);
            }
        }

        sink.emit(&AppEvent::ReportReceived {
            motion: report.motion_detected,
            relay_reported: report.relay_reported,
        });

        let id = report.device_id.as_str();
        let text = format!("device report: {} ({})", describe_report(report), id);
        persist(store.append_log(id, LogLevel::Debug, &text, now));
        persist(store.upsert_device_status(
            id,
            DeviceStatus::from_motion(report.motion_detected),
            now,
        ));
        if report.motion_detected {
            persist(store.set_pending_action(id, true));
        }

        self.relabel(id, now, store, sink);
    }

    /// Presence went false → true.
    fn on_presence(&mut self, now: Timestamp) {
        let s = &mut self.state;
        // An absence while forced armed the release; this presence ends it.
        if s.forced_mode && s.forced_release_armed {
            s.clear_forced();
        }
        s.motion_detected = true;
        s.last_motion_time = now;
        s.relay_active = true;
        s.countdown_active = false;
        s.queue(DeviceCommand::RelayOn);
    }

    /// Presence went true → false.
    fn on_absence(&mut self, now: Timestamp) {
        let s = &mut self.state;
        s.motion_detected = false;
        if s.forced_mode {
            s.forced_release_armed = true;
        } else if s.relay_active {
            s.start_countdown(now);
        } else {
            s.countdown_active = false;
        }
    }

    // ── Operator commands ─────────────────────────────────────

    /// Parse and apply an operator command by name.
    ///
    /// An unknown name is rejected before anything is touched.
    pub fn apply_command(
        &mut self,
        kind: &str,
        note: Option<&str>,
        now: Timestamp,
        store: &mut impl StoragePort,
        sink: &mut impl EventSink,
    ) -> Result<OperatorCommand, UnknownCommand> {
        let cmd: OperatorCommand = kind.parse()?;
        self.handle_command(cmd, note, now, store, sink);
        Ok(cmd)
    }

    /// Apply an already-parsed operator command.
    pub fn handle_command(
        &mut self,
        cmd: OperatorCommand,
        note: Option<&str>,
        now: Timestamp,
        store: &mut impl StoragePort,
        sink: &mut impl EventSink,
    ) {
        let s = &mut self.state;
        match cmd {
            OperatorCommand::KeepPower => {
                s.forced_mode = true;
                // Already empty: the next presence releases the override.
                s.forced_release_armed = !s.motion_detected;
                s.countdown_active = false;
                s.relay_active = true;
                s.queue(DeviceCommand::RelayOn);
            }
            OperatorCommand::CancelForced => {
                s.clear_forced();
                if s.motion_detected {
                    s.relay_active = true;
                    s.countdown_active = false;
                } else {
                    s.start_countdown(now);
                }
            }
            OperatorCommand::PowerOff => {
                s.clear_forced();
                s.countdown_active = false;
                s.relay_active = false;
                s.queue(DeviceCommand::RelayOff);
            }
            OperatorCommand::Reset => {
                s.motion_detected = false;
                s.relay_active = false;
                s.countdown_active = false;
                s.pending_command.clear();
                s.clear_forced();
            }
        }

        sink.emit(&AppEvent::CommandApplied(cmd));
        info!("command applied: {}", cmd);

        let id = self.device_id.clone();
        persist(store.append_decision(&id, cmd.as_str(), note, now));
        persist(store.set_last_decision(&id, cmd.as_str()));

        self.relabel(&id, now, store, sink);
    }

    // ── Timer drivers ─────────────────────────────────────────

    /// Countdown checker: switch the relay off once the countdown runs out.
    pub fn check_countdown(
        &mut self,
        now: Timestamp,
        store: &mut impl StoragePort,
        sink: &mut impl EventSink,
    ) {
        let s = &mut self.state;
        if s.countdown_active && s.remaining_countdown_ms(now) == 0 {
            s.countdown_active = false;
            s.relay_active = false;
            s.forced_mode = false;
            s.queue(DeviceCommand::RelayOff);
            sink.emit(&AppEvent::CountdownExpired);
        }
        let id = self.device_id.clone();
        self.relabel(&id, now, store, sink);
    }

    /// Liveness checker: mark the device offline after too long a silence.
    ///
    /// Relay and forced-mode fields are left as they were.
    pub fn check_liveness(
        &mut self,
        now: Timestamp,
        store: &mut impl StoragePort,
        sink: &mut impl EventSink,
    ) {
        let s = &mut self.state;
        let silent_for_ms = now.saturating_sub(s.last_update);
        if s.connected && silent_for_ms > self.liveness_timeout_ms {
            s.connected = false;
            s.countdown_active = false;
            s.pending_command.clear();
            sink.emit(&AppEvent::DeviceOffline { silent_for_ms });
        }
        let id = self.device_id.clone();
        self.relabel(&id, now, store, sink);
    }

    /// History sampler: append the current label to the timeline.
    pub fn sample_history(&self, now: Timestamp, store: &mut impl StoragePort) -> HistorySample {
        let sample = HistorySample {
            timestamp: now,
            label: classify(&self.state),
        };
        persist(store.append_history_sample(sample));
        sample
    }

    // ── Mailbox ───────────────────────────────────────────────

    /// Hand the pending instruction to the polling device, at most once.
    pub fn take_command(&mut self, sink: &mut impl EventSink) -> Option<DeviceCommand> {
        let cmd = self.state.pending_command.peek_and_clear();
        if let Some(cmd) = cmd {
            sink.emit(&AppEvent::CommandDelivered(cmd));
        }
        cmd
    }

    // ── Queries ───────────────────────────────────────────────

    /// Current derived label.
    pub fn label(&self) -> Label {
        classify(&self.state)
    }

    /// Minimal relay signal for the device.
    pub fn relay_mirror(&self) -> RelayMirror {
        self.label().relay_mirror()
    }

    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    pub fn remaining_countdown_ms(&self, now: Timestamp) -> u64 {
        self.state.remaining_countdown_ms(now)
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    // ── Internal ──────────────────────────────────────────────

    /// Re-derive the label and write one audit line if it changed.
    fn relabel(
        &mut self,
        device_id: &str,
        now: Timestamp,
        store: &mut impl StoragePort,
        sink: &mut impl EventSink,
    ) {
        let label = classify(&self.state);
        if label == self.last_label {
            return;
        }
        let from = self.last_label;
        self.last_label = label;

        let desc = descriptor(label);
        persist(store.append_log(device_id, desc.level, desc.message, now));
        sink.emit(&AppEvent::LabelChanged { from, to: label });
    }
}

/// Human-readable summary of a report for the DEBUG audit line.
fn describe_report(report: &PresenceReport) -> &'static str {
    match (report.motion_detected, report.relay_reported) {
        (true, _) => "someone present",
        (false, true) => "nobody present, light on",
        (false, false) => "nobody present, light off",
    }
}

/// Storage failures never reach the controller state.
fn persist(result: Result<(), StorageError>) {
    if let Err(e) = result {
        warn!("storage write dropped: {}", e);
    }
}
