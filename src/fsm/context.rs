//! Controller state record.
//!
//! `ControllerState` is the single struct the transition engine and the
//! timer drivers read from and write to.  It holds presence, relay,
//! countdown, forced-mode and liveness fields.  The derived label is
//! *not* stored here; see [`classify`](super::classify).

use serde::{Deserialize, Serialize};

use crate::app::commands::DeviceCommand;
use crate::app::mailbox::CommandMailbox;

/// Milliseconds since the UNIX epoch.
pub type Timestamp = u64;

// ---------------------------------------------------------------------------
// ControllerState
// ---------------------------------------------------------------------------

/// Presence, relay and liveness state for the one controlled device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerState {
    // -- Liveness --
    /// True iff a report arrived within the liveness window.
    pub connected: bool,
    /// Time of the last accepted report.
    pub last_update: Timestamp,

    // -- Presence --
    /// Latest presence reading.
    pub motion_detected: bool,
    /// Time presence last became true.
    pub last_motion_time: Timestamp,

    // -- Relay decision --
    /// Authoritative relay decision.  Never copied from device reports.
    pub relay_active: bool,

    // -- Delayed-off countdown --
    pub countdown_active: bool,
    pub countdown_start: Timestamp,
    /// Fixed countdown length in milliseconds.
    pub countdown_duration_ms: u64,

    // -- Outbound command --
    /// Single outstanding instruction for the device.
    pub pending_command: CommandMailbox,

    // -- Operator override --
    /// Relay held on regardless of presence.
    pub forced_mode: bool,
    /// Set when presence ends while forced; the next presence exits forced mode.
    pub forced_release_armed: bool,
}

impl ControllerState {
    /// Create a disconnected, quiescent state with the given countdown length.
    pub fn new(countdown_duration_ms: u64) -> Self {
        Self {
            countdown_duration_ms,
            ..Self::default()
        }
    }

    /// Milliseconds left on the delayed-off countdown.
    ///
    /// An inactive countdown reports the full duration.
    pub fn remaining_countdown_ms(&self, now: Timestamp) -> u64 {
        let elapsed = if self.countdown_active {
            now.saturating_sub(self.countdown_start)
        } else {
            0
        };
        self.countdown_duration_ms.saturating_sub(elapsed)
    }

    /// Begin the delayed-off countdown at `now`.
    pub fn start_countdown(&mut self, now: Timestamp) {
        self.countdown_active = true;
        self.countdown_start = now;
    }

    /// Overwrite the outstanding device instruction.
    pub fn queue(&mut self, command: DeviceCommand) {
        self.pending_command.post(command);
    }

    /// Leave forced mode and disarm its release flag.
    pub fn clear_forced(&mut self) {
        self.forced_mode = false;
        self.forced_release_armed = false;
    }
}
