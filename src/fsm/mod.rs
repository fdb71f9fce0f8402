//! Derived operational label, the coarse state used for logging and history.
//!
//! The controller never stores a label as primary state.  Every consumer
//! (transition logger, history sampler, relay mirror, status endpoint)
//! calls [`classify`] on the live [`ControllerState`]:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  classify(&ControllerState)        first match wins      │
//! │  ┌───┬──────────────────────────────────┬─────────────┐  │
//! │  │ 1 │ !connected                       │ Offline     │  │
//! │  │ 2 │ motion_detected                  │ Someone     │  │
//! │  │ 3 │ forced_mode                      │ Forced      │  │
//! │  │ 4 │ relay_active && countdown_active │ Countdown   │  │
//! │  │ 5 │ otherwise                        │ Idle        │  │
//! │  └───┴──────────────────────────────────┴─────────────┘  │
//! └──────────────────────────────────────────────────────────┘
//! ```

pub mod context;
pub mod states;

use core::fmt;

use context::ControllerState;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Label identity
// ---------------------------------------------------------------------------

/// Enumeration of all derived labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
#[repr(u8)]
pub enum Label {
    Offline = 0,
    Someone = 1,
    Forced = 2,
    Countdown = 3,
    Idle = 4,
}

impl Label {
    /// Total number of labels.
    pub const COUNT: usize = 5;

    /// Every label, in classifier priority order.
    pub const ALL: [Label; Label::COUNT] = [
        Label::Offline,
        Label::Someone,
        Label::Forced,
        Label::Countdown,
        Label::Idle,
    ];

    /// Canonical upper-case key used on the wire and in the history table.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Offline => "OFFLINE",
            Self::Someone => "SOMEONE",
            Self::Forced => "FORCED",
            Self::Countdown => "COUNTDOWN",
            Self::Idle => "IDLE",
        }
    }

    /// The two-valued relay mirror: only `Idle` reads as "off".
    pub const fn relay_mirror(self) -> RelayMirror {
        match self {
            Self::Idle => RelayMirror::Off,
            _ => RelayMirror::On,
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Minimal relay signal served to the device ("0" / "1").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayMirror {
    Off,
    On,
}

impl RelayMirror {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Off => "0",
            Self::On => "1",
        }
    }
}

// ---------------------------------------------------------------------------
// Classifier
// ---------------------------------------------------------------------------

/// Map the controller state to its label.
///
/// Pure and total: the same state always yields the same label.
pub fn classify(state: &ControllerState) -> Label {
    if !state.connected {
        Label::Offline
    } else if state.motion_detected {
        Label::Someone
    } else if state.forced_mode {
        Label::Forced
    } else if state.relay_active && state.countdown_active {
        Label::Countdown
    } else {
        Label::Idle
    }
}
