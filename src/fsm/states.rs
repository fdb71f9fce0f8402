//! Label descriptor table: how each label is announced when entered.
//!
//! ```text
//!                 report(motion)            countdown expired
//!   IDLE ───────────────────────▶ SOMEONE ──────┐
//!    ▲                              │           │
//!    │                     report(no motion)    │
//!    │                              ▼           │
//!    └──────[timer: remaining=0]── COUNTDOWN ◀──┘
//!
//!   keep_power ──▶ FORCED ──[absence, then presence]──▶ SOMEONE
//!   Any label ──[no report for > liveness threshold]──▶ OFFLINE
//! ```
//!
//! Entering a label writes exactly one audit log line at the level in
//! this table.  Staying in a label writes nothing.

use super::Label;
use crate::app::events::LogLevel;

/// Static descriptor for one label.
#[derive(Debug, Clone, Copy)]
pub struct LabelDescriptor {
    pub label: Label,
    /// Audit level used when the controller enters this label.
    pub level: LogLevel,
    /// Audit message used when the controller enters this label.
    pub message: &'static str,
}

/// Build the static descriptor table, indexed by `Label as usize`.
pub const fn build_label_table() -> [LabelDescriptor; Label::COUNT] {
    [
        // 0: Offline
        LabelDescriptor {
            label: Label::Offline,
            level: LogLevel::Error,
            message: "status update: device offline",
        },
        // 1: Someone
        LabelDescriptor {
            label: Label::Someone,
            level: LogLevel::Info,
            message: "status update: presence detected",
        },
        // 2: Forced
        LabelDescriptor {
            label: Label::Forced,
            level: LogLevel::Warn,
            message: "status update: forced on",
        },
        // 3: Countdown
        LabelDescriptor {
            label: Label::Countdown,
            level: LogLevel::Warn,
            message: "status update: light turning off soon",
        },
        // 4: Idle
        LabelDescriptor {
            label: Label::Idle,
            level: LogLevel::Info,
            message: "status update: nobody present, light off",
        },
    ]
}

const LABEL_TABLE: [LabelDescriptor; Label::COUNT] = build_label_table();

/// Descriptor for `label`.
pub fn descriptor(label: Label) -> &'static LabelDescriptor {
    &LABEL_TABLE[label as usize]
}
