//! Wall-clock adapter.
//!
//! Implements [`ClockPort`] from the system clock.  Timestamps are
//! milliseconds since the UNIX epoch, the same unit every stored record
//! and wire response carries.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::app::ports::ClockPort;
use crate::fsm::context::Timestamp;

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl SystemClock {
    pub fn new() -> Self {
        Self
    }
}

impl ClockPort for SystemClock {
    fn now_ms(&self) -> Timestamp {
        // A clock set before 1970 reads as the epoch.
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }
}
