//! Timer/scheduler engine.
//!
//! Drives the periodic checks that tick the controller state between
//! reports.  The scheduler notifies a [`SchedulerDelegate`] when a
//! schedule fires; the gateway implements the delegate and routes each
//! fire through the same mutation path as reports and commands.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     Periodic schedules                       │
//! │                                                              │
//! │   ┌────────────┐      ┌────────────┐      ┌────────────┐     │
//! │   │ countdown  │      │  liveness  │      │  history   │     │
//! │   │   1 s      │      │    5 s     │      │    3 s     │     │
//! │   └─────┬──────┘      └─────┬──────┘      └─────┬──────┘     │
//! │         ▼                   ▼                   ▼            │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │              SchedulerDelegate (Gateway)               │  │
//! │  └───────────────────────┬────────────────────────────────┘  │
//! │                          ▼                                   │
//! │      GuardianService.check_countdown / check_liveness /      │
//! │                      sample_history                          │
//! └──────────────────────────────────────────────────────────────┘
//! ```

use crate::app::ports::{SchedulerDelegate, TimerKind};
use crate::config::GuardianConfig;
use log::{debug, info, warn};

// ═══════════════════════════════════════════════════════════════
//  Schedule types
// ═══════════════════════════════════════════════════════════════

/// A single periodic schedule entry.
#[derive(Debug, Clone)]
pub struct Schedule {
    /// Human-readable label (e.g., "liveness").
    pub label: &'static str,
    /// Which driver this schedule belongs to.
    pub timer: TimerKind,
    /// Fire every `interval_ms` milliseconds.
    pub interval_ms: u32,
    /// Whether this schedule is currently enabled.
    pub enabled: bool,
}

// ═══════════════════════════════════════════════════════════════
//  Scheduler engine
// ═══════════════════════════════════════════════════════════════

/// Maximum number of concurrent schedules (stack-allocated).
const MAX_SCHEDULES: usize = 4;

/// The scheduler engine.
///
/// Decoupled from the gateway: when a schedule fires, it invokes the
/// [`SchedulerDelegate`] callback, which makes the scheduler testable
/// with a recording delegate and a synthetic clock.
pub struct Scheduler {
    schedules: heapless::Vec<ScheduleEntry, MAX_SCHEDULES>,
    /// Global enable flag.
    enabled: bool,
}

/// Internal bookkeeping for a live schedule.
#[derive(Debug, Clone)]
struct ScheduleEntry {
    schedule: Schedule,
    /// Milliseconds accumulated since the last fire.
    elapsed_ms: u64,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            schedules: heapless::Vec::new(),
            enabled: true,
        }
    }

    /// Scheduler preloaded with the three controller checks.
    pub fn from_config(config: &GuardianConfig) -> Self {
        let mut sched = Self::new();
        for (label, timer, interval_ms) in [
            ("countdown", TimerKind::Countdown, config.countdown_check_interval_ms),
            ("liveness", TimerKind::Liveness, config.liveness_check_interval_ms),
            ("history", TimerKind::HistorySample, config.history_sample_interval_ms),
        ] {
            if sched
                .add(Schedule {
                    label,
                    timer,
                    interval_ms,
                    enabled: true,
                })
                .is_none()
            {
                warn!("Scheduler: no slot left for '{}', check disabled", label);
            }
        }
        sched
    }

    /// Add a schedule.  Returns the slot index, or `None` if full.
    pub fn add(&mut self, schedule: Schedule) -> Option<usize> {
        let label = schedule.label;
        let interval_ms = schedule.interval_ms;
        self.schedules
            .push(ScheduleEntry {
                schedule,
                elapsed_ms: 0,
            })
            .ok()?;
        let slot = self.schedules.len() - 1;
        info!("Scheduler: added '{}' every {}ms at slot {}", label, interval_ms, slot);
        Some(slot)
    }

    /// Enable or disable the entire scheduler.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Advance every schedule by `elapsed_ms`.
    ///
    /// A schedule fires at most once per call; if the caller was late by
    /// more than a whole interval the missed fires are collapsed and the
    /// remainder carried over.
    pub fn tick(&mut self, elapsed_ms: u64, delegate: &mut dyn SchedulerDelegate) {
        if !self.enabled {
            return;
        }

        for entry in self.schedules.iter_mut() {
            if !entry.schedule.enabled {
                continue;
            }
            let interval = u64::from(entry.schedule.interval_ms.max(1));
            entry.elapsed_ms += elapsed_ms;
            if entry.elapsed_ms >= interval {
                debug!("Scheduler: '{}' fired", entry.schedule.label);
                delegate.on_schedule_fired(entry.schedule.label, entry.schedule.timer);
                entry.elapsed_ms %= interval;
            }
        }
    }

    /// Number of active (enabled) schedules.
    pub fn active_count(&self) -> usize {
        self.schedules.iter().filter(|e| e.schedule.enabled).count()
    }
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════
