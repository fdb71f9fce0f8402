//! Single mutation gateway.
//!
//! Every change to the controller state (reports, operator commands,
//! timer fires, mailbox drains) goes through one [`Gateway`], which
//! stamps it with the clock and hands the service its ports.  The I/O
//! runtime keeps the gateway in an `Rc<RefCell<_>>` and never holds the
//! borrow across an `.await`, so each call is atomic with respect to the
//! others.

use log::warn;

use crate::fsm::Label;
use crate::fsm::context::{ControllerState, Timestamp};

use super::commands::{DeviceCommand, OperatorCommand, UnknownCommand};
use super::events::{DeviceStatus, LogLevel, PresenceReport};
use super::ports::{ClockPort, EventSink, SchedulerDelegate, StoragePort, TimerKind};
use super::service::GuardianService;

/// In-memory part of a status read; never touches storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveSnapshot {
    pub state: ControllerState,
    pub label: Label,
    pub remaining_countdown_ms: u64,
    pub now: Timestamp,
}

pub struct Gateway<S, E, C> {
    service: GuardianService,
    store: S,
    sink: E,
    clock: C,
}

impl<S, E, C> Gateway<S, E, C>
where
    S: StoragePort,
    E: EventSink,
    C: ClockPort,
{
    pub fn new(service: GuardianService, store: S, sink: E, clock: C) -> Self {
        Self {
            service,
            store,
            sink,
            clock,
        }
    }

    /// Startup records: device row, "server started" line, first sample.
    pub fn start(&mut self) {
        let now = self.clock.now_ms();
        self.service.start(&mut self.sink);

        let id = self.service.device_id().to_owned();
        if let Err(e) = self.store.upsert_device_status(&id, DeviceStatus::Idle, now) {
            warn!("startup device record dropped: {}", e);
        }
        if let Err(e) = self.store.append_log("SYSTEM", LogLevel::Info, "server started", now) {
            warn!("startup log dropped: {}", e);
        }
        self.service.sample_history(now, &mut self.store);
    }

    pub fn report(&mut self, report: &PresenceReport) {
        let now = self.clock.now_ms();
        self.service
            .apply_report(report, now, &mut self.store, &mut self.sink);
    }

    pub fn command(
        &mut self,
        kind: &str,
        note: Option<&str>,
    ) -> Result<OperatorCommand, UnknownCommand> {
        let now = self.clock.now_ms();
        self.service
            .apply_command(kind, note, now, &mut self.store, &mut self.sink)
    }

    /// Drain the mailbox.  Returns the command (if any) and the poll time.
    pub fn poll(&mut self) -> (Option<DeviceCommand>, Timestamp) {
        let now = self.clock.now_ms();
        (self.service.take_command(&mut self.sink), now)
    }

    pub fn relay_state(&self) -> &'static str {
        self.service.relay_mirror().as_str()
    }

    pub fn snapshot(&self) -> LiveSnapshot {
        let now = self.clock.now_ms();
        LiveSnapshot {
            state: self.service.state().clone(),
            label: self.service.label(),
            remaining_countdown_ms: self.service.remaining_countdown_ms(now),
            now,
        }
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now_ms()
    }

    pub fn device_id(&self) -> &str {
        self.service.device_id()
    }

    pub fn service(&self) -> &GuardianService {
        &self.service
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn sink(&self) -> &E {
        &self.sink
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }
}

impl<S, E, C> SchedulerDelegate for Gateway<S, E, C>
where
    S: StoragePort,
    E: EventSink,
    C: ClockPort,
{
    fn on_schedule_fired(&mut self, _label: &str, timer: TimerKind) {
        let now = self.clock.now_ms();
        match timer {
            TimerKind::Countdown => {
                self.service
                    .check_countdown(now, &mut self.store, &mut self.sink);
            }
            TimerKind::Liveness => {
                self.service
                    .check_liveness(now, &mut self.store, &mut self.sink);
            }
            TimerKind::HistorySample => {
                self.service.sample_history(now, &mut self.store);
            }
        }
    }
}
