//! Mock port adapters for integration tests.
//!
//! Records every storage write and emitted event so tests can assert on
//! the full audit trail without a storage thread or a real clock.

use std::cell::RefCell;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use guardian::app::events::{
    AppEvent, DecisionRecord, DeviceStatus, HistorySample, LogEvent, LogLevel,
};
use guardian::app::gateway::Gateway;
use guardian::app::ports::{
    ClockPort, EventSink, LogFilter, StatusBundle, StatusLimits, StatusQueryPort, StorageError,
    StoragePort,
};
use guardian::app::service::GuardianService;
use guardian::config::GuardianConfig;
use guardian::fsm::context::Timestamp;

// ── Storage call record ───────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum StoreCall {
    Upsert { device_id: String, status: DeviceStatus },
    Pending { device_id: String, pending: bool },
    Log(LogEvent),
    Decision(DecisionRecord),
    LastDecision { device_id: String, decision: String },
    History(HistorySample),
}

// ── RecordingStore ────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingStore {
    pub calls: Vec<StoreCall>,
    /// When set, every write fails with this error (and is still recorded).
    pub fail_with: Option<StorageError>,
}

#[allow(dead_code)]
impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(error: StorageError) -> Self {
        Self {
            calls: Vec::new(),
            fail_with: Some(error),
        }
    }

    pub fn logs(&self) -> Vec<&LogEvent> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                StoreCall::Log(e) => Some(e),
                _ => None,
            })
            .collect()
    }

    /// Messages of non-DEBUG log lines, oldest first.
    pub fn transitions(&self) -> Vec<&str> {
        self.logs()
            .into_iter()
            .filter(|e| e.level != LogLevel::Debug)
            .map(|e| e.message.as_str())
            .collect()
    }

    pub fn decisions(&self) -> Vec<&DecisionRecord> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                StoreCall::Decision(d) => Some(d),
                _ => None,
            })
            .collect()
    }

    pub fn history(&self) -> Vec<HistorySample> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                StoreCall::History(s) => Some(*s),
                _ => None,
            })
            .collect()
    }

    fn record(&mut self, call: StoreCall) -> Result<(), StorageError> {
        self.calls.push(call);
        match &self.fail_with {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }
}

impl StoragePort for RecordingStore {
    fn upsert_device_status(
        &mut self,
        device_id: &str,
        status: DeviceStatus,
        _now: Timestamp,
    ) -> Result<(), StorageError> {
        self.record(StoreCall::Upsert {
            device_id: device_id.to_owned(),
            status,
        })
    }

    fn set_pending_action(&mut self, device_id: &str, pending: bool) -> Result<(), StorageError> {
        self.record(StoreCall::Pending {
            device_id: device_id.to_owned(),
            pending,
        })
    }

    fn append_log(
        &mut self,
        device_id: &str,
        level: LogLevel,
        message: &str,
        now: Timestamp,
    ) -> Result<(), StorageError> {
        self.record(StoreCall::Log(LogEvent {
            device_id: device_id.to_owned(),
            level,
            message: message.to_owned(),
            timestamp: now,
        }))
    }

    fn append_decision(
        &mut self,
        device_id: &str,
        decision: &str,
        note: Option<&str>,
        now: Timestamp,
    ) -> Result<(), StorageError> {
        self.record(StoreCall::Decision(DecisionRecord {
            device_id: device_id.to_owned(),
            decision: decision.to_owned(),
            note: note.map(str::to_owned),
            timestamp: now,
        }))
    }

    fn set_last_decision(&mut self, device_id: &str, decision: &str) -> Result<(), StorageError> {
        self.record(StoreCall::LastDecision {
            device_id: device_id.to_owned(),
            decision: decision.to_owned(),
        })
    }

    fn append_history_sample(&mut self, sample: HistorySample) -> Result<(), StorageError> {
        self.record(StoreCall::History(sample))
    }
}

// ── RecordingSink ─────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── ManualClock ───────────────────────────────────────────────

/// Test clock advanced by hand.  Clones share the same time.
#[derive(Clone, Default)]
pub struct ManualClock(Arc<AtomicU64>);

#[allow(dead_code)]
impl ManualClock {
    pub fn at(ms: Timestamp) -> Self {
        Self(Arc::new(AtomicU64::new(ms)))
    }

    pub fn advance(&self, ms: u64) {
        self.0.fetch_add(ms, Ordering::SeqCst);
    }

    pub fn set(&self, ms: Timestamp) {
        self.0.store(ms, Ordering::SeqCst);
    }
}

impl ClockPort for ManualClock {
    fn now_ms(&self) -> Timestamp {
        self.0.load(Ordering::SeqCst)
    }
}

// ── StubQueries ───────────────────────────────────────────────

/// How the stub answers status reads.
#[derive(Clone)]
pub enum QueryBehaviour {
    Answer(StatusBundle),
    Fail(StorageError),
    /// Never answers, to exercise the timeout path.
    Hang,
}

pub struct StubQueries {
    pub behaviour: QueryBehaviour,
    /// Filters and limits the engine asked for, in order.
    pub log_filters: RefCell<Vec<LogFilter>>,
    pub decision_queries: RefCell<Vec<(Option<String>, usize)>>,
}

#[allow(dead_code)]
impl StubQueries {
    pub fn new(behaviour: QueryBehaviour) -> Self {
        Self {
            behaviour,
            log_filters: RefCell::new(Vec::new()),
            decision_queries: RefCell::new(Vec::new()),
        }
    }

    async fn resolve<T>(&self, value: impl FnOnce(&StatusBundle) -> T) -> Result<T, StorageError> {
        match &self.behaviour {
            QueryBehaviour::Answer(bundle) => Ok(value(bundle)),
            QueryBehaviour::Fail(e) => Err(e.clone()),
            QueryBehaviour::Hang => core::future::pending().await,
        }
    }
}

impl StatusQueryPort for StubQueries {
    async fn status_bundle(&self, _limits: StatusLimits) -> Result<StatusBundle, StorageError> {
        self.resolve(StatusBundle::clone).await
    }

    async fn logs(&self, filter: LogFilter) -> Result<Vec<LogEvent>, StorageError> {
        self.log_filters.borrow_mut().push(filter);
        self.resolve(|b| b.logs.clone()).await
    }

    async fn decisions(
        &self,
        device_id: Option<String>,
        limit: usize,
    ) -> Result<Vec<DecisionRecord>, StorageError> {
        self.decision_queries.borrow_mut().push((device_id, limit));
        self.resolve(|_| Vec::new()).await
    }
}

// ── Helpers ───────────────────────────────────────────────────

pub type TestGateway = Gateway<RecordingStore, RecordingSink, ManualClock>;

/// Gateway over recording mocks, started at `t0`.
pub fn make_gateway(config: &GuardianConfig, t0: Timestamp) -> (TestGateway, ManualClock) {
    let clock = ManualClock::at(t0);
    let mut gateway = Gateway::new(
        GuardianService::new(config),
        RecordingStore::new(),
        RecordingSink::default(),
        clock.clone(),
    );
    gateway.start();
    (gateway, clock)
}
