//! Storage worker thread and the link the I/O side talks to it through.
//!
//! ```text
//! ┌──────────────┐  StorageRequest  ┌──────────────────┐
//! │   Gateway    │─────────────────▶│  storage worker  │
//! │  (I/O task)  │                  │  owns MemoryStore│
//! │              │◀─ ─ ─ Signal ─ ─ │                  │
//! └──────────────┘   QueryReply     └──────────────────┘
//! ```
//!
//! Writes are `try_send`: a full queue drops the write and reports
//! [`StorageError::QueueFull`] instead of blocking the decision path.
//! Queries wait for queue space and reply through a one-shot
//! [`Signal`]; the caller bounds the wait with its own timeout.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, TrySendError};
use embassy_sync::signal::Signal;
use log::{debug, info, warn};

use super::store::{JournalRecord, MemoryStore};
use crate::app::events::{
    DecisionRecord, DeviceStatus, HistorySample, LogEvent, LogLevel,
};
use crate::app::ports::{
    LogFilter, StatusBundle, StatusLimits, StatusQueryPort, StorageError, StoragePort,
};
use crate::fsm::context::Timestamp;

/// Requests buffered between the gateway and the worker.
pub const STORAGE_QUEUE_DEPTH: usize = 64;

type ReplySignal = Signal<CriticalSectionRawMutex, QueryReply>;
type RequestChannel = Channel<CriticalSectionRawMutex, StorageRequest, STORAGE_QUEUE_DEPTH>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageQuery {
    Status(StatusLimits),
    Logs(LogFilter),
    Decisions {
        device_id: Option<String>,
        limit: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryReply {
    Status(StatusBundle),
    Logs(Vec<LogEvent>),
    Decisions(Vec<DecisionRecord>),
}

pub enum StorageRequest {
    Write(JournalRecord),
    Query {
        query: StorageQuery,
        reply: Arc<ReplySignal>,
    },
    /// Stop the worker; it returns the store from its thread.
    Shutdown,
}

/// Cloneable handle to the storage worker.
#[derive(Clone)]
pub struct StorageLink {
    channel: Arc<RequestChannel>,
}

/// Move `store` onto its own thread and return the link to it.
///
/// Joining the handle after [`StorageLink::shutdown`] yields the store.
pub fn spawn_worker(store: MemoryStore) -> std::io::Result<(StorageLink, JoinHandle<MemoryStore>)> {
    let channel = Arc::new(RequestChannel::new());
    let rx = Arc::clone(&channel);
    let handle = thread::Builder::new()
        .name("storage".into())
        .spawn(move || run_worker(store, &rx))?;
    Ok((StorageLink { channel }, handle))
}

fn run_worker(mut store: MemoryStore, channel: &RequestChannel) -> MemoryStore {
    info!("storage worker running");
    loop {
        match futures_lite::future::block_on(channel.receive()) {
            StorageRequest::Write(record) => {
                if let Err(e) = store.commit(record) {
                    warn!("storage worker: journal write failed: {}", e);
                }
            }
            StorageRequest::Query { query, reply } => {
                reply.signal(answer(&store, query));
            }
            StorageRequest::Shutdown => {
                info!("storage worker stopping");
                return store;
            }
        }
    }
}

fn answer(store: &MemoryStore, query: StorageQuery) -> QueryReply {
    match query {
        StorageQuery::Status(limits) => QueryReply::Status(store.status_bundle(limits)),
        StorageQuery::Logs(filter) => QueryReply::Logs(store.logs(&filter)),
        StorageQuery::Decisions { device_id, limit } => {
            QueryReply::Decisions(store.decisions(device_id.as_deref(), limit))
        }
    }
}

impl StorageLink {
    fn submit(&self, record: JournalRecord) -> Result<(), StorageError> {
        match self.channel.try_send(StorageRequest::Write(record)) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                debug!("storage queue full ({} deep)", STORAGE_QUEUE_DEPTH);
                Err(StorageError::QueueFull)
            }
        }
    }

    async fn ask(&self, query: StorageQuery) -> QueryReply {
        let reply = Arc::new(ReplySignal::new());
        self.channel
            .send(StorageRequest::Query {
                query,
                reply: Arc::clone(&reply),
            })
            .await;
        reply.wait().await
    }

    /// Ask the worker to stop after draining what is already queued.
    pub async fn shutdown(&self) {
        self.channel.send(StorageRequest::Shutdown).await;
    }

    /// Requests currently waiting for the worker.
    pub fn queued(&self) -> usize {
        self.channel.len()
    }
}

impl StoragePort for StorageLink {
    fn upsert_device_status(
        &mut self,
        device_id: &str,
        status: DeviceStatus,
        now: Timestamp,
    ) -> Result<(), StorageError> {
        self.submit(JournalRecord::DeviceStatus {
            device_id: device_id.to_owned(),
            status,
            now,
        })
    }

    fn set_pending_action(&mut self, device_id: &str, pending: bool) -> Result<(), StorageError> {
        self.submit(JournalRecord::PendingAction {
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
        self.submit(JournalRecord::Log(LogEvent {
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
        self.submit(JournalRecord::Decision(DecisionRecord {
            device_id: device_id.to_owned(),
            decision: decision.to_owned(),
            note: note.map(str::to_owned),
            timestamp: now,
        }))
    }

    fn set_last_decision(&mut self, device_id: &str, decision: &str) -> Result<(), StorageError> {
        self.submit(JournalRecord::LastDecision {
            device_id: device_id.to_owned(),
            decision: decision.to_owned(),
        })
    }

    fn append_history_sample(&mut self, sample: HistorySample) -> Result<(), StorageError> {
        self.submit(JournalRecord::History(sample))
    }
}

impl StatusQueryPort for StorageLink {
    async fn status_bundle(&self, limits: StatusLimits) -> Result<StatusBundle, StorageError> {
        match self.ask(StorageQuery::Status(limits)).await {
            QueryReply::Status(bundle) => Ok(bundle),
            _ => Err(StorageError::Unavailable),
        }
    }

    async fn logs(&self, filter: LogFilter) -> Result<Vec<LogEvent>, StorageError> {
        match self.ask(StorageQuery::Logs(filter)).await {
            QueryReply::Logs(logs) => Ok(logs),
            _ => Err(StorageError::Unavailable),
        }
    }

    async fn decisions(
        &self,
        device_id: Option<String>,
        limit: usize,
    ) -> Result<Vec<DecisionRecord>, StorageError> {
        match self.ask(StorageQuery::Decisions { device_id, limit }).await {
            QueryReply::Decisions(decisions) => Ok(decisions),
            _ => Err(StorageError::Unavailable),
        }
    }
}
