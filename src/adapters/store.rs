//! In-memory audit store with an optional append-only journal.
//!
//! Implements [`StoragePort`] for the storage worker thread.  Tables:
//!
//! | table     | retention               | order of reads   |
//! |-----------|-------------------------|------------------|
//! | devices   | one row per device id   | insertion order  |
//! | logs      | `log_capacity`          | newest first     |
//! | decisions | `decision_capacity`     | newest first     |
//! | history   | `history_capacity`      | newest first     |
//!
//! With a journal path configured, every write is appended as a
//! postcard-encoded, length-prefixed [`JournalRecord`] and the file is
//! replayed on open.  Retention caps are re-applied during replay.  A
//! journal holding far more records than the tables retain is rewritten
//! from the live tables, both on open and as writes accumulate.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::app::events::{
    DecisionRecord, DeviceRecord, DeviceStatus, HistorySample, LogEvent, LogLevel,
};
use crate::app::ports::{LogFilter, StatusBundle, StatusLimits, StorageError, StoragePort};
use crate::config::GuardianConfig;
use crate::fsm::context::Timestamp;
use crate::history::{HistoryRing, RetentionRing};
use crate::rpc::codec::{FrameDecoder, encode_frame};

/// Largest journal record accepted on replay.
const MAX_JOURNAL_RECORD: usize = 64 * 1024;

/// Rewrite the journal when it holds this many times the retained rows.
const COMPACT_FACTOR: usize = 2;

/// Journals shorter than this are never rewritten.
const COMPACT_MIN_RECORDS: usize = 64;

/// One persisted write, replayed in order on open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JournalRecord {
    DeviceStatus {
        device_id: String,
        status: DeviceStatus,
        now: Timestamp,
    },
    PendingAction {
        device_id: String,
        pending: bool,
    },
    LastDecision {
        device_id: String,
        decision: String,
    },
    Log(LogEvent),
    Decision(DecisionRecord),
    History(HistorySample),
}

/// Retention caps for the bounded tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Retention {
    pub logs: usize,
    pub decisions: usize,
    pub history: usize,
}

impl Retention {
    pub fn from_config(config: &GuardianConfig) -> Self {
        Self {
            logs: config.log_capacity,
            decisions: config.decision_capacity,
            history: config.history_capacity,
        }
    }
}

pub struct MemoryStore {
    devices: Vec<DeviceRecord>,
    logs: RetentionRing<LogEvent>,
    decisions: RetentionRing<DecisionRecord>,
    history: HistoryRing,
    journal: Option<Journal>,
}

struct Journal {
    path: PathBuf,
    file: File,
    /// Records currently in the file.
    records: usize,
}

impl MemoryStore {
    /// Store without a journal; contents die with the process.
    pub fn in_memory(retention: Retention) -> Self {
        Self {
            devices: Vec::new(),
            logs: RetentionRing::with_capacity(retention.logs),
            decisions: RetentionRing::with_capacity(retention.decisions),
            history: HistoryRing::with_capacity(retention.history),
            journal: None,
        }
    }

    /// Open (or create) the journal at `path` and replay it.
    ///
    /// A journal that cannot be opened or decoded is an error; the caller
    /// treats it as fatal.
    pub fn open(path: impl AsRef<Path>, retention: Retention) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let mut store = Self::in_memory(retention);

        let replayed = match File::open(&path) {
            Ok(mut file) => {
                let mut bytes = Vec::new();
                file.read_to_end(&mut bytes).map_err(|e| {
                    warn!("journal {}: read failed: {}", path.display(), e);
                    StorageError::IoError
                })?;
                let (count, valid_len) = store.replay(&bytes)?;
                if valid_len < bytes.len() {
                    truncate(&path, valid_len)?;
                }
                count
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => 0,
            Err(e) => {
                warn!("journal {}: open failed: {}", path.display(), e);
                return Err(StorageError::IoError);
            }
        };
        info!(
            "MemoryStore: replayed {} journal records from {}",
            replayed,
            path.display()
        );

        let records = if store.needs_compaction(replayed) {
            store.rewrite_journal(&path)?
        } else {
            replayed
        };
        store.journal = Some(Journal::open_append(path, records)?);
        Ok(store)
    }

    /// Build the store the configuration asks for.
    pub fn from_config(config: &GuardianConfig) -> Result<Self, StorageError> {
        let retention = Retention::from_config(config);
        match &config.journal_path {
            Some(path) => Self::open(path, retention),
            None => {
                info!("MemoryStore: no journal configured, in-memory only");
                Ok(Self::in_memory(retention))
            }
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn devices(&self) -> Vec<DeviceRecord> {
        self.devices.clone()
    }

    pub fn device(&self, device_id: &str) -> Option<&DeviceRecord> {
        self.devices.iter().find(|d| d.device_id == device_id)
    }

    pub fn logs(&self, filter: &LogFilter) -> Vec<LogEvent> {
        self.logs
            .iter()
            .rev()
            .filter(|l| filter.device_id.as_deref().is_none_or(|id| l.device_id == id))
            .filter(|l| filter.exclude_level != Some(l.level))
            .take(filter.limit)
            .cloned()
            .collect()
    }

    pub fn decisions(&self, device_id: Option<&str>, limit: usize) -> Vec<DecisionRecord> {
        self.decisions
            .iter()
            .rev()
            .filter(|d| device_id.is_none_or(|id| d.device_id == id))
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn history(&self, limit: usize) -> Vec<HistorySample> {
        self.history.recent(limit).copied().collect()
    }

    /// Everything a full status read needs, in one pass.
    pub fn status_bundle(&self, limits: StatusLimits) -> StatusBundle {
        StatusBundle {
            devices: self.devices(),
            logs: self.logs(&LogFilter {
                device_id: None,
                limit: limits.logs,
                exclude_level: None,
            }),
            alerts: self.logs(&LogFilter {
                device_id: None,
                limit: limits.alerts,
                exclude_level: Some(LogLevel::Debug),
            }),
            history: self.history(limits.history),
        }
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    // ── Internal ──────────────────────────────────────────────

    fn retained_rows(&self) -> usize {
        self.devices.len() + self.logs.len() + self.decisions.len() + self.history.len()
    }

    fn needs_compaction(&self, journal_records: usize) -> bool {
        journal_records > COMPACT_MIN_RECORDS.max(self.retained_rows() * COMPACT_FACTOR)
    }

    /// Rewrite the journal once appends have outgrown the retained tables.
    fn compact_if_needed(&mut self) -> Result<(), StorageError> {
        let path = match &self.journal {
            Some(journal) if self.needs_compaction(journal.records) => journal.path.clone(),
            _ => return Ok(()),
        };
        let records = self.rewrite_journal(&path)?;
        match Journal::open_append(path, records) {
            Ok(journal) => {
                self.journal = Some(journal);
                Ok(())
            }
            Err(e) => {
                // The old handle points at the replaced file.
                warn!("journal: reopen after compaction failed, journaling disabled");
                self.journal = None;
                Err(e)
            }
        }
    }

    /// Apply one record to the tables without journaling it.
    fn apply(&mut self, record: JournalRecord) {
        match record {
            JournalRecord::DeviceStatus {
                device_id,
                status,
                now,
            } => {
                if let Some(dev) = self.devices.iter_mut().find(|d| d.device_id == device_id) {
                    dev.status = status;
                    dev.last_seen = now;
                } else {
                    self.devices.push(DeviceRecord {
                        device_id,
                        status,
                        last_seen: now,
                        pending_action: false,
                        last_decision: None,
                        created_time: now,
                    });
                }
            }
            JournalRecord::PendingAction { device_id, pending } => {
                if let Some(dev) = self.devices.iter_mut().find(|d| d.device_id == device_id) {
                    dev.pending_action = pending;
                }
            }
            JournalRecord::LastDecision {
                device_id,
                decision,
            } => {
                if let Some(dev) = self.devices.iter_mut().find(|d| d.device_id == device_id) {
                    dev.last_decision = Some(decision);
                }
            }
            JournalRecord::Log(event) => {
                self.logs.push(event);
            }
            JournalRecord::Decision(decision) => {
                self.decisions.push(decision);
            }
            JournalRecord::History(sample) => {
                self.history.push(sample);
            }
        }
    }

    /// Apply and journal one record.
    pub fn commit(&mut self, record: JournalRecord) -> Result<(), StorageError> {
        let result = match &mut self.journal {
            Some(journal) => journal.append(&record),
            None => Ok(()),
        };
        // The in-memory table stays authoritative even if the journal write failed.
        self.apply(record);
        result?;
        self.compact_if_needed()
    }

    /// Returns the record count and the length of the intact prefix.
    fn replay(&mut self, bytes: &[u8]) -> Result<(usize, usize), StorageError> {
        let mut decoder = FrameDecoder::new(MAX_JOURNAL_RECORD);
        decoder.feed(bytes);
        let mut count = 0;
        loop {
            match decoder.next_frame() {
                Ok(Some(frame)) => {
                    let record: JournalRecord =
                        postcard::from_bytes(&frame).map_err(|_| StorageError::Corrupted)?;
                    self.apply(record);
                    count += 1;
                }
                Ok(None) => break,
                Err(e) => {
                    warn!("journal record {}: {}", count, e);
                    return Err(StorageError::Corrupted);
                }
            }
        }
        if decoder.pending() > 0 {
            // Torn final write; everything before it is intact.
            warn!(
                "journal: dropping {} trailing bytes of a partial record",
                decoder.pending()
            );
        }
        Ok((count, bytes.len() - decoder.pending()))
    }

    /// Replace the journal with one record per retained row.  Returns the
    /// number of records written.
    fn rewrite_journal(&self, path: &Path) -> Result<usize, StorageError> {
        let records = self.snapshot_records();
        let mut out = Vec::new();
        for record in &records {
            let payload = postcard::to_allocvec(record).map_err(|_| StorageError::IoError)?;
            encode_frame(&payload, &mut out).ok_or(StorageError::IoError)?;
        }
        let tmp = path.with_extension("compact");
        fs::write(&tmp, &out)
            .and_then(|()| fs::rename(&tmp, path))
            .map_err(|e| {
                warn!("journal {}: compaction failed: {}", path.display(), e);
                StorageError::IoError
            })?;
        info!(
            "journal {}: compacted to {} records ({} bytes)",
            path.display(),
            records.len(),
            out.len()
        );
        Ok(records.len())
    }

    fn snapshot_records(&self) -> Vec<JournalRecord> {
        let mut records = Vec::with_capacity(self.retained_rows());
        for dev in &self.devices {
            records.push(JournalRecord::DeviceStatus {
                device_id: dev.device_id.clone(),
                status: dev.status,
                now: dev.last_seen,
            });
            if dev.pending_action {
                records.push(JournalRecord::PendingAction {
                    device_id: dev.device_id.clone(),
                    pending: true,
                });
            }
            if let Some(decision) = &dev.last_decision {
                records.push(JournalRecord::LastDecision {
                    device_id: dev.device_id.clone(),
                    decision: decision.clone(),
                });
            }
        }
        records.extend(self.logs.iter().cloned().map(JournalRecord::Log));
        records.extend(self.decisions.iter().cloned().map(JournalRecord::Decision));
        records.extend(self.history.iter().copied().map(JournalRecord::History));
        records
    }
}

fn truncate(path: &Path, len: usize) -> Result<(), StorageError> {
    OpenOptions::new()
        .write(true)
        .open(path)
        .and_then(|f| f.set_len(len as u64))
        .map_err(|e| {
            warn!("journal {}: truncate failed: {}", path.display(), e);
            StorageError::IoError
        })
}

impl Journal {
    fn open_append(path: PathBuf, records: usize) -> Result<Self, StorageError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| {
                warn!("journal {}: open for append failed: {}", path.display(), e);
                StorageError::IoError
            })?;
        Ok(Self { path, file, records })
    }

    fn append(&mut self, record: &JournalRecord) -> Result<(), StorageError> {
        let payload = postcard::to_allocvec(record).map_err(|_| StorageError::IoError)?;
        let mut frame = Vec::with_capacity(payload.len() + 4);
        encode_frame(&payload, &mut frame).ok_or(StorageError::IoError)?;
        self.file.write_all(&frame).map_err(|e| {
            warn!("journal {}: append failed: {}", self.path.display(), e);
            StorageError::IoError
        })?;
        self.records += 1;
        Ok(())
    }
}

impl StoragePort for MemoryStore {
    fn upsert_device_status(
        &mut self,
        device_id: &str,
        status: DeviceStatus,
        now: Timestamp,
    ) -> Result<(), StorageError> {
        self.commit(JournalRecord::DeviceStatus {
            device_id: device_id.to_owned(),
            status,
            now,
        })
    }

    fn set_pending_action(&mut self, device_id: &str, pending: bool) -> Result<(), StorageError> {
        self.commit(JournalRecord::PendingAction {
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
        self.commit(JournalRecord::Log(LogEvent {
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
        self.commit(JournalRecord::Decision(DecisionRecord {
            device_id: device_id.to_owned(),
            decision: decision.to_owned(),
            note: note.map(str::to_owned),
            timestamp: now,
        }))
    }

    fn set_last_decision(&mut self, device_id: &str, decision: &str) -> Result<(), StorageError> {
        self.commit(JournalRecord::LastDecision {
            device_id: device_id.to_owned(),
            decision: decision.to_owned(),
        })
    }

    fn append_history_sample(&mut self, sample: HistorySample) -> Result<(), StorageError> {
        self.commit(JournalRecord::History(sample))
    }
}
