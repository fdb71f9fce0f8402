//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the process logger (`env_logger` on stderr).

use log::{debug, info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`].
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started(label) => {
                info!("START | initial_label={}", label);
            }
            AppEvent::ReportReceived {
                motion,
                relay_reported,
            } => {
                debug!("REPORT | motion={} relay={}", motion, relay_reported);
            }
            AppEvent::LabelChanged { from, to } => {
                info!("STATE | {} -> {}", from, to);
            }
            AppEvent::CommandApplied(cmd) => {
                info!("CMD | {}", cmd);
            }
            AppEvent::CountdownExpired => {
                info!("COUNTDOWN | expired, relay off queued");
            }
            AppEvent::DeviceOffline { silent_for_ms } => {
                warn!("LIVENESS | device silent for {}ms, offline", silent_for_ms);
            }
            AppEvent::CommandDelivered(cmd) => {
                debug!("POLL | delivered {}", cmd);
            }
        }
    }
}
