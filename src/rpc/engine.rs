//! RPC engine: dispatches decoded requests to the gateway.
//!
//! **Transport-decoupled**: the engine does not own a transport.  The I/O
//! task feeds it one complete frame payload at a time via
//! [`RpcEngine::dispatch_frame`] and writes back the encoded response.
//!
//! Mutations go through the [`Gateway`] borrow and complete before any
//! `.await`.  Storage reads go through the [`StatusQueryPort`] and are
//! bounded by the status timeout; when storage does not answer in time
//! the full-status response degrades to the live in-memory snapshot.

use core::cell::RefCell;
use core::future::Future;
use core::time::Duration;

use log::{debug, warn};

use crate::app::events::{LogEvent, LogLevel, PresenceReport};
use crate::app::gateway::Gateway;
use crate::app::ports::{ClockPort, EventSink, LogFilter, StatusLimits, StatusQueryPort, StoragePort};
use crate::config::GuardianConfig;

use super::messages::{FullStatus, ReportPayload, Request, Response};

/// Message of the synthetic log line returned when storage is unresponsive.
pub const STORAGE_TIMEOUT_MESSAGE: &str = "storage did not respond, showing live state only";

/// Tunables the engine reads from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RpcLimits {
    pub status_timeout: Duration,
    pub status: StatusLimits,
    pub default_log_limit: usize,
    pub default_decision_limit: usize,
}

impl RpcLimits {
    pub fn from_config(config: &GuardianConfig) -> Self {
        Self {
            status_timeout: Duration::from_millis(config.status_timeout_ms),
            status: StatusLimits {
                logs: config.status_log_limit,
                alerts: config.status_alert_limit,
                history: config.status_history_limit,
            },
            default_log_limit: config.log_query_default_limit,
            default_decision_limit: config.decision_query_default_limit,
        }
    }
}

/// Transport-decoupled RPC dispatcher.
pub struct RpcEngine<Q> {
    queries: Q,
    limits: RpcLimits,
}

impl<Q: StatusQueryPort> RpcEngine<Q> {
    pub fn new(queries: Q, limits: RpcLimits) -> Self {
        Self { queries, limits }
    }

    /// Decode one frame payload and dispatch it.  A payload that is not a
    /// valid request yields an error response.
    pub async fn dispatch_frame<S, E, C>(
        &self,
        gateway: &RefCell<Gateway<S, E, C>>,
        frame: &[u8],
    ) -> Response
    where
        S: StoragePort,
        E: EventSink,
        C: ClockPort,
    {
        match serde_json::from_slice::<Request>(frame) {
            Ok(request) => self.dispatch(gateway, request).await,
            Err(e) => {
                debug!("RPC: malformed request: {}", e);
                Response::error(format!("malformed request: {}", e))
            }
        }
    }

    pub async fn dispatch<S, E, C>(
        &self,
        gateway: &RefCell<Gateway<S, E, C>>,
        request: Request,
    ) -> Response
    where
        S: StoragePort,
        E: EventSink,
        C: ClockPort,
    {
        match request {
            Request::Report(payload) => {
                let mut gw = gateway.borrow_mut();
                let report = to_presence_report(&payload, gw.device_id());
                gw.report(&report);
                Response::ok(None)
            }

            Request::Poll => {
                let mut gw = gateway.borrow_mut();
                let (command, timestamp) = gw.poll();
                Response::Command {
                    device_id: gw.device_id().to_owned(),
                    command,
                    timestamp,
                }
            }

            Request::RelayState => Response::RelayState {
                value: gateway.borrow().relay_state().to_owned(),
            },

            Request::Command { command, note } => {
                let Some(kind) = command.filter(|c| !c.is_empty()) else {
                    return Response::error("missing command");
                };
                let result = gateway.borrow_mut().command(&kind, note.as_deref());
                match result {
                    Ok(cmd) => Response::ok(Some(format!("command executed: {}", cmd))),
                    Err(e) => Response::error(e.to_string()),
                }
            }

            Request::FullStatus => Response::FullStatus(self.full_status(gateway).await),

            Request::Logs {
                device_id,
                limit,
                exclude_level,
            } => {
                let filter = LogFilter {
                    device_id,
                    limit: limit.unwrap_or(self.limits.default_log_limit),
                    exclude_level,
                };
                match self.bounded(self.queries.logs(filter)).await {
                    Some(Ok(logs)) => Response::Logs { logs },
                    Some(Err(e)) => Response::error(format!("storage error: {}", e)),
                    None => Response::error(STORAGE_TIMEOUT_MESSAGE),
                }
            }

            Request::Decisions { device_id, limit } => {
                let limit = limit.unwrap_or(self.limits.default_decision_limit);
                let device_id = device_id.or_else(|| Some(gateway.borrow().device_id().to_owned()));
                match self.bounded(self.queries.decisions(device_id, limit)).await {
                    Some(Ok(decisions)) => Response::Decisions { decisions },
                    Some(Err(e)) => Response::error(format!("storage error: {}", e)),
                    None => Response::error(STORAGE_TIMEOUT_MESSAGE),
                }
            }
        }
    }

    /// Live snapshot plus storage tables, or the live snapshot alone with a
    /// synthetic ERROR line when storage fails or times out.
    async fn full_status<S, E, C>(&self, gateway: &RefCell<Gateway<S, E, C>>) -> FullStatus
    where
        S: StoragePort,
        E: EventSink,
        C: ClockPort,
    {
        let live = gateway.borrow().snapshot();

        let stored = match self.bounded(self.queries.status_bundle(self.limits.status)).await {
            Some(Ok(bundle)) => Some(bundle),
            Some(Err(e)) => {
                warn!("RPC: status read failed: {}", e);
                None
            }
            None => {
                warn!(
                    "RPC: status read timed out after {:?}, returning partial status",
                    self.limits.status_timeout
                );
                None
            }
        };

        match stored {
            Some(bundle) => FullStatus {
                status: live.state,
                label: live.label,
                remaining_time_ms: live.remaining_countdown_ms,
                devices: bundle.devices,
                logs: bundle.logs,
                info_logs: bundle.alerts,
                history: bundle.history,
                degraded: false,
            },
            None => FullStatus {
                status: live.state,
                label: live.label,
                remaining_time_ms: live.remaining_countdown_ms,
                devices: Vec::new(),
                logs: vec![LogEvent {
                    device_id: "SYSTEM".into(),
                    level: LogLevel::Error,
                    message: STORAGE_TIMEOUT_MESSAGE.into(),
                    timestamp: gateway.borrow().now(),
                }],
                info_logs: Vec::new(),
                history: Vec::new(),
                degraded: true,
            },
        }
    }

    /// Race `fut` against the status timeout.
    async fn bounded<T>(&self, fut: impl Future<Output = T>) -> Option<T> {
        let timeout = self.limits.status_timeout;
        futures_lite::future::or(async { Some(fut.await) }, async {
            async_io_mini::Timer::after(timeout).await;
            None
        })
        .await
    }

    pub fn limits(&self) -> &RpcLimits {
        &self.limits
    }

    pub fn queries(&self) -> &Q {
        &self.queries
    }
}

/// Fill in defaults for a raw report.
pub fn to_presence_report(payload: &ReportPayload, default_device_id: &str) -> PresenceReport {
    let (motion_detected, relay_reported) = payload.resolve();
    PresenceReport {
        device_id: payload
            .device_id
            .clone()
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| default_device_id.to_owned()),
        motion_detected,
        relay_reported,
    }
}

/// Serialise a response to its JSON payload.
pub fn encode_response(response: &Response) -> Vec<u8> {
    serde_json::to_vec(response).unwrap_or_else(|e| {
        warn!("RPC: response encoding failed: {}", e);
        br#"{"type":"error","message":"response encoding failed"}"#.to_vec()
    })
}
