//! RPC engine dispatch against a mock gateway and stub storage queries.

use core::cell::RefCell;
use core::time::Duration;

use futures_lite::future::block_on;

use crate::mock_ports::{QueryBehaviour, StubQueries, TestGateway, make_gateway};

use guardian::app::commands::DeviceCommand;
use guardian::app::events::{HistorySample, LogEvent, LogLevel};
use guardian::app::ports::{StatusBundle, StorageError};
use guardian::config::GuardianConfig;
use guardian::fsm::Label;
use guardian::rpc::engine::{RpcEngine, RpcLimits, STORAGE_TIMEOUT_MESSAGE};
use guardian::rpc::messages::Response;

const T0: u64 = 1_700_000_000_000;

fn limits() -> RpcLimits {
    RpcLimits {
        status_timeout: Duration::from_millis(100),
        ..RpcLimits::from_config(&GuardianConfig::default())
    }
}

fn setup(behaviour: QueryBehaviour) -> (RefCell<TestGateway>, RpcEngine<StubQueries>) {
    let (gw, _clock) = make_gateway(&GuardianConfig::default(), T0);
    (
        RefCell::new(gw),
        RpcEngine::new(StubQueries::new(behaviour), limits()),
    )
}

fn call(engine: &RpcEngine<StubQueries>, gw: &RefCell<TestGateway>, json: &str) -> Response {
    block_on(engine.dispatch_frame(gw, json.as_bytes()))
}

fn sample_bundle() -> StatusBundle {
    StatusBundle {
        devices: Vec::new(),
        logs: vec![LogEvent {
            device_id: "SYSTEM".into(),
            level: LogLevel::Info,
            message: "server started".into(),
            timestamp: T0,
        }],
        alerts: Vec::new(),
        history: vec![HistorySample {
            timestamp: T0,
            label: Label::Offline,
        }],
    }
}

#[test]
fn report_then_poll_delivers_relay_on_once() {
    let (gw, engine) = setup(QueryBehaviour::Answer(StatusBundle::default()));

    let resp = call(&engine, &gw, r#"{"op":"report","motion":true,"relay":false}"#);
    assert_eq!(resp, Response::ok(None));

    match call(&engine, &gw, r#"{"op":"poll"}"#) {
        Response::Command {
            device_id,
            command,
            timestamp,
        } => {
            assert_eq!(device_id, "esp32_smart_guardian");
            assert_eq!(command, Some(DeviceCommand::RelayOn));
            assert_eq!(timestamp, T0);
        }
        other => panic!("unexpected response: {:?}", other),
    }
    assert!(matches!(
        call(&engine, &gw, r#"{"op":"poll"}"#),
        Response::Command { command: None, .. }
    ));
}

#[test]
fn report_without_device_id_uses_configured_identity() {
    let (gw, engine) = setup(QueryBehaviour::Answer(StatusBundle::default()));
    call(&engine, &gw, r#"{"op":"report","situation":1}"#);
    let gw = gw.borrow();
    let last_debug = gw
        .store()
        .logs()
        .into_iter()
        .rev()
        .find(|e| e.level == LogLevel::Debug)
        .cloned()
        .unwrap();
    assert_eq!(last_debug.device_id, "esp32_smart_guardian");
    assert_eq!(gw.service().label(), Label::Someone);
}

#[test]
fn relay_state_mirrors_label() {
    let (gw, engine) = setup(QueryBehaviour::Answer(StatusBundle::default()));
    let relay = |gw: &RefCell<TestGateway>| match call(&engine, gw, r#"{"op":"relay_state"}"#) {
        Response::RelayState { value } => value,
        other => panic!("unexpected response: {:?}", other),
    };

    // Offline reads as on.
    assert_eq!(relay(&gw), "1");
    call(&engine, &gw, r#"{"op":"report","motion":false}"#);
    assert_eq!(relay(&gw), "0");
    call(&engine, &gw, r#"{"op":"report","motion":"yes"}"#);
    assert_eq!(relay(&gw), "1");
}

#[test]
fn command_outcomes() {
    let (gw, engine) = setup(QueryBehaviour::Answer(StatusBundle::default()));
    call(&engine, &gw, r#"{"op":"report","motion":false}"#);

    assert_eq!(
        call(&engine, &gw, r#"{"op":"command","command":"keep_power","note":"party"}"#),
        Response::ok(Some("command executed: keep_power".into()))
    );
    assert_eq!(gw.borrow().service().label(), Label::Forced);

    assert_eq!(
        call(&engine, &gw, r#"{"op":"command"}"#),
        Response::error("missing command")
    );
    assert_eq!(
        call(&engine, &gw, r#"{"op":"command","command":""}"#),
        Response::error("missing command")
    );
    match call(&engine, &gw, r#"{"op":"command","command":"self_destruct"}"#) {
        Response::Error { message } => assert!(message.contains("self_destruct")),
        other => panic!("unexpected response: {:?}", other),
    }
    // Rejections leave the override in place.
    assert_eq!(gw.borrow().service().label(), Label::Forced);
}

#[test]
fn malformed_request_yields_error() {
    let (gw, engine) = setup(QueryBehaviour::Answer(StatusBundle::default()));
    assert!(matches!(
        call(&engine, &gw, "not json"),
        Response::Error { .. }
    ));
    assert!(matches!(
        call(&engine, &gw, r#"{"op":"launch"}"#),
        Response::Error { .. }
    ));
}

#[test]
fn full_status_combines_live_state_and_storage() {
    let (gw, engine) = setup(QueryBehaviour::Answer(sample_bundle()));
    call(&engine, &gw, r#"{"op":"report","motion":true}"#);
    call(&engine, &gw, r#"{"op":"report","motion":false}"#);

    let Response::FullStatus(status) = call(&engine, &gw, r#"{"op":"full_status"}"#) else {
        panic!("not a full status");
    };
    assert!(!status.degraded);
    assert_eq!(status.label, Label::Countdown);
    assert!(status.status.countdown_active);
    assert_eq!(status.remaining_time_ms, 180_000);
    assert_eq!(status.logs, sample_bundle().logs);
    assert_eq!(status.history.len(), 1);
}

#[test]
fn full_status_degrades_when_storage_hangs() {
    let (gw, engine) = setup(QueryBehaviour::Hang);
    call(&engine, &gw, r#"{"op":"report","motion":true}"#);

    let Response::FullStatus(status) = call(&engine, &gw, r#"{"op":"full_status"}"#) else {
        panic!("not a full status");
    };
    assert!(status.degraded);
    assert_eq!(status.label, Label::Someone);
    assert!(status.devices.is_empty());
    assert!(status.history.is_empty());
    assert_eq!(status.logs.len(), 1);
    assert_eq!(status.logs[0].level, LogLevel::Error);
    assert_eq!(status.logs[0].message, STORAGE_TIMEOUT_MESSAGE);

    // The gateway is still usable afterwards.
    assert!(matches!(
        call(&engine, &gw, r#"{"op":"poll"}"#),
        Response::Command {
            command: Some(DeviceCommand::RelayOn),
            ..
        }
    ));
}

#[test]
fn full_status_degrades_on_storage_error() {
    let (gw, engine) = setup(QueryBehaviour::Fail(StorageError::Unavailable));
    let Response::FullStatus(status) = call(&engine, &gw, r#"{"op":"full_status"}"#) else {
        panic!("not a full status");
    };
    assert!(status.degraded);
    assert_eq!(status.label, Label::Offline);
}

#[test]
fn listings_apply_default_limits() {
    let (gw, engine) = setup(QueryBehaviour::Answer(sample_bundle()));

    let resp = call(&engine, &gw, r#"{"op":"logs","exclude_level":"DEBUG"}"#);
    assert_eq!(
        resp,
        Response::Logs {
            logs: sample_bundle().logs
        }
    );
    call(&engine, &gw, r#"{"op":"logs","device_id":"hall","limit":5}"#);
    {
        let filters = engine_filters(&engine);
        assert_eq!(filters[0].limit, 20);
        assert_eq!(filters[0].exclude_level, Some(LogLevel::Debug));
        assert_eq!(filters[1].limit, 5);
        assert_eq!(filters[1].device_id.as_deref(), Some("hall"));
    }

    call(&engine, &gw, r#"{"op":"decisions"}"#);
    assert!(matches!(
        call(&engine, &gw, r#"{"op":"decisions","device_id":"hall","limit":3}"#),
        Response::Decisions { .. }
    ));
    let queries = engine.queries().decision_queries.borrow().clone();
    assert_eq!(
        queries,
        vec![
            (Some("esp32_smart_guardian".to_owned()), 10),
            (Some("hall".to_owned()), 3),
        ]
    );
}

#[test]
fn listing_times_out_with_error() {
    let (gw, engine) = setup(QueryBehaviour::Hang);
    assert_eq!(
        call(&engine, &gw, r#"{"op":"logs"}"#),
        Response::error(STORAGE_TIMEOUT_MESSAGE)
    );
}

fn engine_filters(engine: &RpcEngine<StubQueries>) -> Vec<guardian::app::ports::LogFilter> {
    engine.queries().log_filters.borrow().clone()
}
