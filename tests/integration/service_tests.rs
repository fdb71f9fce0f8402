//! End-to-end controller behaviour through the gateway: reports, operator
//! commands and the scheduler-driven checks, against recording mocks.

use crate::mock_ports::{ManualClock, RecordingStore, StoreCall, TestGateway, make_gateway};

use guardian::app::commands::{DeviceCommand, OperatorCommand};
use guardian::app::events::{AppEvent, DeviceStatus, PresenceReport};
use guardian::app::gateway::Gateway;
use guardian::app::ports::StorageError;
use guardian::app::service::GuardianService;
use guardian::config::GuardianConfig;
use guardian::fsm::Label;
use guardian::scheduler::Scheduler;

const T0: u64 = 1_700_000_000_000;
const TICK: u64 = 100;

fn report(motion: bool) -> PresenceReport {
    PresenceReport {
        device_id: "esp32_smart_guardian".into(),
        motion_detected: motion,
        relay_reported: motion,
    }
}

/// Advance time by `ms` in scheduler ticks, sending an absence report
/// every `report_every` ms when set (the device keeps checking in).
fn run_for(
    gw: &mut TestGateway,
    sched: &mut Scheduler,
    clock: &ManualClock,
    ms: u64,
    report_every: Option<u64>,
) {
    let mut elapsed = 0;
    while elapsed < ms {
        clock.advance(TICK);
        elapsed += TICK;
        if let Some(every) = report_every {
            if elapsed % every == 0 {
                gw.report(&report(false));
            }
        }
        sched.tick(TICK, gw);
    }
}

fn setup() -> (TestGateway, Scheduler, ManualClock, GuardianConfig) {
    let config = GuardianConfig::default();
    let (gw, clock) = make_gateway(&config, T0);
    let sched = Scheduler::from_config(&config);
    (gw, sched, clock, config)
}

// ── Scenario 1: presence switches the light on ──────────────────

#[test]
fn presence_report_turns_relay_on() {
    let (mut gw, _sched, _clock, _) = setup();
    assert_eq!(gw.service().label(), Label::Offline);

    gw.report(&report(true));

    assert_eq!(gw.service().label(), Label::Someone);
    assert!(gw.service().state().relay_active);
    assert_eq!(gw.relay_state(), "1");

    let (cmd, at) = gw.poll();
    assert_eq!(cmd, Some(DeviceCommand::RelayOn));
    assert_eq!(at, T0);
    // Mailbox drains at most once.
    assert_eq!(gw.poll().0, None);
}

// ── Scenario 2: absence → countdown → idle ──────────────────────

#[test]
fn absence_runs_countdown_then_switches_off() {
    let (mut gw, mut sched, clock, config) = setup();
    gw.report(&report(true));
    let _ = gw.poll();

    gw.report(&report(false));
    assert_eq!(gw.service().label(), Label::Countdown);
    assert_eq!(gw.relay_state(), "1");
    assert_eq!(
        gw.snapshot().remaining_countdown_ms,
        config.countdown_duration_ms
    );

    // Half way: still counting down, nothing queued.
    run_for(&mut gw, &mut sched, &clock, config.countdown_duration_ms / 2, Some(2_000));
    assert_eq!(gw.service().label(), Label::Countdown);
    assert_eq!(gw.poll().0, None);

    run_for(
        &mut gw,
        &mut sched,
        &clock,
        config.countdown_duration_ms / 2 + config.countdown_check_interval_ms as u64,
        Some(2_000),
    );
    assert_eq!(gw.service().label(), Label::Idle);
    assert!(!gw.service().state().relay_active);
    assert_eq!(gw.relay_state(), "0");
    assert_eq!(gw.poll().0, Some(DeviceCommand::RelayOff));
    assert!(gw.sink().events.contains(&AppEvent::CountdownExpired));
}

#[test]
fn presence_during_countdown_cancels_it() {
    let (mut gw, mut sched, clock, _) = setup();
    gw.report(&report(true));
    gw.report(&report(false));
    run_for(&mut gw, &mut sched, &clock, 30_000, Some(2_000));

    gw.report(&report(true));
    assert_eq!(gw.service().label(), Label::Someone);
    assert!(!gw.service().state().countdown_active);
    assert_eq!(gw.poll().0, Some(DeviceCommand::RelayOn));
}

// ── Scenario 3: forced on while empty, released by presence ─────

#[test]
fn keep_power_while_empty_is_released_by_next_presence() {
    let (mut gw, mut sched, clock, _) = setup();
    gw.report(&report(false));
    assert_eq!(gw.service().label(), Label::Idle);

    let cmd = gw.command("keep_power", Some("cleaning crew")).unwrap();
    assert_eq!(cmd, OperatorCommand::KeepPower);
    assert_eq!(gw.service().label(), Label::Forced);
    assert!(gw.service().state().forced_release_armed);
    assert_eq!(gw.poll().0, Some(DeviceCommand::RelayOn));

    // Forced survives well past the countdown length while nobody comes.
    run_for(&mut gw, &mut sched, &clock, 200_000, Some(2_000));
    assert_eq!(gw.service().label(), Label::Forced);

    gw.report(&report(true));
    assert!(!gw.service().state().forced_mode);
    assert_eq!(gw.service().label(), Label::Someone);

    let decisions = gw.store().decisions();
    assert_eq!(decisions.len(), 1);
    assert_eq!(decisions[0].decision, "keep_power");
    assert_eq!(decisions[0].note.as_deref(), Some("cleaning crew"));
}

#[test]
fn keep_power_while_occupied_needs_a_full_absence_cycle() {
    let (mut gw, _sched, _clock, _) = setup();
    gw.report(&report(true));
    gw.command("keep_power", None).unwrap();
    assert!(!gw.service().state().forced_release_armed);

    // Leaving arms the release but does not start a countdown.
    gw.report(&report(false));
    assert_eq!(gw.service().label(), Label::Forced);
    assert!(!gw.service().state().countdown_active);

    gw.report(&report(true));
    assert!(!gw.service().state().forced_mode);
}

#[test]
fn cancel_forced_while_empty_starts_countdown() {
    let (mut gw, _sched, _clock, _) = setup();
    gw.report(&report(false));
    gw.command("keep_power", None).unwrap();
    gw.command("cancel_forced", None).unwrap();
    assert_eq!(gw.service().label(), Label::Countdown);
}

#[test]
fn cancel_forced_while_occupied_keeps_light_on() {
    let (mut gw, _sched, _clock, _) = setup();
    gw.report(&report(true));
    gw.command("keep_power", None).unwrap();
    let _ = gw.poll();

    gw.command("cancel_forced", None).unwrap();
    let s = gw.service().state();
    assert!(!s.forced_mode);
    assert!(s.relay_active);
    assert!(!s.countdown_active);
    assert_eq!(gw.service().label(), Label::Someone);
    assert_eq!(gw.relay_state(), "1");
    assert_eq!(gw.poll().0, None);
}

// ── Device-reported relay value ─────────────────────────────────

#[test]
fn reported_relay_on_does_not_switch_relay() {
    let (mut gw, _sched, _clock, _) = setup();
    gw.report(&PresenceReport {
        device_id: "esp32_smart_guardian".into(),
        motion_detected: false,
        relay_reported: true,
    });

    let s = gw.service().state();
    assert!(!s.relay_active);
    assert!(!s.countdown_active);
    assert_eq!(gw.service().label(), Label::Idle);
    assert_eq!(gw.relay_state(), "0");
    assert_eq!(gw.poll().0, None);
}

#[test]
fn reported_relay_on_after_power_off_stays_idle() {
    let (mut gw, _sched, _clock, _) = setup();
    gw.report(&report(true));
    gw.command("power_off", None).unwrap();
    let _ = gw.poll();

    // Device leaves but claims its light is still on.
    gw.report(&PresenceReport {
        device_id: "esp32_smart_guardian".into(),
        motion_detected: false,
        relay_reported: true,
    });
    assert!(!gw.service().state().relay_active);
    assert!(!gw.service().state().countdown_active);
    assert_eq!(gw.service().label(), Label::Idle);
    assert_eq!(gw.poll().0, None);
}

#[test]
fn power_off_and_reset() {
    let (mut gw, _sched, _clock, _) = setup();
    gw.report(&report(true));
    let _ = gw.poll();

    gw.command("power_off", None).unwrap();
    // Presence still wins the label, but the relay decision is off.
    assert_eq!(gw.service().label(), Label::Someone);
    assert!(!gw.service().state().relay_active);
    assert_eq!(gw.poll().0, Some(DeviceCommand::RelayOff));

    gw.command("keep_power", None).unwrap();
    gw.command("reset", None).unwrap();
    let s = gw.service().state();
    assert!(!s.forced_mode && !s.relay_active && !s.motion_detected);
    assert!(s.pending_command.is_empty());
    assert_eq!(gw.service().label(), Label::Idle);
}

#[test]
fn unknown_command_is_rejected_without_audit() {
    let (mut gw, _sched, _clock, _) = setup();
    gw.report(&report(false));
    let calls_before = gw.store().calls.len();

    let err = gw.command("turbo", None).unwrap_err();
    assert_eq!(err.0, "turbo");
    assert_eq!(gw.store().calls.len(), calls_before);
}

// ── Scenario 4: silence → offline ───────────────────────────────

#[test]
fn silence_beyond_liveness_threshold_goes_offline() {
    let (mut gw, mut sched, clock, config) = setup();
    gw.report(&report(true));
    assert!(gw.service().state().relay_active);

    run_for(&mut gw, &mut sched, &clock, config.liveness_timeout_ms, None);
    assert_eq!(gw.service().label(), Label::Someone, "threshold is strict");

    run_for(
        &mut gw,
        &mut sched,
        &clock,
        u64::from(config.liveness_check_interval_ms),
        None,
    );
    assert_eq!(gw.service().label(), Label::Offline);
    // Relay decision is kept; the mirror reads on for anything but idle.
    assert!(gw.service().state().relay_active);
    assert_eq!(gw.relay_state(), "1");
    assert!(gw.service().state().pending_command.is_empty());
    assert!(matches!(
        gw.sink().events.last(),
        Some(AppEvent::LabelChanged {
            from: Label::Someone,
            to: Label::Offline
        })
    ));

    // The next report brings it back.
    gw.report(&report(true));
    assert_eq!(gw.service().label(), Label::Someone);
}

// ── Audit trail ─────────────────────────────────────────────────

#[test]
fn each_label_change_is_logged_once() {
    let (mut gw, mut sched, clock, _) = setup();
    gw.report(&report(true));
    gw.report(&report(true));
    gw.report(&report(false));
    run_for(&mut gw, &mut sched, &clock, 10_000, Some(2_000));

    assert_eq!(
        gw.store().transitions(),
        vec![
            "server started",
            "status update: presence detected",
            "status update: light turning off soon",
        ]
    );
}

#[test]
fn startup_records_device_and_first_sample() {
    let (gw, _sched, _clock, config) = setup();
    let calls = &gw.store().calls;
    assert!(calls.contains(&StoreCall::Upsert {
        device_id: config.device_id.clone(),
        status: DeviceStatus::Idle,
    }));
    let history = gw.store().history();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].label, Label::Offline);
    assert_eq!(history[0].timestamp, T0);
}

#[test]
fn history_is_sampled_on_its_interval() {
    let (mut gw, mut sched, clock, config) = setup();
    gw.report(&report(true));
    run_for(&mut gw, &mut sched, &clock, 30_000, None);

    let history = gw.store().history();
    let expected = 1 + 30_000 / u64::from(config.history_sample_interval_ms);
    assert_eq!(history.len() as u64, expected);
    assert!(history[1..].iter().all(|s| s.label == Label::Someone));
}

#[test]
fn motion_report_flags_pending_action() {
    let (mut gw, _sched, _clock, _) = setup();
    gw.report(&report(true));
    assert!(gw.store().calls.contains(&StoreCall::Pending {
        device_id: "esp32_smart_guardian".into(),
        pending: true,
    }));
}

#[test]
fn storage_failures_never_undo_decisions() {
    let config = GuardianConfig::default();
    let clock = ManualClock::at(T0);
    let mut gw = Gateway::new(
        GuardianService::new(&config),
        RecordingStore::failing(StorageError::QueueFull),
        crate::mock_ports::RecordingSink::default(),
        clock.clone(),
    );
    gw.start();

    gw.report(&report(true));
    assert_eq!(gw.service().label(), Label::Someone);
    gw.command("keep_power", None).unwrap();
    assert!(gw.service().state().forced_mode);
    assert_eq!(gw.poll().0, Some(DeviceCommand::RelayOn));
}
