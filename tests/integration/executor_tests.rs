//! End-to-end executor tests: fetch → verify → parse → execute against
//! mock adapters, including restart/replay behaviour.

use pdstepper::app::events::AppEvent;
use pdstepper::config::SystemConfig;
use pdstepper::error::{FetchError, ParseError, VerifyError};
use pdstepper::motion::MotionController;
use pdstepper::position::PositionModel;
use pdstepper::schedule::document::Action;
use pdstepper::schedule::executor::{CycleOutcome, ExecutorState, ResyncPolicy, ScheduleExecutor};
use pdstepper::schedule::verify::HmacSha256Verifier;

use crate::mock_hw::{
    FixedClock, FixedLink, MockEncoder, MockFetcher, MockStepper, MockStorage, RecordingSink,
    TEST_KEY, missigned_payload, signed_payload,
};

const DEVICE: &str = "pd01";

// 2026-08-01T06:00:00Z and 06:30:00Z
const T_OPEN: u64 = 1_785_564_000;
const T_CLOSE: u64 = T_OPEN + 1800;

fn schedule_json() -> String {
    r#"{
        "generated_at": "2026-08-01T00:00:00Z",
        "devices": {
            "pd01": [
                {"id": "pd01-20260801T063000-close", "action": "close",
                 "time": "2026-08-01T06:30:00Z",
                 "virtual_angle": 0.0, "expected_duration_s": 30},
                {"id": "pd01-20260801T060000-open", "action": "open",
                 "time": "2026-08-01T06:00:00Z",
                 "virtual_angle": 1440.0, "expected_duration_s": 5400}
            ]
        }
    }"#
    .to_string()
}

struct Rig {
    verifier: HmacSha256Verifier,
    fetcher: MockFetcher,
    link: FixedLink,
    clock: FixedClock,
    model: PositionModel,
    motion: MotionController,
    stepper: MockStepper,
    storage: MockStorage,
    sink: RecordingSink,
    executor: ScheduleExecutor,
}

fn rig(now: Option<u64>) -> Rig {
    let storage = MockStorage::new();
    let config = SystemConfig::default();
    let model = PositionModel::load(&storage, DEVICE, config.step_to_deg, 0.0).unwrap();
    let executor = ScheduleExecutor::load(&storage, DEVICE, DEVICE, config).unwrap();
    Rig {
        verifier: HmacSha256Verifier::new(TEST_KEY).unwrap(),
        fetcher: MockFetcher::new(),
        link: FixedLink { connected: true },
        clock: FixedClock { now },
        model,
        motion: MotionController::new(),
        stepper: MockStepper::new(),
        storage,
        sink: RecordingSink::new(),
        executor,
    }
}

impl Rig {
    fn run(&mut self) -> CycleOutcome {
        self.executor.run_cycle(
            &self.verifier,
            &mut self.fetcher,
            &self.link,
            &self.clock,
            &mut self.model,
            &mut self.motion,
            &mut self.stepper,
            &mut self.storage,
            &mut self.sink,
        )
    }
}

#[test]
fn applies_due_events_in_chronological_order() {
    let mut r = rig(Some(T_CLOSE + 60));
    r.fetcher.push(Ok(signed_payload(&schedule_json())));

    let outcome = r.run();
    assert_eq!(outcome, CycleOutcome::Applied(2));
    assert_eq!(r.executor.state(), ExecutorState::Idle);

    // open (1600 steps out) then close (1600 back): both full traverses
    assert_eq!(r.stepper.pulse_count(), 3200);
    // valve ends closed
    assert!(r.model.current_deg().abs() < 1e-3);

    // the document lists close first; execution must still be open first
    let applied: Vec<Action> = r
        .sink
        .events
        .iter()
        .filter_map(|e| match e {
            AppEvent::EventApplied { action, .. } => Some(*action),
            _ => None,
        })
        .collect();
    assert_eq!(applied, vec![Action::Open, Action::Close]);

    assert_eq!(r.executor.watermark(), T_CLOSE);
    assert!(r.storage.contains(DEVICE, "exec_watermark"));
}

#[test]
fn tampered_document_is_rejected_without_motion() {
    let mut r = rig(Some(T_CLOSE + 60));
    r.fetcher.push(Ok(missigned_payload(&schedule_json())));

    let outcome = r.run();
    assert_eq!(
        outcome,
        CycleOutcome::Rejected(VerifyError::SignatureMismatch)
    );
    assert_eq!(r.executor.state(), ExecutorState::Rejected);
    assert!(r.stepper.calls.is_empty());
    assert_eq!(r.executor.watermark(), 0);
    assert!(r.sink.events.contains(&AppEvent::ScheduleRejected));
}

#[test]
fn flipped_document_byte_is_rejected() {
    let mut r = rig(Some(T_CLOSE + 60));
    let mut payload = signed_payload(&schedule_json());
    payload.document[10] ^= 0x40;
    r.fetcher.push(Ok(payload));

    assert_eq!(
        r.run(),
        CycleOutcome::Rejected(VerifyError::SignatureMismatch)
    );
    assert!(r.stepper.calls.is_empty());
}

#[test]
fn unsynced_clock_skips_fetch_entirely() {
    let mut r = rig(None);
    r.fetcher.push(Ok(signed_payload(&schedule_json())));

    assert_eq!(r.run(), CycleOutcome::NotSynced);
    assert_eq!(r.fetcher.calls, 0);
    assert!(r.stepper.calls.is_empty());
    assert!(r.sink.events.contains(&AppEvent::ClockNotSynced));
}

#[test]
fn disconnected_link_fails_fast() {
    let mut r = rig(Some(T_CLOSE + 60));
    r.link.connected = false;
    r.fetcher.push(Ok(signed_payload(&schedule_json())));

    assert_eq!(
        r.run(),
        CycleOutcome::FetchFailed(FetchError::NotConnected)
    );
    assert_eq!(r.fetcher.calls, 0);
}

#[test]
fn future_events_are_not_due() {
    let mut r = rig(Some(T_OPEN - 60));
    r.fetcher.push(Ok(signed_payload(&schedule_json())));

    assert_eq!(r.run(), CycleOutcome::NoneDue);
    assert!(r.stepper.calls.is_empty());
    assert_eq!(r.executor.watermark(), 0);
}

#[test]
fn restart_does_not_replay_executed_events() {
    let mut r = rig(Some(T_CLOSE + 60));
    r.fetcher.push(Ok(signed_payload(&schedule_json())));
    assert_eq!(r.run(), CycleOutcome::Applied(2));
    let position_after = r.model.current_deg();

    // Simulated reboot: rebuild the whole stack from the same storage.
    let config = SystemConfig::default();
    let mut model =
        PositionModel::load(&r.storage, DEVICE, config.step_to_deg, 0.0).unwrap();
    let mut executor = ScheduleExecutor::load(&r.storage, DEVICE, DEVICE, config).unwrap();
    assert_eq!(executor.watermark(), T_CLOSE);
    assert!((model.current_deg() - position_after).abs() < 1e-4);

    let mut fetcher = MockFetcher::new();
    fetcher.push(Ok(signed_payload(&schedule_json())));
    let mut stepper = MockStepper::new();
    let mut sink = RecordingSink::new();
    let outcome = executor.run_cycle(
        &r.verifier,
        &mut fetcher,
        &FixedLink { connected: true },
        &FixedClock {
            now: Some(T_CLOSE + 120),
        },
        &mut model,
        &mut MotionController::new(),
        &mut stepper,
        &mut r.storage,
        &mut sink,
    );
    assert_eq!(outcome, CycleOutcome::NoneDue);
    assert!(stepper.calls.is_empty());
}

#[test]
fn event_exactly_at_watermark_is_not_reexecuted() {
    let mut r = rig(Some(T_CLOSE + 60));
    r.fetcher.push(Ok(signed_payload(&schedule_json())));
    assert_eq!(r.run(), CycleOutcome::Applied(2));

    // second poll with the same document: both events <= watermark now
    r.fetcher.push(Ok(signed_payload(&schedule_json())));
    r.stepper.calls.clear();
    assert_eq!(r.run(), CycleOutcome::NoneDue);
    assert!(r.stepper.calls.is_empty());
}

#[test]
fn verified_garbage_is_a_parse_failure() {
    let mut r = rig(Some(T_CLOSE + 60));
    r.fetcher.push(Ok(signed_payload("this is not json")));

    assert_eq!(r.run(), CycleOutcome::ParseFailed(ParseError::BadJson));
    assert!(r.stepper.calls.is_empty());
    assert!(r.sink.events.contains(&AppEvent::ScheduleUnparseable));
}

#[test]
fn fetch_failure_backs_off_without_state_change() {
    let mut r = rig(Some(T_CLOSE + 60));
    r.fetcher.push(Err(FetchError::DocumentStatus(500)));

    assert_eq!(
        r.run(),
        CycleOutcome::FetchFailed(FetchError::DocumentStatus(500))
    );
    assert_eq!(r.executor.state(), ExecutorState::Idle);
    assert_eq!(r.executor.watermark(), 0);
}

#[test]
fn storage_failure_midbatch_keeps_applied_prefix() {
    let mut r = rig(Some(T_CLOSE + 60));
    r.fetcher.push(Ok(signed_payload(&schedule_json())));
    // First event needs two puts (position commit + watermark); the
    // third put — the second event's position commit — fails.
    r.storage.fail_puts_after = Some(2);

    assert_eq!(r.run(), CycleOutcome::MotionFailed);
    assert_eq!(r.executor.watermark(), T_OPEN);
    // the motor physically completed the close before the commit failed
    assert_eq!(r.stepper.pulse_count(), 3200);

    // After storage recovers, only the close event remains due, and the
    // in-memory model already sits at its target: no duplicate motion.
    r.storage.fail_puts_after = None;
    r.fetcher.push(Ok(signed_payload(&schedule_json())));
    r.stepper.calls.clear();
    assert_eq!(r.run(), CycleOutcome::Applied(1));
    assert_eq!(r.executor.watermark(), T_CLOSE);
    assert_eq!(r.stepper.pulse_count(), 0);
}

#[test]
fn failed_encoder_read_skips_drift_correction() {
    let mut r = rig(Some(T_CLOSE + 60));
    r.fetcher.push(Ok(signed_payload(&schedule_json())));
    assert_eq!(r.run(), CycleOutcome::Applied(2));
    let before = r.model.current_deg();

    // correction due this cycle, but the bus is down: nothing changes
    let mut policy = ResyncPolicy::new(1, 1.0);
    let mut encoder = MockEncoder::failing();
    let corr = policy.after_cycle(
        &CycleOutcome::NoneDue,
        &mut encoder,
        &mut r.model,
        &mut r.storage,
        &mut r.sink,
    );
    assert_eq!(corr, None);
    assert!((r.model.current_deg() - before).abs() < 1e-6);
    assert!(
        !r.sink
            .events
            .iter()
            .any(|e| matches!(e, AppEvent::PositionResynced { .. }))
    );

    // once the encoder recovers (reading 2 deg behind), correction lands
    let mut encoder = MockEncoder::at(358.0);
    let corr = policy.after_cycle(
        &CycleOutcome::NoneDue,
        &mut encoder,
        &mut r.model,
        &mut r.storage,
        &mut r.sink,
    );
    assert!((corr.unwrap() + 2.0).abs() < 1e-3);
    assert!((r.model.current_deg() - (before - 2.0)).abs() < 1e-3);
    assert!(
        r.sink
            .events
            .iter()
            .any(|e| matches!(e, AppEvent::PositionResynced { .. }))
    );
}

#[test]
fn resync_waits_for_interval_and_clean_cycle() {
    let mut storage = MockStorage::new();
    let mut model = PositionModel::load(&storage, DEVICE, 0.9, 0.0).unwrap();
    let mut sink = RecordingSink::new();
    let mut encoder = MockEncoder::at(90.0); // 90 deg of drift, always visible
    let mut policy = ResyncPolicy::new(3, 1.0);

    // first two cycles: interval not yet reached
    for _ in 0..2 {
        let corr = policy.after_cycle(
            &CycleOutcome::NoneDue,
            &mut encoder,
            &mut model,
            &mut storage,
            &mut sink,
        );
        assert_eq!(corr, None);
    }

    // interval reached, but the cycle was not clean: attempt deferred
    let corr = policy.after_cycle(
        &CycleOutcome::FetchFailed(FetchError::Transport),
        &mut encoder,
        &mut model,
        &mut storage,
        &mut sink,
    );
    assert_eq!(corr, None);
    assert!(model.current_deg().abs() < 1e-6);

    // next clean cycle runs the deferred correction
    let corr = policy.after_cycle(
        &CycleOutcome::NoneDue,
        &mut encoder,
        &mut model,
        &mut storage,
        &mut sink,
    );
    assert!((corr.unwrap() - 90.0).abs() < 1e-3);
    assert!((model.current_deg() - 90.0).abs() < 1e-3);
}

#[test]
fn zero_interval_disables_resync() {
    let mut storage = MockStorage::new();
    let mut model = PositionModel::load(&storage, DEVICE, 0.9, 0.0).unwrap();
    let mut sink = RecordingSink::new();
    let mut encoder = MockEncoder::at(180.0);
    let mut policy = ResyncPolicy::new(0, 1.0);

    for _ in 0..5 {
        let corr = policy.after_cycle(
            &CycleOutcome::NoneDue,
            &mut encoder,
            &mut model,
            &mut storage,
            &mut sink,
        );
        assert_eq!(corr, None);
    }
    assert!(model.current_deg().abs() < 1e-6);
}

#[test]
fn events_for_other_devices_are_ignored() {
    let mut r = rig(Some(T_CLOSE + 60));
    let json = r#"{"devices": {"pd99": [
        {"action": "open", "time": "2026-08-01T06:00:00Z", "virtual_angle": 1440.0}
    ]}}"#;
    r.fetcher.push(Ok(signed_payload(json)));

    assert_eq!(r.run(), CycleOutcome::NoneDue);
    assert!(r.stepper.calls.is_empty());
}
