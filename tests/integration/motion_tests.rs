//! Motion + position integration: planned moves driven through the mock
//! stepper with persistence checked across simulated reboots.

use pdstepper::app::ports::{EncoderPort, StepDirection};
use pdstepper::motion::MotionController;
use pdstepper::position::PositionModel;

use crate::mock_hw::{MockEncoder, MockStepper, MockStorage, RecordingSink, StepperCall};

const DEVICE: &str = "pd01";

fn rig() -> (PositionModel, MotionController, MockStepper, MockStorage, RecordingSink) {
    let storage = MockStorage::new();
    let model = PositionModel::load(&storage, DEVICE, 0.9, 0.0).unwrap();
    (
        model,
        MotionController::new(),
        MockStepper::new(),
        storage,
        RecordingSink::new(),
    )
}

#[test]
fn full_traverse_is_1600_steps_each_way() {
    let (mut model, mut motion, mut stepper, mut storage, mut sink) = rig();

    let plan = model.plan_move(1440.0);
    motion
        .execute(&plan, &mut model, &mut stepper, &mut storage, &mut sink)
        .unwrap();
    assert_eq!(stepper.pulse_count(), 1600);
    assert_eq!(stepper.calls[0], StepperCall::Dir(StepDirection::Forward));

    stepper.calls.clear();
    let plan = model.plan_move(0.0);
    motion
        .execute(&plan, &mut model, &mut stepper, &mut storage, &mut sink)
        .unwrap();
    assert_eq!(stepper.pulse_count(), 1600);
    assert_eq!(stepper.calls[0], StepperCall::Dir(StepDirection::Reverse));

    // coils released at the end of each move
    assert_eq!(stepper.calls.last(), Some(&StepperCall::Enable(false)));
}

#[test]
fn fractional_targets_never_drift_more_than_one_step() {
    let (mut model, mut motion, mut stepper, mut storage, mut sink) = rig();

    // Walk through targets that are not step multiples; the carried
    // remainder keeps total emitted steps within one step of ideal.
    let targets = [10.0_f32, 20.5, 31.7, 45.2, 100.0];
    for &t in &targets {
        let plan = model.plan_move(t);
        motion
            .execute(&plan, &mut model, &mut stepper, &mut storage, &mut sink)
            .unwrap();
    }

    let ideal_steps = 100.0 / 0.9;
    let emitted = stepper.pulse_count() as f32;
    assert!(
        (emitted - ideal_steps).abs() < 1.0,
        "emitted {emitted} vs ideal {ideal_steps}"
    );
    assert!(model.remainder_deg().abs() < 0.9);
}

#[test]
fn position_and_remainder_survive_reboot() {
    let (mut model, mut motion, mut stepper, mut storage, mut sink) = rig();

    let plan = model.plan_move(100.0);
    motion
        .execute(&plan, &mut model, &mut stepper, &mut storage, &mut sink)
        .unwrap();
    let rem_before = model.remainder_deg();

    let restored = PositionModel::load(&storage, DEVICE, 0.9, 0.0).unwrap();
    assert!((restored.current_deg() - 100.0).abs() < 1e-4);
    assert!((restored.remainder_deg() - rem_before).abs() < 1e-4);

    // a restored model plans the follow-up exactly as the original would
    let plan_a = restored.plan_move(200.0);
    let plan_b = model.plan_move(200.0);
    assert_eq!(plan_a.steps, plan_b.steps);
    assert_eq!(plan_a.direction, plan_b.direction);
}

#[test]
fn boot_disagreement_check_through_encoder_port() {
    let (mut model, mut motion, mut stepper, mut storage, mut sink) = rig();

    // four full turns: the shaft should read 0 again
    let plan = model.plan_move(1440.0);
    motion
        .execute(&plan, &mut model, &mut stepper, &mut storage, &mut sink)
        .unwrap();

    let mut encoder = MockEncoder::at(90.0);
    let err = model.shaft_disagreement_deg(encoder.read_angle_deg().unwrap());
    assert!((err - 90.0).abs() < 1e-3);

    // an unreadable encoder must surface as an error, not as an angle
    let mut encoder = MockEncoder::failing();
    assert!(encoder.read_angle_deg().is_err());
}

#[test]
fn resync_correction_is_durable() {
    let (mut model, mut motion, mut stepper, mut storage, mut sink) = rig();

    let plan = model.plan_move(721.0);
    motion
        .execute(&plan, &mut model, &mut stepper, &mut storage, &mut sink)
        .unwrap();

    // encoder says the shaft sits 2 degrees behind where the model thinks
    let corr = model.resync(&mut storage, 359.0, 1.0).unwrap();
    assert!((corr.unwrap() + 2.0).abs() < 1e-3);

    let restored = PositionModel::load(&storage, DEVICE, 0.9, 0.0).unwrap();
    assert!((restored.current_deg() - 719.0).abs() < 1e-3);
}
