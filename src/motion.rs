//! Motion controller.
//!
//! Drives a planned move through the stepper driver as an explicit state
//! machine: `Idle → Enabling → Stepping → Disabling → Idle`.  The coils
//! are energised only for the duration of a move, and the direction line
//! is latched before the driver is enabled so the first pulse can never
//! step the wrong way.

use crate::app::events::AppEvent;
use crate::app::ports::{EventSink, StepperPort, StoragePort};
use crate::error::Result;
use crate::position::{MovePlan, PositionModel};

/// Where the controller is in the move sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionState {
    /// Coils released, no move in progress.
    Idle,
    /// Direction latched, driver being energised.
    Enabling,
    /// Pulses being emitted; `remaining` counts down to zero.
    Stepping { remaining: u32 },
    /// Pulses done, driver being released.
    Disabling,
}

/// Executes [`MovePlan`]s against the stepper hardware.
pub struct MotionController {
    state: MotionState,
}

impl MotionController {
    pub fn new() -> Self {
        Self {
            state: MotionState::Idle,
        }
    }

    pub fn state(&self) -> MotionState {
        self.state
    }

    /// Run a planned move to completion and durably commit the resulting
    /// position.
    ///
    /// Blocks for the duration of the move (the driver paces each pulse).
    /// A zero-step plan touches no hardware at all — the virtual target
    /// and remainder are still committed, which is how sub-step moves
    /// accumulate toward a real step.
    ///
    /// When this returns `Ok`, the motor has physically moved and the new
    /// position would survive an immediate power cut.
    pub fn execute(
        &mut self,
        plan: &MovePlan,
        model: &mut PositionModel,
        stepper: &mut impl StepperPort,
        storage: &mut impl StoragePort,
        sink: &mut impl EventSink,
    ) -> Result<()> {
        sink.emit(AppEvent::MoveStarted {
            from_deg: model.current_deg(),
            to_deg: plan.target_deg,
            steps: plan.steps,
        });

        if plan.steps > 0 {
            self.state = MotionState::Enabling;
            stepper.set_direction(plan.direction);
            stepper.set_enabled(true);

            self.state = MotionState::Stepping {
                remaining: plan.steps,
            };
            for remaining in (0..plan.steps).rev() {
                stepper.step_pulse();
                self.state = MotionState::Stepping { remaining };
            }

            self.state = MotionState::Disabling;
            stepper.set_enabled(false);
        }

        self.state = MotionState::Idle;
        model.commit(storage, plan)?;

        sink.emit(AppEvent::MoveCompleted {
            position_deg: model.current_deg(),
        });
        Ok(())
    }
}
