//! Virtual position model.
//!
//! The motor has no absolute reference over its multi-turn travel, so the
//! firmware tracks a *virtual* angle in degrees: 0° = fully closed, with
//! the open position several full turns away.  The model converts angle
//! deltas into whole step counts, carries the sub-step remainder across
//! moves so rounding error never accumulates, and persists its state so a
//! power cut cannot lose the valve position.

use crate::app::ports::{StepDirection, StoragePort};
use crate::error::{Error, Result};

/// NVS key for the persisted `(position, remainder)` pair.
const POSITION_KEY: &str = "virtual_pos";

/// Outcome of planning a move: everything the motion controller needs to
/// drive the motor, plus the bookkeeping to commit afterwards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MovePlan {
    /// Direction the motor must turn.
    pub direction: StepDirection,
    /// Whole pulses to emit.
    pub steps: u32,
    /// Virtual angle the model will report after commit.
    pub target_deg: f32,
    /// Sub-step remainder carried into the next plan.
    remainder_after_deg: f32,
}

/// Multi-turn virtual angle with persistent sub-step remainder.
pub struct PositionModel {
    current_deg: f32,
    remainder_deg: f32,
    step_to_deg: f32,
    namespace: heapless::String<15>,
}

impl PositionModel {
    /// Restore the model from storage, falling back to `default_deg`
    /// (normally the closed angle) when nothing has been persisted yet or
    /// the stored record cannot be decoded.
    ///
    /// Fails fast on a non-positive step ratio: every later conversion
    /// would divide by it.
    pub fn load(
        storage: &impl StoragePort,
        namespace: &str,
        step_to_deg: f32,
        default_deg: f32,
    ) -> Result<Self> {
        if !(step_to_deg > 0.0) {
            return Err(Error::Config("step_to_deg must be > 0"));
        }
        let mut ns = heapless::String::new();
        ns.push_str(namespace)
            .map_err(|()| Error::Config("storage namespace too long"))?;

        let mut buf = [0u8; 16];
        let (current_deg, remainder_deg) = match storage.get(namespace, POSITION_KEY, &mut buf) {
            Ok(n) => match postcard::from_bytes::<(f32, f32)>(&buf[..n]) {
                Ok(pair) => pair,
                Err(_) => {
                    log::warn!(
                        "persisted position unreadable, assuming closed ({default_deg:.1} deg)"
                    );
                    (default_deg, 0.0)
                }
            },
            Err(_) => {
                log::info!("no persisted position, assuming closed ({default_deg:.1} deg)");
                (default_deg, 0.0)
            }
        };

        Ok(Self {
            current_deg,
            remainder_deg,
            step_to_deg,
            namespace: ns,
        })
    }

    /// Current virtual angle in degrees.
    pub fn current_deg(&self) -> f32 {
        self.current_deg
    }

    /// Sub-step remainder carried from previous moves, in degrees.
    pub fn remainder_deg(&self) -> f32 {
        self.remainder_deg
    }

    /// Plan a move to `target_deg`.  Pure: no state changes until
    /// [`commit`](Self::commit).
    ///
    /// The carried remainder is folded into the delta before quantising,
    /// so repeated small moves converge on the commanded angle instead of
    /// drifting by up to one step per move.
    pub fn plan_move(&self, target_deg: f32) -> MovePlan {
        let effective_deg = (target_deg - self.current_deg) + self.remainder_deg;
        let direction = if effective_deg >= 0.0 {
            StepDirection::Forward
        } else {
            StepDirection::Reverse
        };
        let steps = (effective_deg.abs() / self.step_to_deg).floor() as u32;
        let travelled_deg = match direction {
            StepDirection::Forward => steps as f32 * self.step_to_deg,
            StepDirection::Reverse => -(steps as f32) * self.step_to_deg,
        };
        MovePlan {
            direction,
            steps,
            target_deg,
            remainder_after_deg: effective_deg - travelled_deg,
        }
    }

    /// Adopt a completed move and persist the new state durably.
    ///
    /// Called only after every pulse of the plan has been emitted.  When
    /// this returns `Ok` the position survives an immediate power cut.
    pub fn commit(&mut self, storage: &mut impl StoragePort, plan: &MovePlan) -> Result<()> {
        self.current_deg = plan.target_deg;
        self.remainder_deg = plan.remainder_after_deg;
        self.persist(storage)
    }

    /// Signed difference between the encoder reading and where the model
    /// expects the shaft to be, wrapped to `[-180, 180)` degrees.
    pub fn shaft_disagreement_deg(&self, encoder_deg: f32) -> f32 {
        let expected = self.current_deg.rem_euclid(360.0);
        let mut err = encoder_deg - expected;
        while err >= 180.0 {
            err -= 360.0;
        }
        while err < -180.0 {
            err += 360.0;
        }
        err
    }

    /// Fold encoder feedback into the virtual position.
    ///
    /// The encoder only sees the shaft modulo one revolution, so the
    /// correction is the minimal wrapped disagreement — whole missed turns
    /// are invisible here and are the job of the boot calibration check.
    /// Corrections within `tolerance_deg` are ignored (encoder noise),
    /// and the remainder is cleared because the correction supersedes it.
    ///
    /// Returns the applied correction, or `None` when within tolerance.
    pub fn resync(
        &mut self,
        storage: &mut impl StoragePort,
        encoder_deg: f32,
        tolerance_deg: f32,
    ) -> Result<Option<f32>> {
        let err = self.shaft_disagreement_deg(encoder_deg);
        if err.abs() <= tolerance_deg {
            return Ok(None);
        }
        self.current_deg += err;
        self.remainder_deg = 0.0;
        self.persist(storage)?;
        Ok(Some(err))
    }

    fn persist(&self, storage: &mut impl StoragePort) -> Result<()> {
        let mut buf = [0u8; 16];
        let bytes = postcard::to_slice(&(self.current_deg, self.remainder_deg), &mut buf)
            .map_err(|_| Error::Init("position encode failed"))?;
        storage
            .put(&self.namespace, POSITION_KEY, bytes)
            .map_err(|_| Error::Init("position storage write failed"))?;
        Ok(())
    }
}
