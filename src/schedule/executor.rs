//! Schedule executor — the poll-cycle state machine.
//!
//! One `run_cycle` call performs a complete poll: fetch the document and
//! its signature, authenticate, parse, select the due events, and drive
//! the motor through them.  Between calls the firmware sleeps for the
//! configured poll interval (or the fixed retry backoff after a failed
//! cycle).
//!
//! At-most-once execution is guaranteed by a persisted *watermark*: the
//! timestamp of the last applied event.  An event is due exactly when
//! `scheduled_at <= now && scheduled_at > watermark`, and the watermark
//! is committed to storage after every applied event before the next one
//! starts, so a reboot mid-batch can repeat nothing.

use crate::app::events::AppEvent;
use crate::app::ports::{
    ClockPort, ConnectivityPort, EncoderPort, EventSink, FetchPort, StepperPort, StoragePort,
};
use crate::config::SystemConfig;
use crate::error::{Error, FetchError, ParseError, Result, VerifyError};
use crate::motion::MotionController;
use crate::position::PositionModel;
use crate::schedule::document::{self, ScheduleEvent};
use crate::schedule::verify::ScheduleVerifier;

/// NVS key for the persisted execution watermark.
const WATERMARK_KEY: &str = "exec_watermark";

/// Where the executor is within (or after) a poll cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorState {
    /// Waiting for the next poll.
    Idle,
    /// Retrieving document and signature.
    Fetching,
    /// Authenticating the fetched payload.
    Verifying,
    /// Driving the motor through due events.
    Executing,
    /// Last cycle's payload failed authentication and was discarded.
    Rejected,
}

/// Result of one poll cycle, for the main loop to pick backoff timing
/// and for tests to assert on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// `n` events were applied to the motor.
    Applied(u32),
    /// Schedule valid, nothing due.
    NoneDue,
    /// SNTP has not set the clock; nothing was fetched.
    NotSynced,
    /// Retrieval failed.
    FetchFailed(FetchError),
    /// Signature verification failed; document discarded unread.
    Rejected(VerifyError),
    /// Authenticated document could not be decoded.
    ParseFailed(ParseError),
    /// A move failed mid-batch; watermark covers the applied prefix.
    MotionFailed,
}

/// Polls the remote schedule and executes whatever has come due.
pub struct ScheduleExecutor {
    state: ExecutorState,
    watermark: u64,
    namespace: heapless::String<15>,
    device_id: heapless::String<16>,
    config: SystemConfig,
}

impl ScheduleExecutor {
    /// Restore the executor from storage.  A missing or unreadable
    /// watermark starts at zero, which treats every past event as
    /// unexecuted — the catch-up run then walks the valve to its correct
    /// present position in order.
    pub fn load(
        storage: &impl StoragePort,
        namespace: &str,
        device_id: &str,
        config: SystemConfig,
    ) -> Result<Self> {
        let mut ns = heapless::String::new();
        ns.push_str(namespace)
            .map_err(|()| Error::Config("storage namespace too long"))?;
        let mut id = heapless::String::new();
        id.push_str(device_id)
            .map_err(|()| Error::Config("device id too long"))?;

        let mut buf = [0u8; 10];
        let watermark = match storage.get(namespace, WATERMARK_KEY, &mut buf) {
            Ok(n) => postcard::from_bytes::<u64>(&buf[..n]).unwrap_or_else(|_| {
                log::warn!("persisted watermark unreadable, restarting from zero");
                0
            }),
            Err(_) => 0,
        };

        Ok(Self {
            state: ExecutorState::Idle,
            watermark,
            namespace: ns,
            device_id: id,
            config,
        })
    }

    pub fn state(&self) -> ExecutorState {
        self.state
    }

    /// Timestamp of the last applied event (0 = nothing applied yet).
    pub fn watermark(&self) -> u64 {
        self.watermark
    }

    /// Run one complete poll cycle.
    ///
    /// Never propagates an error to the caller: every failure mode maps
    /// to a [`CycleOutcome`] so the main loop's only decision is how long
    /// to sleep before the next call.
    pub fn run_cycle(
        &mut self,
        verifier: &impl ScheduleVerifier,
        fetcher: &mut impl FetchPort,
        net: &impl ConnectivityPort,
        clock: &impl ClockPort,
        model: &mut PositionModel,
        motion: &mut MotionController,
        stepper: &mut impl StepperPort,
        storage: &mut impl StoragePort,
        sink: &mut impl EventSink,
    ) -> CycleOutcome {
        // Without wall-clock time, "due" is undecidable. Do not fetch.
        let Some(now) = clock.now_epoch_secs() else {
            self.state = ExecutorState::Idle;
            sink.emit(AppEvent::ClockNotSynced);
            return CycleOutcome::NotSynced;
        };

        self.state = ExecutorState::Fetching;
        if !net.is_connected() {
            self.state = ExecutorState::Idle;
            sink.emit(AppEvent::FetchFailed);
            return CycleOutcome::FetchFailed(FetchError::NotConnected);
        }

        let signature_url = self.config.signature_url();
        let payload = match fetcher.fetch(&self.config.schedule_url, &signature_url) {
            Ok(p) => p,
            Err(e) => {
                log::warn!("schedule fetch failed: {e}");
                self.state = ExecutorState::Idle;
                sink.emit(AppEvent::FetchFailed);
                return CycleOutcome::FetchFailed(e);
            }
        };

        self.state = ExecutorState::Verifying;
        let verified = match verifier.verify(&payload) {
            Ok(v) => v,
            Err(e) => {
                log::warn!("schedule rejected: {e}");
                self.state = ExecutorState::Rejected;
                sink.emit(AppEvent::ScheduleRejected);
                return CycleOutcome::Rejected(e);
            }
        };

        let doc = match document::parse_document(verified) {
            Ok(d) => d,
            Err(e) => {
                log::warn!("schedule unparseable: {e}");
                self.state = ExecutorState::Idle;
                sink.emit(AppEvent::ScheduleUnparseable);
                return CycleOutcome::ParseFailed(e);
            }
        };

        let events = document::events_for_device(
            &doc,
            &self.device_id,
            self.config.open_angle_deg,
            self.config.closed_angle_deg,
        );
        let due: Vec<ScheduleEvent> = events
            .into_iter()
            .filter(|e| e.scheduled_at <= now && e.scheduled_at > self.watermark)
            .collect();

        if due.is_empty() {
            self.state = ExecutorState::Idle;
            return CycleOutcome::NoneDue;
        }

        self.state = ExecutorState::Executing;
        let mut applied: u32 = 0;
        for event in &due {
            let plan = model.plan_move(event.target_deg);
            if let Err(e) = motion.execute(&plan, model, stepper, storage, sink) {
                log::error!("move failed mid-batch: {e}");
                self.state = ExecutorState::Idle;
                return CycleOutcome::MotionFailed;
            }
            sink.emit(AppEvent::EventApplied {
                action: event.action,
                target_deg: event.target_deg,
                scheduled_at: event.scheduled_at,
            });

            // Watermark must be durable before the next event runs.
            self.watermark = event.scheduled_at;
            if let Err(e) = self.persist_watermark(storage) {
                log::error!("watermark persist failed: {e}");
                self.state = ExecutorState::Idle;
                return CycleOutcome::MotionFailed;
            }
            sink.emit(AppEvent::WatermarkAdvanced {
                scheduled_at: event.scheduled_at,
            });
            applied += 1;
        }

        self.state = ExecutorState::Idle;
        CycleOutcome::Applied(applied)
    }

    fn persist_watermark(&self, storage: &mut impl StoragePort) -> Result<()> {
        let mut buf = [0u8; 10];
        let bytes = postcard::to_slice(&self.watermark, &mut buf)
            .map_err(|_| Error::Init("watermark encode failed"))?;
        storage
            .put(&self.namespace, WATERMARK_KEY, bytes)
            .map_err(|_| Error::Init("watermark storage write failed"))?;
        Ok(())
    }
}

/// Paces encoder drift correction between poll cycles.
///
/// A correction is attempted only every `interval_polls` cycles, and only
/// after a clean cycle (once `run_cycle` has returned, no move can still be
/// in progress).  A failed encoder read skips the correction for that round
/// entirely: the physical angle is unknown, so nothing may be folded in.
pub struct ResyncPolicy {
    interval_polls: u32,
    tolerance_deg: f32,
    polls_since: u32,
}

impl ResyncPolicy {
    /// `interval_polls == 0` disables correction permanently.
    pub fn new(interval_polls: u32, tolerance_deg: f32) -> Self {
        Self {
            interval_polls,
            tolerance_deg,
            polls_since: 0,
        }
    }

    /// Account for one finished poll cycle and run the correction when it
    /// is due.  Returns the applied correction, if any.
    pub fn after_cycle(
        &mut self,
        outcome: &CycleOutcome,
        encoder: &mut impl EncoderPort,
        model: &mut PositionModel,
        storage: &mut impl StoragePort,
        sink: &mut impl EventSink,
    ) -> Option<f32> {
        if self.interval_polls == 0 {
            return None;
        }
        self.polls_since += 1;
        if self.polls_since < self.interval_polls {
            return None;
        }
        if !matches!(outcome, CycleOutcome::Applied(_) | CycleOutcome::NoneDue) {
            return None;
        }
        self.polls_since = 0;

        let encoder_deg = match encoder.read_angle_deg() {
            Ok(deg) => deg,
            Err(e) => {
                log::warn!("resync encoder read failed: {e}");
                return None;
            }
        };
        match model.resync(storage, encoder_deg, self.tolerance_deg) {
            Ok(Some(correction_deg)) => {
                sink.emit(AppEvent::PositionResynced { correction_deg });
                Some(correction_deg)
            }
            Ok(None) => None,
            Err(e) => {
                log::warn!("resync persist failed: {e}");
                None
            }
        }
    }
}
