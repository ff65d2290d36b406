//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the ESP-IDF logger (UART / USB-CDC in production).  A future MQTT
//! adapter would implement the same trait.

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LogEventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: AppEvent) {
        match event {
            AppEvent::Started {
                restored_position_deg,
            } => {
                info!("START | position={:.2} deg", restored_position_deg);
            }
            AppEvent::MoveStarted {
                from_deg,
                to_deg,
                steps,
            } => {
                info!(
                    "MOVE  | {:.2} -> {:.2} deg ({} steps)",
                    from_deg, to_deg, steps
                );
            }
            AppEvent::MoveCompleted { position_deg } => {
                info!("MOVE  | done, position={:.2} deg", position_deg);
            }
            AppEvent::EventApplied {
                action,
                target_deg,
                scheduled_at,
            } => {
                info!(
                    "EVENT | {} -> {:.2} deg (scheduled_at={})",
                    action, target_deg, scheduled_at
                );
            }
            AppEvent::WatermarkAdvanced { scheduled_at } => {
                info!("MARK  | watermark={}", scheduled_at);
            }
            AppEvent::ScheduleRejected => {
                warn!("SCHED | signature rejected, document discarded");
            }
            AppEvent::FetchFailed => {
                warn!("SCHED | fetch failed");
            }
            AppEvent::ScheduleUnparseable => {
                warn!("SCHED | verified document unparseable");
            }
            AppEvent::ClockNotSynced => {
                warn!("SCHED | clock not synced, poll skipped");
            }
            AppEvent::PositionResynced { correction_deg } => {
                info!("SYNC  | encoder correction {:+.2} deg", correction_deg);
            }
            AppEvent::CalibrationSuspect {
                encoder_deg,
                expected_deg,
            } => {
                warn!(
                    "SYNC  | calibration suspect: encoder={:.2} expected={:.2} deg",
                    encoder_deg, expected_deg
                );
            }
        }
    }
}
