//! Application events.
//!
//! Everything noteworthy the firmware does is announced as an `AppEvent`
//! through the [`EventSink`](super::ports::EventSink) port.  In production
//! the sink renders them through the `log` facade; in tests a recording
//! sink asserts on the exact sequence.

use crate::schedule::document::Action;

/// Notable application occurrences.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AppEvent {
    /// Firmware finished boot recovery and entered the main loop.
    Started {
        /// Virtual position restored from storage (degrees).
        restored_position_deg: f32,
    },

    /// A motion command began.
    MoveStarted {
        from_deg: f32,
        to_deg: f32,
        steps: u32,
    },
    /// The motion completed and the new position is durable.
    MoveCompleted { position_deg: f32 },

    /// A scheduled event was applied to the motor.
    EventApplied {
        action: Action,
        target_deg: f32,
        scheduled_at: u64,
    },
    /// The execution watermark advanced past `scheduled_at`.
    WatermarkAdvanced { scheduled_at: u64 },

    /// A fetched schedule failed signature verification and was discarded.
    ScheduleRejected,
    /// The schedule could not be retrieved this cycle.
    FetchFailed,
    /// A verified schedule arrived but could not be decoded.
    ScheduleUnparseable,
    /// A poll cycle ran before SNTP had set the clock; nothing executed.
    ClockNotSynced,

    /// Encoder feedback corrected the virtual position.
    PositionResynced {
        /// Signed correction that was applied (degrees).
        correction_deg: f32,
    },
    /// Boot-time encoder check found a large physical/virtual mismatch.
    CalibrationSuspect {
        encoder_deg: f32,
        expected_deg: f32,
    },
}
