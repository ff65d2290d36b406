//! System configuration parameters
//!
//! All tunable parameters for the PD-Stepper system.
//! Values can be overridden via NVS (non-volatile storage).

use serde::{Deserialize, Serialize};

/// Core system configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    // --- Schedule source ---
    /// URL of the published schedule document.
    pub schedule_url: heapless::String<128>,
    /// Suffix appended to `schedule_url` to derive the detached
    /// signature location.
    pub signature_suffix: heapless::String<16>,
    /// Override for the MAC-derived device identifier.  Empty = use the
    /// derived one.
    pub device_id_override: heapless::String<16>,

    // --- Calibration ---
    /// Degrees of virtual angle per motor step.  Must be > 0.
    pub step_to_deg: f32,
    /// Virtual angle of the fully-closed position (degrees).
    pub closed_angle_deg: f32,
    /// Virtual angle of the fully-open position (degrees).
    pub open_angle_deg: f32,

    // --- Motion ---
    /// Half-period of one step pulse in microseconds.  The STEP line is
    /// held high for this long, then low for the same — together they
    /// define the fixed maximum step rate.
    pub step_pulse_half_period_us: u32,

    // --- Polling ---
    /// Seconds between successful schedule polls.
    pub poll_interval_secs: u32,
    /// Fixed delay after a failed fetch/verify/parse before the next
    /// poll.  No exponential growth, no jitter.
    pub retry_backoff_secs: u32,

    // --- Encoder resynchronization ---
    /// Run an encoder-based position resync every N poll cycles
    /// (0 = never).
    pub resync_interval_polls: u32,
    /// Minimum encoder/virtual disagreement (degrees) before a
    /// correction is applied.
    pub resync_tolerance_deg: f32,
}

impl Default for SystemConfig {
    fn default() -> Self {
        let mut schedule_url = heapless::String::new();
        let _ = schedule_url.push_str(
            "https://raw.githubusercontent.com/jordan77-lang/irrigation-Automation/main/schedules/schedules.json",
        );
        let mut signature_suffix = heapless::String::new();
        let _ = signature_suffix.push_str(".sig");

        Self {
            schedule_url,
            signature_suffix,
            device_id_override: heapless::String::new(),

            // Calibration: 0.9°/step = 400 steps/rev (half-stepped 200-step motor)
            step_to_deg: 0.9,
            closed_angle_deg: 0.0,
            open_angle_deg: 1440.0, // 4 full turns

            // Motion: 500 µs half-period = 1 kHz maximum step rate
            step_pulse_half_period_us: 500,

            // Polling
            poll_interval_secs: 60,
            retry_backoff_secs: 60,

            // Resync: every 10 polls, correct when off by 2+ steps
            resync_interval_polls: 10,
            resync_tolerance_deg: 1.8,
        }
    }
}

impl SystemConfig {
    /// Derived location of the detached signature resource.
    pub fn signature_url(&self) -> heapless::String<144> {
        let mut url = heapless::String::new();
        let _ = url.push_str(&self.schedule_url);
        let _ = url.push_str(&self.signature_suffix);
        url
    }
}
