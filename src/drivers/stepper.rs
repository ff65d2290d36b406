//! TMC2209 stepper driver — step/dir/enable in standalone mode.
//!
//! Pulse pacing lives here, not in the motion controller: each
//! `step_pulse` call busy-waits the STEP line high and low for the
//! configured half-period, giving a fixed step rate regardless of how
//! fast the caller loops.  At the default 500 µs half-period that is
//! 1000 steps/s.

use crate::app::ports::{StepDirection, StepperPort};
use crate::drivers::hw_init;
use crate::pins;

/// Step/dir/enable driver for the TMC2209 in standalone mode.
pub struct Tmc2209Driver {
    half_period_us: u32,
    enabled: bool,
}

impl Tmc2209Driver {
    pub fn new(half_period_us: u32) -> Self {
        Self {
            half_period_us,
            enabled: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

impl StepperPort for Tmc2209Driver {
    fn set_direction(&mut self, dir: StepDirection) {
        hw_init::gpio_write(pins::TMC2209_DIR_GPIO, dir == StepDirection::Forward);
    }

    fn set_enabled(&mut self, enabled: bool) {
        // EN is active-low: LOW energises the coils.
        hw_init::gpio_write(pins::TMC2209_EN_GPIO, !enabled);
        self.enabled = enabled;
    }

    fn step_pulse(&mut self) {
        hw_init::gpio_write(pins::TMC2209_STEP_GPIO, true);
        delay_us(self.half_period_us);
        hw_init::gpio_write(pins::TMC2209_STEP_GPIO, false);
        delay_us(self.half_period_us);
    }
}

#[cfg(target_os = "espidf")]
fn delay_us(us: u32) {
    // SAFETY: esp_rom_delay_us is a calibrated busy-wait; safe from the
    // main task.
    unsafe { esp_idf_svc::sys::esp_rom_delay_us(us) };
}

#[cfg(not(target_os = "espidf"))]
fn delay_us(_us: u32) {}
