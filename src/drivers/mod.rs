//! Hardware drivers: peripheral bring-up, the stepper driver, and the
//! task watchdog.

pub mod hw_init;
pub mod stepper;
pub mod watchdog;
