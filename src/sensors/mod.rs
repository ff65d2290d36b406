//! Sensor drivers.

pub mod encoder;
