//! PD-Stepper firmware library.
//!
//! Exposes the pure-logic modules for integration testing and external
//! inspection.  All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module, so the whole
//! library compiles and tests on the host.

#![deny(unused_must_use)]

pub mod app;
pub mod config;
pub mod error;
pub mod motion;
pub mod pins;
pub mod position;
pub mod schedule;

pub mod adapters;
pub mod drivers;
pub mod sensors;
