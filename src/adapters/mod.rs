//! Adapters: concrete implementations of the port traits in
//! [`crate::app::ports`], backed by ESP-IDF on target and by simulation
//! stand-ins on the host.

pub mod device_id;
pub mod http;
pub mod log_sink;
pub mod nvs;
pub mod time;
pub mod wifi;
