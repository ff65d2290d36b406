//! Application core: hardware-independent domain logic.
//!
//! The modules in here never touch ESP-IDF directly.  Hardware, storage,
//! time and network access all arrive through the port traits in
//! [`ports`], so the entire application layer compiles and tests on the
//! host.

pub mod events;
pub mod ports;
