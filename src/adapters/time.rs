//! ESP32 time adapter.
//!
//! Implements [`ClockPort`]:
//!
//! - **`target_os = "espidf"`** — wall clock from `gettimeofday()` (set
//!   by SNTP), monotonic uptime from `esp_timer_get_time()`.
//! - **`not(target_os = "espidf")`** — `std::time` for host-side tests.
//!
//! Until SNTP has run, the ESP32 system clock reads as 1970; that must
//! never leak out as a real time, so anything before 2020-01-01 is
//! reported as "not synced".

use crate::app::ports::ClockPort;

/// Any wall-clock reading before this is treated as unsynced.
const EPOCH_2020: i64 = 1_577_836_800;

/// Time adapter for the ESP32-S3 platform.
pub struct Esp32TimeAdapter {
    #[cfg(not(target_os = "espidf"))]
    start: std::time::Instant,
}

impl Default for Esp32TimeAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl Esp32TimeAdapter {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            start: std::time::Instant::now(),
        }
    }

    /// Start the SNTP client.  The system clock updates in the background;
    /// [`ClockPort::now_epoch_secs`] returns `Some` once the first sync
    /// lands.
    #[cfg(target_os = "espidf")]
    pub fn start_sntp(&self) -> Option<esp_idf_svc::sntp::EspSntp<'static>> {
        match esp_idf_svc::sntp::EspSntp::new_default() {
            Ok(sntp) => {
                log::info!("SNTP client started");
                Some(sntp)
            }
            Err(e) => {
                log::warn!("SNTP start failed: {e}");
                None
            }
        }
    }
}

impl ClockPort for Esp32TimeAdapter {
    #[cfg(target_os = "espidf")]
    fn now_epoch_secs(&self) -> Option<u64> {
        use core::ptr;
        let mut tv = esp_idf_svc::sys::timeval {
            tv_sec: 0,
            tv_usec: 0,
        };
        if unsafe { esp_idf_svc::sys::gettimeofday(&mut tv, ptr::null_mut()) } != 0 {
            return None;
        }
        if tv.tv_sec < EPOCH_2020 {
            return None;
        }
        Some(tv.tv_sec as u64)
    }

    #[cfg(not(target_os = "espidf"))]
    fn now_epoch_secs(&self) -> Option<u64> {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .ok()
            .map(|d| d.as_secs())
            .filter(|&s| s as i64 >= EPOCH_2020)
    }

    #[cfg(target_os = "espidf")]
    fn uptime_ms(&self) -> u64 {
        (unsafe { esp_idf_svc::sys::esp_timer_get_time() }) as u64 / 1_000
    }

    #[cfg(not(target_os = "espidf"))]
    fn uptime_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}
