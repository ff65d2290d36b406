//! Device identity derived from the ESP32 factory MAC address.
//!
//! Produces a stable, human-readable device ID in the form `PD-XXYYZZ`
//! (last 3 bytes of the 6-byte MAC in uppercase hex).  The ID doubles as
//! the device's key into the published schedule document and as its NVS
//! state namespace, so it must be deterministic across reboots — the
//! factory-burned eFuse MAC guarantees that.
//!
//! Provisioning can override the ID through
//! [`SystemConfig::device_id_override`](crate::config::SystemConfig),
//! which is how a board maps onto a pre-existing schedule entry like
//! `pd01`.

use crate::config::SystemConfig;

/// Fixed-size device ID string: "PD-XXYYZZ" or a short override.
pub type DeviceIdString = heapless::String<16>;

/// Full 6-byte MAC address.
pub type MacAddress = [u8; 6];

/// Read the factory MAC address from eFuse.
#[cfg(target_os = "espidf")]
pub fn read_mac() -> MacAddress {
    let mut mac: MacAddress = [0u8; 6];
    unsafe {
        esp_idf_svc::sys::esp_efuse_mac_get_default(mac.as_mut_ptr());
    }
    mac
}

/// Simulation: returns a deterministic fake MAC.
#[cfg(not(target_os = "espidf"))]
pub fn read_mac() -> MacAddress {
    [0xDE, 0xAD, 0xBE, 0xEF, 0xCA, 0xFE]
}

/// Derive the short device ID from the last 3 MAC bytes.
/// Format: `PD-XXYYZZ` (e.g., `PD-EFCAFE`).
pub fn device_id(mac: &MacAddress) -> DeviceIdString {
    let mut id = DeviceIdString::new();
    use core::fmt::Write;
    let _ = write!(id, "PD-{:02X}{:02X}{:02X}", mac[3], mac[4], mac[5]);
    id
}

/// The effective device ID: the configured override when present,
/// otherwise the MAC-derived one.
pub fn effective_device_id(config: &SystemConfig) -> DeviceIdString {
    if config.device_id_override.is_empty() {
        device_id(&read_mac())
    } else {
        let mut id = DeviceIdString::new();
        let _ = id.push_str(&config.device_id_override);
        id
    }
}
