//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements both [`ConfigPort`] and [`StoragePort`].
//!
//! # Layout
//!
//! - Config blob: namespace `pdstepper`, key `syscfg` (postcard).
//! - Per-device state (virtual position, execution watermark): namespace
//!   named after the device ID, e.g. `PD-EFCAFE`.
//! - Credentials (WiFi, schedule signing key): namespace `auth`, which on
//!   ESP32 lives on the encrypted NVS partition.  The simulation backend
//!   is plaintext (dev/test only).
//!
//! NVS limits namespaces and keys to 15 characters; longer names are
//! truncated at the handle layer, so all callers use short names to keep
//! truncation from aliasing keys.
//!
//! Writes are durable: every `put` ends with `nvs_commit()`.

use log::info;

use crate::app::ports::{ConfigError, ConfigPort, StorageError, StoragePort};
use crate::config::SystemConfig;

#[cfg(not(target_os = "espidf"))]
use std::collections::HashMap;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

const CONFIG_NAMESPACE: &str = "pdstepper";
const CONFIG_KEY: &str = "syscfg";
const CRED_NAMESPACE: &str = "auth";

/// Credential key holding the hex-encoded schedule signing key.
pub const SIGNING_KEY_CRED: &str = "sign_key";
/// Credential keys for WiFi provisioning.
pub const WIFI_SSID_CRED: &str = "wifi_ssid";
pub const WIFI_PASS_CRED: &str = "wifi_pass";

#[allow(dead_code)]
const MAX_BLOB_SIZE: usize = 4000;

pub struct NvsAdapter {
    #[cfg(not(target_os = "espidf"))]
    store: std::cell::RefCell<HashMap<String, Vec<u8>>>,
}

impl NvsAdapter {
    /// Create the adapter and initialise NVS flash.
    ///
    /// On first boot or after an IDF version change the partition is
    /// erased and re-initialised automatically.
    pub fn new() -> Result<Self, ConfigError> {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: nvs_flash_init / nvs_flash_erase are called from the
            // single main-task context before any concurrent NVS access.
            let ret = unsafe { nvs_flash_init() };
            if ret == ESP_ERR_NVS_NO_FREE_PAGES || ret == ESP_ERR_NVS_NEW_VERSION_FOUND {
                log::warn!("NVS: erasing and re-initialising flash partition");
                let ret2 = unsafe { nvs_flash_erase() };
                if ret2 != ESP_OK {
                    return Err(ConfigError::IoError);
                }
                let ret3 = unsafe { nvs_flash_init() };
                if ret3 != ESP_OK {
                    return Err(ConfigError::IoError);
                }
            } else if ret != ESP_OK {
                return Err(ConfigError::IoError);
            }
            info!("NvsAdapter: ESP-IDF NVS initialised");
        }

        #[cfg(not(target_os = "espidf"))]
        info!("NvsAdapter: simulation backend");

        Ok(Self {
            #[cfg(not(target_os = "espidf"))]
            store: std::cell::RefCell::new(HashMap::new()),
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn composite_key(namespace: &str, key: &str) -> String {
        format!("{}::{}", namespace, key)
    }

    /// Open an NVS namespace, execute a closure with the handle, then close.
    #[cfg(target_os = "espidf")]
    fn with_nvs_handle<F, T>(namespace: &str, write: bool, f: F) -> Result<T, i32>
    where
        F: FnOnce(nvs_handle_t) -> Result<T, i32>,
    {
        let mut ns_buf = [0u8; 16];
        let ns_bytes = namespace.as_bytes();
        let len = ns_bytes.len().min(15);
        ns_buf[..len].copy_from_slice(&ns_bytes[..len]);

        let mut handle: nvs_handle_t = 0;
        let mode = if write {
            nvs_open_mode_t_NVS_READWRITE
        } else {
            nvs_open_mode_t_NVS_READONLY
        };

        let ret = unsafe { nvs_open(ns_buf.as_ptr() as *const _, mode, &mut handle) };
        if ret != ESP_OK {
            return Err(ret);
        }

        let result = f(handle);
        unsafe {
            nvs_close(handle);
        }
        result
    }

    #[cfg(target_os = "espidf")]
    fn key_buf(key: &str) -> [u8; 16] {
        let mut buf = [0u8; 16];
        let kb = key.as_bytes();
        let kl = kb.len().min(15);
        buf[..kl].copy_from_slice(&kb[..kl]);
        buf
    }
}

fn validate_config(cfg: &SystemConfig) -> Result<(), ConfigError> {
    if cfg.schedule_url.is_empty() || !cfg.schedule_url.starts_with("http") {
        return Err(ConfigError::ValidationFailed(
            "schedule_url must be an http(s) URL",
        ));
    }
    if !(0.0..=45.0).contains(&cfg.step_to_deg) || cfg.step_to_deg == 0.0 {
        return Err(ConfigError::ValidationFailed(
            "step_to_deg must be > 0 and <= 45",
        ));
    }
    if cfg.open_angle_deg <= cfg.closed_angle_deg {
        return Err(ConfigError::ValidationFailed(
            "open_angle_deg must be > closed_angle_deg",
        ));
    }
    if !(50..=10_000).contains(&cfg.step_pulse_half_period_us) {
        return Err(ConfigError::ValidationFailed(
            "step_pulse_half_period_us must be 50–10000",
        ));
    }
    if !(5..=3600).contains(&cfg.poll_interval_secs) {
        return Err(ConfigError::ValidationFailed(
            "poll_interval_secs must be 5–3600",
        ));
    }
    if !(5..=3600).contains(&cfg.retry_backoff_secs) {
        return Err(ConfigError::ValidationFailed(
            "retry_backoff_secs must be 5–3600",
        ));
    }
    if !(0.1..=45.0).contains(&cfg.resync_tolerance_deg) {
        return Err(ConfigError::ValidationFailed(
            "resync_tolerance_deg must be 0.1–45",
        ));
    }
    Ok(())
}

impl ConfigPort for NvsAdapter {
    fn load(&self) -> Result<SystemConfig, ConfigError> {
        let mut buf = [0u8; 512];
        match self.get(CONFIG_NAMESPACE, CONFIG_KEY, &mut buf) {
            Ok(n) => {
                let cfg: SystemConfig =
                    postcard::from_bytes(&buf[..n]).map_err(|_| ConfigError::Corrupted)?;
                info!("NvsAdapter: loaded config ({} bytes)", n);
                Ok(cfg)
            }
            Err(StorageError::NotFound) => {
                info!("NvsAdapter: no stored config, using defaults");
                Ok(SystemConfig::default())
            }
            Err(e) => {
                log::warn!("NvsAdapter: config read error ({e}), using defaults");
                Ok(SystemConfig::default())
            }
        }
    }

    fn save(&self, config: &SystemConfig) -> Result<(), ConfigError> {
        validate_config(config)?;
        let bytes = postcard::to_allocvec(config).map_err(|_| ConfigError::IoError)?;
        self.put_inner(CONFIG_NAMESPACE, CONFIG_KEY, &bytes)
            .map_err(|_| ConfigError::IoError)?;
        info!("NvsAdapter: config saved ({} bytes)", bytes.len());
        Ok(())
    }
}

impl NvsAdapter {
    // Shared write path so ConfigPort::save (&self) and
    // StoragePort::put (&mut self) use identical code.
    fn put_inner(&self, namespace: &str, key: &str, value: &[u8]) -> Result<(), StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            let composite = Self::composite_key(namespace, key);
            self.store.borrow_mut().insert(composite, value.to_vec());
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            let result = Self::with_nvs_handle(namespace, true, |handle| {
                let key_buf = Self::key_buf(key);
                let ret = unsafe {
                    nvs_set_blob(
                        handle,
                        key_buf.as_ptr() as *const _,
                        value.as_ptr() as *const _,
                        value.len(),
                    )
                };
                if ret != ESP_OK {
                    return Err(ret);
                }
                let ret = unsafe { nvs_commit(handle) };
                if ret != ESP_OK {
                    return Err(ret);
                }
                Ok(())
            });
            result.map_err(|_| StorageError::Backend)
        }
    }
}

impl StoragePort for NvsAdapter {
    fn get(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            let composite = Self::composite_key(namespace, key);
            match self.store.borrow().get(&composite) {
                Some(data) => {
                    if data.len() > buf.len() {
                        return Err(StorageError::BufferTooSmall);
                    }
                    buf[..data.len()].copy_from_slice(data);
                    Ok(data.len())
                }
                None => Err(StorageError::NotFound),
            }
        }

        #[cfg(target_os = "espidf")]
        {
            let result = Self::with_nvs_handle(namespace, false, |handle| {
                let key_buf = Self::key_buf(key);
                let mut size = buf.len();
                let ret = unsafe {
                    nvs_get_blob(
                        handle,
                        key_buf.as_ptr() as *const _,
                        buf.as_mut_ptr() as *mut _,
                        &mut size,
                    )
                };
                if ret != ESP_OK {
                    return Err(ret);
                }
                Ok(size)
            });
            match result {
                Ok(size) => Ok(size),
                Err(e) if e == ESP_ERR_NVS_NOT_FOUND => Err(StorageError::NotFound),
                Err(e) if e == ESP_ERR_NVS_INVALID_LENGTH => Err(StorageError::BufferTooSmall),
                Err(_) => Err(StorageError::Backend),
            }
        }
    }

    fn put(&mut self, namespace: &str, key: &str, value: &[u8]) -> Result<(), StorageError> {
        self.put_inner(namespace, key, value)
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            let composite = Self::composite_key(namespace, key);
            self.store.borrow_mut().remove(&composite);
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            let result = Self::with_nvs_handle(namespace, true, |handle| {
                let key_buf = Self::key_buf(key);
                let ret = unsafe { nvs_erase_key(handle, key_buf.as_ptr() as *const _) };
                if ret != ESP_OK && ret != ESP_ERR_NVS_NOT_FOUND {
                    return Err(ret);
                }
                let ret = unsafe { nvs_commit(handle) };
                if ret != ESP_OK {
                    return Err(ret);
                }
                Ok(())
            });
            result.map_err(|_| StorageError::Backend)
        }
    }
}

// ── Credential storage ──────────────────────────────────────────────
//
// Credentials (WiFi, schedule signing key) live in the "auth" namespace.
// On ESP32 with CONFIG_NVS_ENCRYPTION enabled, all accesses to it use
// AES-XTS transparently; the API is identical either way.
impl NvsAdapter {
    /// Store a credential blob in the "auth" namespace.
    pub fn store_credential(&mut self, key: &str, data: &[u8]) -> Result<(), StorageError> {
        self.put(CRED_NAMESPACE, key, data)
    }

    /// Read a credential blob from the "auth" namespace.
    pub fn read_credential(&self, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        self.get(CRED_NAMESPACE, key, buf)
    }

    /// Read a credential as UTF-8 text (SSIDs, passwords, hex keys).
    pub fn read_credential_str(&self, key: &str) -> Result<heapless::String<96>, StorageError> {
        let mut buf = [0u8; 96];
        let n = self.read_credential(key, &mut buf)?;
        let text = core::str::from_utf8(&buf[..n]).map_err(|_| StorageError::Corrupt)?;
        let mut out = heapless::String::new();
        out.push_str(text).map_err(|()| StorageError::Corrupt)?;
        Ok(out)
    }
}
