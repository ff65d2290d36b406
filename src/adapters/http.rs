//! HTTPS schedule fetcher.
//!
//! Implements [`FetchPort`] over the ESP-IDF HTTP client with the
//! built-in certificate bundle, so the GitHub-hosted schedule can be
//! fetched over TLS without provisioning CA certs per device.
//!
//! The host backend is a queue of canned responses so executor behaviour
//! can be driven from tests.

use crate::app::ports::{FetchPort, SignedPayload};
use crate::error::FetchError;

/// Largest schedule document accepted, in bytes.
const MAX_DOCUMENT_BYTES: usize = 8 * 1024;
/// Largest signature resource accepted (64 hex chars + whitespace).
const MAX_SIGNATURE_BYTES: usize = 256;

#[cfg(target_os = "espidf")]
const HTTP_TIMEOUT_MS: i32 = 10_000;

pub struct HttpFetcher {
    #[cfg(not(target_os = "espidf"))]
    responses: std::collections::VecDeque<Result<Vec<u8>, FetchError>>,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            responses: std::collections::VecDeque::new(),
        }
    }

    /// Queue the body for the next GET (host backend only).  Each fetch
    /// consumes two entries: document first, then signature.
    #[cfg(not(target_os = "espidf"))]
    pub fn enqueue(&mut self, response: Result<Vec<u8>, FetchError>) {
        self.responses.push_back(response);
    }

    #[cfg(target_os = "espidf")]
    fn get(&mut self, url: &str, max_bytes: usize) -> Result<Vec<u8>, FetchError> {
        use esp_idf_svc::sys::*;

        let c_url = std::ffi::CString::new(url).map_err(|_| FetchError::Transport)?;
        let cfg = esp_http_client_config_t {
            url: c_url.as_ptr(),
            timeout_ms: HTTP_TIMEOUT_MS,
            crt_bundle_attach: Some(esp_crt_bundle_attach),
            ..Default::default()
        };

        // SAFETY: cfg and c_url outlive the client; the client handle is
        // used only within this function and always cleaned up.
        let client = unsafe { esp_http_client_init(&cfg) };
        if client.is_null() {
            return Err(FetchError::Transport);
        }

        let result = Self::read_body(client, max_bytes);

        // SAFETY: client came from esp_http_client_init above and is not
        // used after cleanup.
        unsafe { esp_http_client_cleanup(client) };
        result
    }

    #[cfg(target_os = "espidf")]
    fn read_body(
        client: esp_idf_svc::sys::esp_http_client_handle_t,
        max_bytes: usize,
    ) -> Result<Vec<u8>, FetchError> {
        use esp_idf_svc::sys::*;

        // SAFETY: client is a live handle owned by the caller; chunk is a
        // valid buffer for the duration of each read.
        unsafe {
            let ret = esp_http_client_open(client, 0);
            if ret != ESP_OK {
                return Err(FetchError::Transport);
            }
            if esp_http_client_fetch_headers(client) < 0 {
                return Err(FetchError::Transport);
            }
            let status = esp_http_client_get_status_code(client);
            if !(200..300).contains(&status) {
                return Err(FetchError::DocumentStatus(status as u16));
            }

            let mut body = Vec::new();
            let mut chunk = [0u8; 512];
            loop {
                let n = esp_http_client_read(client, chunk.as_mut_ptr().cast(), chunk.len() as i32);
                if n < 0 {
                    return Err(FetchError::Transport);
                }
                if n == 0 {
                    break;
                }
                if body.len() + n as usize > max_bytes {
                    return Err(FetchError::Transport);
                }
                body.extend_from_slice(&chunk[..n as usize]);
            }
            Ok(body)
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn get(&mut self, _url: &str, max_bytes: usize) -> Result<Vec<u8>, FetchError> {
        let body = self
            .responses
            .pop_front()
            .unwrap_or(Err(FetchError::Transport))?;
        if body.len() > max_bytes {
            return Err(FetchError::Transport);
        }
        Ok(body)
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl FetchPort for HttpFetcher {
    fn fetch(
        &mut self,
        document_url: &str,
        signature_url: &str,
    ) -> Result<SignedPayload, FetchError> {
        let document = self.get(document_url, MAX_DOCUMENT_BYTES)?;
        let signature = self
            .get(signature_url, MAX_SIGNATURE_BYTES)
            .map_err(|e| match e {
                FetchError::DocumentStatus(code) => FetchError::SignatureStatus(code),
                other => other,
            })?;
        Ok(SignedPayload {
            document,
            signature,
        })
    }
}
