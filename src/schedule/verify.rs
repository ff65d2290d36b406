//! Schedule signature verification — detached HMAC-SHA256.
//!
//! The published schedule comes with a sibling signature resource holding
//! the lowercase-hex HMAC-SHA256 of the document bytes under the device's
//! provisioned signing key.  A schedule that does not authenticate is
//! discarded without being parsed.
//!
//! Crypto is handled by the `hmac-sha256` crate — pure Rust, no_std,
//! constant-time verification, identical on ESP-IDF and host targets.

use crate::app::ports::SignedPayload;
use crate::error::VerifyError;

/// Maximum signing key length in bytes (64 hex chars).
pub const MAX_KEY_LEN: usize = 32;

/// A view of document bytes that passed signature verification.
///
/// The private field means only this module can construct one, which
/// makes "parsed but never verified" unrepresentable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verified<'a> {
    document: &'a [u8],
}

impl<'a> Verified<'a> {
    /// The authenticated document bytes.
    pub fn document(&self) -> &'a [u8] {
        self.document
    }
}

/// Authenticates a fetched payload.
pub trait ScheduleVerifier {
    /// Check the payload's signature over its document bytes.
    fn verify<'a>(&self, payload: &'a SignedPayload) -> Result<Verified<'a>, VerifyError>;
}

/// Production verifier: HMAC-SHA256 with a provisioned shared key.
pub struct HmacSha256Verifier {
    key: heapless::Vec<u8, MAX_KEY_LEN>,
    key_len: usize,
}

impl HmacSha256Verifier {
    /// Build a verifier from the raw key bytes.
    pub fn new(key: &[u8]) -> Result<Self, VerifyError> {
        if key.is_empty() || key.len() > MAX_KEY_LEN {
            return Err(VerifyError::MissingKey);
        }
        let mut buf = heapless::Vec::new();
        buf.extend_from_slice(key)
            .map_err(|()| VerifyError::MissingKey)?;
        let key_len = key.len();
        Ok(Self { key: buf, key_len })
    }

    /// Build a verifier from a hex-encoded key string, as stored in the
    /// provisioning namespace.
    pub fn from_hex_key(hex: &str) -> Result<Self, VerifyError> {
        let mut key = [0u8; MAX_KEY_LEN];
        let n = decode_hex(hex.trim().as_bytes(), &mut key).ok_or(VerifyError::MissingKey)?;
        Self::new(&key[..n])
    }
}

impl ScheduleVerifier for HmacSha256Verifier {
    fn verify<'a>(&self, payload: &'a SignedPayload) -> Result<Verified<'a>, VerifyError> {
        // The signature resource is 64 lowercase hex chars, possibly with
        // trailing whitespace from the publishing pipeline.
        let sig_text = trim_ascii(&payload.signature);
        let mut tag = [0u8; 32];
        let n = decode_hex(sig_text, &mut tag).ok_or(VerifyError::MalformedSignature)?;
        if n != 32 {
            return Err(VerifyError::MalformedSignature);
        }

        let key = &self.key[..self.key_len];
        if !hmac_sha256::HMAC::verify(&payload.document, key, &tag) {
            return Err(VerifyError::SignatureMismatch);
        }

        Ok(Verified {
            document: &payload.document,
        })
    }
}

/// Compute the detached signature for a document — used by test code to
/// play the publisher side.
pub fn compute_signature(key: &[u8], document: &[u8]) -> [u8; 32] {
    hmac_sha256::HMAC::mac(document, key)
}

/// Render a MAC as the lowercase-hex wire form of the signature resource.
pub fn encode_hex(tag: &[u8; 32]) -> heapless::String<64> {
    const DIGITS: &[u8; 16] = b"0123456789abcdef";
    let mut out = heapless::String::new();
    for b in tag {
        let _ = out.push(DIGITS[(b >> 4) as usize] as char);
        let _ = out.push(DIGITS[(b & 0x0F) as usize] as char);
    }
    out
}

/// Decode hex digits into `out`, returning the byte count.  `None` on any
/// non-hex character, odd length, empty input, or overflow of `out`.
fn decode_hex(text: &[u8], out: &mut [u8]) -> Option<usize> {
    if text.is_empty() || text.len() % 2 != 0 || text.len() / 2 > out.len() {
        return None;
    }
    for (i, pair) in text.chunks_exact(2).enumerate() {
        let hi = hex_val(pair[0])?;
        let lo = hex_val(pair[1])?;
        out[i] = (hi << 4) | lo;
    }
    Some(text.len() / 2)
}

fn hex_val(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

fn trim_ascii(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    let end = bytes
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |i| i + 1);
    &bytes[start..end]
}
