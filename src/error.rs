//! Unified error types for the PD-Stepper firmware.
//!
//! Follows embedded best practice: a single `Error` enum that every subsystem
//! can convert into, keeping the top-level control loop's error handling
//! uniform.  All variants are `Copy` so they can be cheaply passed through
//! the executor state machine without allocation.
//!
//! Every error here is recoverable: a failed cycle is logged, the executor
//! backs off for a fixed delay, and the next poll starts fresh.  Nothing in
//! this taxonomy reboots the device.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Schedule retrieval failed (transport or bad HTTP status).
    Fetch(FetchError),
    /// Schedule signature did not authenticate.
    Verify(VerifyError),
    /// A verified document could not be decoded.
    Parse(ParseError),
    /// The rotary encoder could not be read.
    Encoder(EncoderError),
    /// Peripheral initialisation failed.
    Init(&'static str),
    /// Configuration is invalid or could not be loaded.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fetch(e) => write!(f, "fetch: {e}"),
            Self::Verify(e) => write!(f, "verify: {e}"),
            Self::Parse(e) => write!(f, "parse: {e}"),
            Self::Encoder(e) => write!(f, "encoder: {e}"),
            Self::Init(msg) => write!(f, "init: {msg}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Fetch errors
// ---------------------------------------------------------------------------

/// Failure while retrieving the schedule document or its signature.
///
/// No partial result is ever surfaced: either both resources arrive with a
/// success status, or the whole fetch is an error.  Retry timing is owned by
/// the executor, never by the fetcher itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchError {
    /// The document request returned a non-success HTTP status.
    DocumentStatus(u16),
    /// The signature request returned a non-success HTTP status.
    SignatureStatus(u16),
    /// The transport failed below HTTP (DNS, TCP, TLS, read error).
    Transport,
    /// No network connection is available.
    NotConnected,
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DocumentStatus(code) => write!(f, "document HTTP status {code}"),
            Self::SignatureStatus(code) => write!(f, "signature HTTP status {code}"),
            Self::Transport => write!(f, "transport failure"),
            Self::NotConnected => write!(f, "network not connected"),
        }
    }
}

impl From<FetchError> for Error {
    fn from(e: FetchError) -> Self {
        Self::Fetch(e)
    }
}

// ---------------------------------------------------------------------------
// Verification errors
// ---------------------------------------------------------------------------

/// Signature authentication failure.  This is the trust boundary of the
/// whole system: a `VerifyError` means the document bytes are discarded
/// unread, with no side effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyError {
    /// The MAC over the document bytes does not match the signature.
    SignatureMismatch,
    /// The signature resource is not a well-formed 64-char hex MAC.
    MalformedSignature,
    /// No signing key has been provisioned on this device.
    MissingKey,
}

impl fmt::Display for VerifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SignatureMismatch => write!(f, "signature mismatch"),
            Self::MalformedSignature => write!(f, "malformed signature"),
            Self::MissingKey => write!(f, "no signing key provisioned"),
        }
    }
}

impl From<VerifyError> for Error {
    fn from(e: VerifyError) -> Self {
        Self::Verify(e)
    }
}

// ---------------------------------------------------------------------------
// Parse errors
// ---------------------------------------------------------------------------

/// A verified document that still cannot be decoded.  Recoverable: the
/// document is discarded and re-fetched on the next poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    /// Not valid JSON, or the top-level shape is wrong.
    BadJson,
    /// An event timestamp is not ISO-8601 UTC (`YYYY-MM-DDTHH:MM:SSZ`).
    BadTimestamp,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadJson => write!(f, "malformed JSON document"),
            Self::BadTimestamp => write!(f, "timestamp not ISO-8601 UTC"),
        }
    }
}

impl From<ParseError> for Error {
    fn from(e: ParseError) -> Self {
        Self::Parse(e)
    }
}

// ---------------------------------------------------------------------------
// Encoder errors
// ---------------------------------------------------------------------------

/// The encoder read is the feedback primitive for drift correction; a
/// failed read means the physical angle is unknown for that cycle and any
/// correction that would use it must be skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncoderError {
    /// The bus transaction completed but returned no data.
    NoData,
    /// The I²C transaction itself failed.
    BusError,
}

impl fmt::Display for EncoderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoData => write!(f, "no data from encoder"),
            Self::BusError => write!(f, "I2C bus error"),
        }
    }
}

impl From<EncoderError> for Error {
    fn from(e: EncoderError) -> Self {
        Self::Encoder(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
