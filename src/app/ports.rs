//! Port traits — the seams between the application core and the outside
//! world.
//!
//! Production adapters live in `crate::adapters` and `crate::drivers`;
//! tests substitute in-memory mocks.  Every trait here is deliberately
//! narrow: the application asks for exactly what it needs and nothing
//! about how the adapter provides it.

use crate::error::{EncoderError, FetchError};

// ---------------------------------------------------------------------------
// Persistent storage
// ---------------------------------------------------------------------------

/// Storage failures are distinct from the firmware-wide error type because
/// adapters report them before the application layer decides whether they
/// are fatal (boot) or skippable (mid-run).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// The key does not exist in the store.
    NotFound,
    /// The backing store rejected the operation.
    Backend,
    /// Stored bytes could not be decoded into the expected type.
    Corrupt,
    /// The provided buffer was too small for the stored value.
    BufferTooSmall,
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "key not found"),
            Self::Backend => write!(f, "storage backend failure"),
            Self::Corrupt => write!(f, "stored value corrupt"),
            Self::BufferTooSmall => write!(f, "buffer too small"),
        }
    }
}

/// Durable key/value blob storage (NVS in production).
///
/// `put` implies durability: when it returns `Ok`, the value survives an
/// immediate power cut.  Adapters must commit before returning.
pub trait StoragePort {
    /// Read a blob into `buf`, returning the number of bytes written.
    fn get(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError>;

    /// Durably write a blob.
    fn put(&mut self, namespace: &str, key: &str, value: &[u8]) -> Result<(), StorageError>;

    /// Remove a key.  Removing a missing key is not an error.
    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError>;
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// A field failed range validation; the message names it.
    ValidationFailed(&'static str),
    /// Stored bytes could not be decoded into a config.
    Corrupted,
    /// The backing store failed.
    IoError,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::ValidationFailed(msg) => write!(f, "validation failed: {msg}"),
            Self::Corrupted => write!(f, "stored config corrupted"),
            Self::IoError => write!(f, "config store I/O error"),
        }
    }
}

/// Load/save of the persisted [`SystemConfig`](crate::config::SystemConfig).
pub trait ConfigPort {
    /// Load the stored config, falling back to defaults when nothing has
    /// been saved yet.
    fn load(&self) -> Result<crate::config::SystemConfig, ConfigError>;

    /// Validate and durably save a config.
    fn save(&self, config: &crate::config::SystemConfig) -> Result<(), ConfigError>;
}

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// Wall-clock and monotonic time access.
pub trait ClockPort {
    /// Current UTC time as seconds since the Unix epoch, or `None` while
    /// the clock has not yet been set by SNTP.  Implementations must not
    /// return a pre-sync placeholder (e.g. 1970) as a real time.
    fn now_epoch_secs(&self) -> Option<u64>;

    /// Milliseconds since boot.  Monotonic, unaffected by SNTP jumps.
    fn uptime_ms(&self) -> u64;
}

// ---------------------------------------------------------------------------
// Stepper driver
// ---------------------------------------------------------------------------

/// Rotation sense of the motor, as seen by the virtual position model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepDirection {
    /// Virtual angle increasing (toward open).
    Forward,
    /// Virtual angle decreasing (toward closed).
    Reverse,
}

/// Step/dir/enable interface to the motor driver.
///
/// The driver owns pulse timing: `step_pulse` blocks for one full pulse
/// (high then low at the configured cadence), so the caller regains
/// control between every step and a move can be interleaved with
/// bookkeeping.
pub trait StepperPort {
    /// Latch the direction line.  Must be called before the first pulse
    /// of a move.
    fn set_direction(&mut self, dir: StepDirection);

    /// Energise or release the motor coils.
    fn set_enabled(&mut self, enabled: bool);

    /// Emit exactly one step pulse at the fixed cadence.
    fn step_pulse(&mut self);
}

// ---------------------------------------------------------------------------
// Rotary encoder
// ---------------------------------------------------------------------------

/// Absolute magnetic angle sensor.
///
/// A failed read is an error, never a sentinel angle: callers must be able
/// to tell "shaft at 0°" apart from "sensor unreachable".
pub trait EncoderPort {
    /// Physical shaft angle in degrees, `[0.0, 360.0)`.
    fn read_angle_deg(&mut self) -> Result<f32, EncoderError>;
}

// ---------------------------------------------------------------------------
// Schedule fetch
// ---------------------------------------------------------------------------

/// A schedule document and its detached signature, fetched together.
///
/// Holding both in one struct keeps unverified bytes in a single place:
/// nothing downstream accepts a bare document without going through the
/// verifier first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedPayload {
    /// Raw document bytes, exactly as served.
    pub document: Vec<u8>,
    /// Raw signature resource bytes (expected: 64 hex chars).
    pub signature: Vec<u8>,
}

/// Retrieval of the remote schedule document and signature.
pub trait FetchPort {
    /// Fetch both resources.  All-or-nothing: any failure on either
    /// request fails the whole fetch.
    fn fetch(&mut self, document_url: &str, signature_url: &str)
    -> Result<SignedPayload, FetchError>;
}

// ---------------------------------------------------------------------------
// Connectivity
// ---------------------------------------------------------------------------

/// Network link status, as needed by the executor to decide whether a
/// fetch is worth attempting.
pub trait ConnectivityPort {
    fn is_connected(&self) -> bool;
}

// ---------------------------------------------------------------------------
// Event sink
// ---------------------------------------------------------------------------

/// Consumer of application events (logging in production, a recording
/// vector in tests).
pub trait EventSink {
    fn emit(&mut self, event: super::events::AppEvent);
}
