//! Mock adapters for integration tests.
//!
//! Every port the executor touches has an in-memory stand-in here:
//! storage, stepper, encoder, clock, connectivity, fetcher, event sink.
//! The stepper and sink record full call histories so tests can assert
//! on exact sequences.

use std::collections::{HashMap, VecDeque};

use pdstepper::app::events::AppEvent;
use pdstepper::app::ports::{
    ClockPort, ConnectivityPort, EncoderPort, EventSink, FetchPort, SignedPayload, StepDirection,
    StepperPort, StorageError, StoragePort,
};
use pdstepper::error::{EncoderError, FetchError};
use pdstepper::schedule::verify::{compute_signature, encode_hex};

// ── Storage ───────────────────────────────────────────────────

#[derive(Default)]
pub struct MockStorage {
    map: HashMap<(String, String), Vec<u8>>,
    /// When `Some(n)`, the n-th subsequent `put` (0-based) and all later
    /// ones fail.
    pub fail_puts_after: Option<u32>,
    puts_seen: u32,
}

#[allow(dead_code)]
impl MockStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, namespace: &str, key: &str) -> bool {
        self.map.contains_key(&(namespace.into(), key.into()))
    }
}

impl StoragePort for MockStorage {
    fn get(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        let v = self
            .map
            .get(&(namespace.into(), key.into()))
            .ok_or(StorageError::NotFound)?;
        if v.len() > buf.len() {
            return Err(StorageError::BufferTooSmall);
        }
        buf[..v.len()].copy_from_slice(v);
        Ok(v.len())
    }

    fn put(&mut self, namespace: &str, key: &str, value: &[u8]) -> Result<(), StorageError> {
        if let Some(limit) = self.fail_puts_after {
            if self.puts_seen >= limit {
                return Err(StorageError::Backend);
            }
        }
        self.puts_seen += 1;
        self.map
            .insert((namespace.into(), key.into()), value.to_vec());
        Ok(())
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        self.map.remove(&(namespace.into(), key.into()));
        Ok(())
    }
}

// ── Stepper ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepperCall {
    Dir(StepDirection),
    Enable(bool),
    Pulse,
}

#[derive(Default)]
pub struct MockStepper {
    pub calls: Vec<StepperCall>,
}

#[allow(dead_code)]
impl MockStepper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pulse_count(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| **c == StepperCall::Pulse)
            .count()
    }
}

impl StepperPort for MockStepper {
    fn set_direction(&mut self, dir: StepDirection) {
        self.calls.push(StepperCall::Dir(dir));
    }
    fn set_enabled(&mut self, enabled: bool) {
        self.calls.push(StepperCall::Enable(enabled));
    }
    fn step_pulse(&mut self) {
        self.calls.push(StepperCall::Pulse);
    }
}

// ── Encoder ───────────────────────────────────────────────────

pub struct MockEncoder {
    pub reading: Result<f32, EncoderError>,
}

#[allow(dead_code)]
impl MockEncoder {
    pub fn at(angle_deg: f32) -> Self {
        Self {
            reading: Ok(angle_deg),
        }
    }

    pub fn failing() -> Self {
        Self {
            reading: Err(EncoderError::BusError),
        }
    }
}

impl EncoderPort for MockEncoder {
    fn read_angle_deg(&mut self) -> Result<f32, EncoderError> {
        self.reading
    }
}

// ── Clock ─────────────────────────────────────────────────────

pub struct FixedClock {
    pub now: Option<u64>,
}

impl ClockPort for FixedClock {
    fn now_epoch_secs(&self) -> Option<u64> {
        self.now
    }
    fn uptime_ms(&self) -> u64 {
        0
    }
}

// ── Connectivity ──────────────────────────────────────────────

pub struct FixedLink {
    pub connected: bool,
}

impl ConnectivityPort for FixedLink {
    fn is_connected(&self) -> bool {
        self.connected
    }
}

// ── Fetcher ───────────────────────────────────────────────────

#[derive(Default)]
pub struct MockFetcher {
    pub responses: VecDeque<Result<SignedPayload, FetchError>>,
    pub calls: u32,
}

#[allow(dead_code)]
impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, response: Result<SignedPayload, FetchError>) {
        self.responses.push_back(response);
    }
}

impl FetchPort for MockFetcher {
    fn fetch(
        &mut self,
        _document_url: &str,
        _signature_url: &str,
    ) -> Result<SignedPayload, FetchError> {
        self.calls += 1;
        self.responses
            .pop_front()
            .unwrap_or(Err(FetchError::Transport))
    }
}

// ── Event sink ────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: AppEvent) {
        self.events.push(event);
    }
}

// ── Payload helpers ───────────────────────────────────────────

/// The shared signing key used across the executor tests.
pub const TEST_KEY: &[u8] = b"integration-test-signing-key";

/// Sign `json` with [`TEST_KEY`], producing the wire-form payload.
pub fn signed_payload(json: &str) -> SignedPayload {
    let tag = compute_signature(TEST_KEY, json.as_bytes());
    SignedPayload {
        document: json.as_bytes().to_vec(),
        signature: encode_hex(&tag).as_bytes().to_vec(),
    }
}

/// Same document, signature from a different key — must be rejected.
#[allow(dead_code)]
pub fn missigned_payload(json: &str) -> SignedPayload {
    let tag = compute_signature(b"some-other-key", json.as_bytes());
    SignedPayload {
        document: json.as_bytes().to_vec(),
        signature: encode_hex(&tag).as_bytes().to_vec(),
    }
}
