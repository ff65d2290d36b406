//! Schedule document model and parsing.
//!
//! The published document is JSON of the shape:
//!
//! ```json
//! {
//!   "generated_at": "2026-08-01T00:00:00Z",
//!   "devices": {
//!     "pd01": [
//!       { "id": "pd01-20260801T060000-open", "action": "open",
//!         "time": "2026-08-01T06:00:00Z",
//!         "virtual_angle": 1440.0, "expected_duration_s": 90 }
//!     ]
//!   }
//! }
//! ```
//!
//! Parsing only accepts bytes that already passed signature verification
//! (see [`verify::Verified`](super::verify::Verified)).

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::error::ParseError;
use super::verify::Verified;

/// What a scheduled event does to the valve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Move to the configured open angle.
    Open,
    /// Move to the configured closed angle.
    Close,
}

impl core::fmt::Display for Action {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Close => write!(f, "close"),
        }
    }
}

/// One event exactly as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawEvent {
    /// Publisher-side identifier (e.g. `pd01-20260801T060000-open`),
    /// informational only.
    #[serde(default)]
    pub id: Option<String>,
    pub action: Action,
    /// ISO-8601 UTC timestamp, `YYYY-MM-DDTHH:MM:SSZ`.
    pub time: String,
    /// Explicit target virtual angle; overrides the action's default.
    #[serde(default)]
    pub virtual_angle: Option<f32>,
    /// Publisher's motion-time estimate, informational only.
    #[serde(default)]
    pub expected_duration_s: Option<u32>,
}

/// The whole published document.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ScheduleDocument {
    #[serde(default)]
    pub generated_at: Option<String>,
    pub devices: BTreeMap<String, Vec<RawEvent>>,
}

/// A fully resolved event for this device: absolute time, concrete angle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduleEvent {
    pub action: Action,
    /// Seconds since the Unix epoch.
    pub scheduled_at: u64,
    /// Target virtual angle in degrees.
    pub target_deg: f32,
}

/// Decode a verified document.
pub fn parse_document(verified: Verified<'_>) -> Result<ScheduleDocument, ParseError> {
    serde_json::from_slice(verified.document()).map_err(|_| ParseError::BadJson)
}

/// Resolve this device's events into concrete `(time, angle)` pairs,
/// sorted chronologically.
///
/// Events with unparseable timestamps are skipped with a warning rather
/// than failing the whole document: one bad entry must not block the rest
/// of the day's schedule.  An absent `virtual_angle` falls back to the
/// configured angle for the action.
pub fn events_for_device(
    doc: &ScheduleDocument,
    device_id: &str,
    open_angle_deg: f32,
    closed_angle_deg: f32,
) -> Vec<ScheduleEvent> {
    let Some(raw) = doc.devices.get(device_id) else {
        return Vec::new();
    };

    let mut events: Vec<ScheduleEvent> = raw
        .iter()
        .filter_map(|e| match parse_iso8601_utc(&e.time) {
            Some(scheduled_at) => Some(ScheduleEvent {
                action: e.action,
                scheduled_at,
                target_deg: e.virtual_angle.unwrap_or(match e.action {
                    Action::Open => open_angle_deg,
                    Action::Close => closed_angle_deg,
                }),
            }),
            None => {
                log::warn!("skipping event with bad timestamp {:?}", e.time);
                None
            }
        })
        .collect();

    events.sort_by_key(|e| e.scheduled_at);
    events
}

/// Parse a strict `YYYY-MM-DDTHH:MM:SSZ` UTC timestamp into seconds since
/// the Unix epoch.  Anything else (offsets, fractional seconds, missing
/// `Z`) is rejected.
pub fn parse_iso8601_utc(text: &str) -> Option<u64> {
    let b = text.as_bytes();
    if b.len() != 20 || b[4] != b'-' || b[7] != b'-' || b[10] != b'T' {
        return None;
    }
    if b[13] != b':' || b[16] != b':' || b[19] != b'Z' {
        return None;
    }

    let year: i64 = digits(&b[0..4])?;
    let month: i64 = digits(&b[5..7])?;
    let day: i64 = digits(&b[8..10])?;
    let hour: i64 = digits(&b[11..13])?;
    let min: i64 = digits(&b[14..16])?;
    let sec: i64 = digits(&b[17..19])?;

    if !(1..=12).contains(&month) || day < 1 || day > days_in_month(year, month) {
        return None;
    }
    if hour > 23 || min > 59 || sec > 59 {
        return None;
    }

    let days = days_from_civil(year, month, day);
    let secs = days * 86_400 + hour * 3_600 + min * 60 + sec;
    u64::try_from(secs).ok()
}

fn digits(b: &[u8]) -> Option<i64> {
    let mut v: i64 = 0;
    for &c in b {
        if !c.is_ascii_digit() {
            return None;
        }
        v = v * 10 + i64::from(c - b'0');
    }
    Some(v)
}

fn days_in_month(year: i64, month: i64) -> i64 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if is_leap(year) => 29,
        2 => 28,
        _ => 0,
    }
}

fn is_leap(year: i64) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

/// Days since 1970-01-01 for a proleptic-Gregorian civil date
/// (Howard Hinnant's `days_from_civil` algorithm).
fn days_from_civil(y: i64, m: i64, d: i64) -> i64 {
    let y = if m <= 2 { y - 1 } else { y };
    let era = y.div_euclid(400);
    let yoe = y - era * 400;
    let doy = (153 * (if m > 2 { m - 3 } else { m + 9 }) + 2) / 5 + d - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe - 719_468
}
