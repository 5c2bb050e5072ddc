//! Timestamps in the server's wire format.
//!
//! The server emits timestamps as `yyyy-MM-ddTHH:mm:ssZ` with no fractional
//! seconds and no offset other than the literal `Z`. chrono's format parser
//! alone is too lenient for this: it skips whitespace, accepts unpadded
//! fields and signed years, and takes `60` as a leap second. Input is
//! therefore checked byte by byte against the fixed 20-character layout
//! before chrono validates the calendar date. Anything else is a
//! `DecodeError`.
//!
//! A decoded value is stored as `1000 * epoch_millis`, the unit the rest of
//! the SDK calls nanoseconds. Only millisecond precision survives, and since
//! the wire carries whole seconds the stored value is always a multiple of
//! 1_000_000.
//!
//! Encoding is fallible too. A value built with [`TimeValue::from_nanos`]
//! can lie outside chrono's range, and rendering it fails with
//! `EncodeError::TimestampOutOfRange` instead of printing a clamped date.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{de, ser, Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{DecodeError, EncodeError};

pub const WIRE_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

const WIRE_LEN: usize = 20;

/// Separator bytes and their offsets in a wire string.
const SEPARATORS: [(usize, u8); 6] = [
    (4, b'-'),
    (7, b'-'),
    (10, b'T'),
    (13, b':'),
    (16, b':'),
    (19, b'Z'),
];

/// Offset of the tens digit of the seconds field.
const SECONDS_TENS: usize = 17;

const UNITS_PER_MILLI: i64 = 1000;

/// A server timestamp, held as `1000 * epoch_millis`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeValue(i64);

impl TimeValue {
    /// Parse a wire string. Fails on any deviation from [`WIRE_FORMAT`].
    pub fn parse(input: &str) -> Result<Self, DecodeError> {
        check_shape(input).map_err(|reason| DecodeError::TimestampShape {
            input: input.to_string(),
            reason,
        })?;
        let naive = NaiveDateTime::parse_from_str(input, WIRE_FORMAT).map_err(|source| {
            DecodeError::Timestamp {
                input: input.to_string(),
                source,
            }
        })?;
        naive
            .and_utc()
            .timestamp_millis()
            .checked_mul(UNITS_PER_MILLI)
            .map(TimeValue)
            .ok_or_else(|| DecodeError::TimestampOutOfRange {
                input: input.to_string(),
            })
    }

    pub fn from_nanos(nanos: i64) -> Self {
        TimeValue(nanos)
    }

    /// Exact for every `DateTime<Utc>`: chrono spans roughly 8.3e15
    /// milliseconds either side of the epoch, inside `i64::MAX / 1000`.
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        TimeValue(dt.timestamp_millis() * UNITS_PER_MILLI)
    }

    pub fn as_nanos(&self) -> i64 {
        self.0
    }

    pub fn epoch_millis(&self) -> i64 {
        self.0 / UNITS_PER_MILLI
    }

    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.epoch_millis())
    }

    /// Render in the wire format. Sub-second precision is dropped.
    pub fn to_wire_string(&self) -> Result<String, EncodeError> {
        self.to_datetime()
            .map(|dt| dt.format(WIRE_FORMAT).to_string())
            .ok_or(EncodeError::TimestampOutOfRange { nanos: self.0 })
    }
}

fn check_shape(input: &str) -> Result<(), &'static str> {
    let bytes = input.as_bytes();
    if bytes.len() != WIRE_LEN {
        return Err("expected exactly 20 characters");
    }
    for (i, b) in bytes.iter().enumerate() {
        match SEPARATORS.iter().find(|(at, _)| *at == i) {
            Some((_, sep)) if b != sep => return Err("misplaced separator"),
            Some(_) => {}
            None if !b.is_ascii_digit() => return Err("expected a digit"),
            None => {}
        }
    }
    if bytes[SECONDS_TENS] > b'5' {
        return Err("seconds out of range");
    }
    Ok(())
}

/// Out-of-range values display as their raw unit count.
impl std::fmt::Display for TimeValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.to_wire_string() {
            Ok(wire) => f.write_str(&wire),
            Err(_) => write!(f, "{}ns (out of range)", self.0),
        }
    }
}

impl std::str::FromStr for TimeValue {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TimeValue::parse(s)
    }
}

impl Serialize for TimeValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let wire = self.to_wire_string().map_err(ser::Error::custom)?;
        serializer.serialize_str(&wire)
    }
}

impl<'de> Deserialize<'de> for TimeValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        TimeValue::parse(&raw).map_err(de::Error::custom)
    }
}
