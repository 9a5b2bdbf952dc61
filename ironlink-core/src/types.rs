/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Core value types.
//!
//! - [`SeqNum`]: message sequence number
//! - [`Timestamp`]: UTC timestamp with nanosecond precision
//! - [`CompId`]: component identifier (SenderCompID, TargetCompID)

use arrayvec::ArrayString;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum length for CompID strings in bytes.
pub const COMP_ID_MAX_LEN: usize = 32;

/// Message sequence number (tag 34).
///
/// Sequence numbers start at 1 and are assigned by the protocol engine when a
/// message is transmitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(transparent)]
pub struct SeqNum(u64);

impl SeqNum {
    /// Creates a new sequence number.
    #[inline]
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw sequence number value.
    #[inline]
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Checks if this sequence number is valid (>= 1).
    #[inline]
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 >= 1
    }
}

impl From<u64> for SeqNum {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for SeqNum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SeqNum {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

/// UTC timestamp with nanosecond precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp {
    /// Nanoseconds since Unix epoch (1970-01-01 00:00:00 UTC).
    nanos_since_epoch: u64,
}

impl Timestamp {
    /// Creates a timestamp from milliseconds since Unix epoch.
    #[inline]
    #[must_use]
    pub const fn from_millis(millis: u64) -> Self {
        Self {
            nanos_since_epoch: millis.saturating_mul(1_000_000),
        }
    }

    /// Returns the current UTC timestamp.
    #[inline]
    #[must_use]
    pub fn now() -> Self {
        Self::from(Utc::now())
    }

    /// Returns milliseconds since Unix epoch.
    #[inline]
    #[must_use]
    pub const fn as_millis(self) -> u64 {
        self.nanos_since_epoch / 1_000_000
    }

    /// Converts to a chrono `DateTime<Utc>`, saturating at the latest
    /// representable instant.
    #[must_use]
    pub fn to_datetime(self) -> DateTime<Utc> {
        DateTime::from_timestamp_nanos(i64::try_from(self.nanos_since_epoch).unwrap_or(i64::MAX))
    }

    /// Formats the timestamp as `YYYYMMDD-HH:MM:SS.sss` (SendingTime style).
    #[must_use]
    pub fn format_millis(self) -> ArrayString<21> {
        let mut buf = ArrayString::new();
        let _ = std::fmt::write(
            &mut buf,
            format_args!("{}", self.to_datetime().format("%Y%m%d-%H:%M:%S%.3f")),
        );
        buf
    }
}

/// Instants before the epoch saturate to zero, instants past the nanosecond
/// range to its end.
impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        let nanos_since_epoch = match dt.timestamp_nanos_opt() {
            Some(nanos) => u64::try_from(nanos).unwrap_or(0),
            None if dt.timestamp() < 0 => 0,
            None => i64::MAX.unsigned_abs(),
        };
        Self { nanos_since_epoch }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_millis())
    }
}

/// Component identifier for SenderCompID (tag 49) and TargetCompID (tag 56).
///
/// Maximum length is 32 characters.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(transparent)]
pub struct CompId(ArrayString<COMP_ID_MAX_LEN>);

impl CompId {
    /// Creates a new CompId, or `None` if `s` is longer than
    /// [`COMP_ID_MAX_LEN`].
    #[must_use]
    pub fn new(s: &str) -> Option<Self> {
        ArrayString::from(s).ok().map(Self)
    }

    /// Returns the CompId as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl AsRef<str> for CompId {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for CompId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompId {
    type Err = arrayvec::CapacityError<()>;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ArrayString::try_from(s)
            .map(Self)
            .map_err(|_| arrayvec::CapacityError::new(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seq_num_parse() {
        let seq: SeqNum = "42".parse().unwrap();
        assert_eq!(seq.value(), 42);
        assert!(seq.is_valid());
        assert!(!SeqNum::new(0).is_valid());
        assert!("x".parse::<SeqNum>().is_err());
    }

    #[test]
    fn test_timestamp_format() {
        let ts = Timestamp::from_millis(0);
        assert!(ts.format_millis().starts_with("19700101-00:00:00"));
        assert_eq!(Timestamp::from_millis(1500).as_millis(), 1500);
    }

    #[test]
    fn test_timestamp_saturates_out_of_range() {
        let before_epoch = DateTime::from_timestamp(-86_400, 0).unwrap();
        assert_eq!(Timestamp::from(before_epoch).as_millis(), 0);

        let far_future = DateTime::from_timestamp(10_000_000_000, 0).unwrap();
        let saturated = Timestamp::from(far_future);
        assert_eq!(saturated.to_datetime(), DateTime::from_timestamp_nanos(i64::MAX));

        let overflowing = Timestamp::from_millis(u64::MAX);
        assert_eq!(overflowing.to_datetime(), DateTime::from_timestamp_nanos(i64::MAX));
    }

    #[test]
    fn test_comp_id() {
        let id = CompId::new("SENDER").unwrap();
        assert_eq!(id.as_str(), "SENDER");
        assert_eq!(id.to_string(), "SENDER");
    }

    #[test]
    fn test_comp_id_too_long() {
        let long_str = "A".repeat(COMP_ID_MAX_LEN + 1);
        assert!(CompId::new(&long_str).is_none());
        assert!(long_str.parse::<CompId>().is_err());
    }
}
