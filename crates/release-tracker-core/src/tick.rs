//! Release timestamps as integer identifiers.
//!
//! A [`Tick`] counts nanoseconds since the Unix epoch (UTC). It is the form in
//! which callers name a release's timestamp, so the codec must round-trip
//! exactly: `Tick::from(t).to_datetime() == Some(t)` for every instant chrono
//! can represent. The count is an unbounded integer, so encoding never
//! overflows.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use num_bigint::BigInt;
use serde::{Serialize, Serializer};

const NANOS_PER_SECOND: i128 = 1_000_000_000;

/// Nanoseconds since `1970-01-01T00:00:00Z`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tick(BigInt);

impl Tick {
    pub fn new(nanos: impl Into<BigInt>) -> Self {
        Self(nanos.into())
    }

    /// The current instant.
    pub fn now() -> Self {
        Self::from(Utc::now())
    }

    /// Decode back to an instant.
    ///
    /// `None` when the count lies outside the range chrono can represent;
    /// rejecting such ticks is the caller's input validation.
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        let nanos = i128::try_from(&self.0).ok()?;
        let secs = i64::try_from(nanos.div_euclid(NANOS_PER_SECOND)).ok()?;
        let subsec = u32::try_from(nanos.rem_euclid(NANOS_PER_SECOND)).ok()?;
        DateTime::from_timestamp(secs, subsec)
    }

    /// Parse an RFC 3339 timestamp such as `2024-08-23T16:52:00.5+02:00`.
    pub fn from_rfc3339(input: &str) -> Option<Self> {
        DateTime::parse_from_rfc3339(input)
            .ok()
            .map(|t| Self::from(t.with_timezone(&Utc)))
    }
}

impl From<DateTime<Utc>> for Tick {
    fn from(instant: DateTime<Utc>) -> Self {
        let nanos = i128::from(instant.timestamp()) * NANOS_PER_SECOND
            + i128::from(instant.timestamp_subsec_nanos());
        Self(BigInt::from(nanos))
    }
}

impl fmt::Display for Tick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Tick {
    type Err = num_bigint::ParseBigIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BigInt::from_str(s).map(Self)
    }
}

/// Ticks are written as JSON numbers. Counts beyond `i128` fall back to a
/// decimal string since serde has no wider integer.
impl Serialize for Tick {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match i128::try_from(&self.0) {
            Ok(nanos) => serializer.serialize_i128(nanos),
            Err(_) => serializer.serialize_str(&self.0.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn round_trip_keeps_nanoseconds() {
        let instant = Utc.timestamp_nanos(1_724_424_720_123_456_789);
        let tick = Tick::from(instant);
        assert_eq!(tick.to_string(), "1724424720123456789");
        assert_eq!(tick.to_datetime(), Some(instant));
    }

    #[test]
    fn round_trip_before_epoch() {
        let instant = Utc.with_ymd_and_hms(1969, 12, 31, 23, 59, 59).unwrap()
            + chrono::Duration::nanoseconds(250);
        let tick = Tick::from(instant);
        assert_eq!(tick, Tick::new(-999_999_750i64));
        assert_eq!(tick.to_datetime(), Some(instant));
    }

    #[test]
    fn round_trip_at_chrono_extremes() {
        for instant in [DateTime::<Utc>::MIN_UTC, DateTime::<Utc>::MAX_UTC] {
            assert_eq!(Tick::from(instant).to_datetime(), Some(instant));
        }
    }

    #[test]
    fn encoding_is_monotonic() {
        let a = Utc.timestamp_nanos(1_000);
        let b = Utc.timestamp_nanos(1_001);
        let c = Utc.with_ymd_and_hms(2500, 1, 1, 0, 0, 0).unwrap();
        assert!(Tick::from(a) < Tick::from(b));
        assert!(Tick::from(b) < Tick::from(c));
    }

    #[test]
    fn out_of_range_tick_does_not_decode() {
        let huge: Tick = "99999999999999999999999999999999999999999".parse().unwrap();
        assert_eq!(huge.to_datetime(), None);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!("12a".parse::<Tick>().is_err());
        assert_eq!("42".parse::<Tick>().unwrap(), Tick::new(42));
    }

    #[test]
    fn from_rfc3339_honours_offset() {
        let tick = Tick::from_rfc3339("1970-01-01T01:00:00.000000001+01:00").unwrap();
        assert_eq!(tick, Tick::new(1));
        assert!(Tick::from_rfc3339("yesterday").is_none());
    }

    #[test]
    fn serializes_as_json_number() {
        let json = serde_json::to_string(&Tick::new(1_724_424_720_123_456_789i64)).unwrap();
        assert_eq!(json, "1724424720123456789");
    }
}
