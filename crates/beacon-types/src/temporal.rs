use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Append time of a record, in milliseconds since the UNIX epoch.
///
/// Serialized as a bare integer. Ordering is numeric, which is also the
/// ordering of the store's time index.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Create a timestamp from Unix milliseconds.
    pub const fn from_millis(ms: i64) -> Self {
        Self(ms)
    }

    /// The current wall-clock time.
    pub fn now() -> Self {
        Self(Utc::now().timestamp_millis())
    }

    /// Unix milliseconds.
    pub const fn as_millis(&self) -> i64 {
        self.0
    }

    /// Convert to a UTC datetime. `None` if out of chrono's range.
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::<Utc>::from_timestamp_millis(self.0)
    }

    /// Shift by a signed number of milliseconds, saturating at the bounds.
    pub fn offset_millis(&self, delta: i64) -> Self {
        Self(self.0.saturating_add(delta))
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self(dt.timestamp_millis())
    }
}

/// Accepts either Unix milliseconds (`1700000000000`) or RFC 3339
/// (`2023-11-14T22:13:20Z`).
impl FromStr for Timestamp {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(ms) = s.parse::<i64>() {
            return Ok(Self(ms));
        }
        DateTime::parse_from_rfc3339(s)
            .map(|dt| Self(dt.timestamp_millis()))
            .map_err(|e| TypeError::InvalidTimestamp(format!("{s}: {e}")))
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({}ms)", self.0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_datetime() {
            Some(dt) => write!(f, "{}", dt.to_rfc3339_opts(SecondsFormat::Millis, true)),
            None => write!(f, "{}ms", self.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_is_numeric() {
        assert!(Timestamp::from_millis(-1) < Timestamp::from_millis(0));
        assert!(Timestamp::from_millis(100) < Timestamp::from_millis(101));
    }

    #[test]
    fn now_produces_reasonable_timestamp() {
        // After 2020-01-01.
        assert!(Timestamp::now().as_millis() > 1_577_836_800_000);
    }

    #[test]
    fn parse_millis_and_rfc3339() {
        let a: Timestamp = "1700000000000".parse().unwrap();
        let b: Timestamp = "2023-11-14T22:13:20Z".parse().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_millis(), 1_700_000_000_000);
    }

    #[test]
    fn parse_rejects_garbage() {
        let err = "yesterday".parse::<Timestamp>().unwrap_err();
        assert!(matches!(err, TypeError::InvalidTimestamp(_)));
    }

    #[test]
    fn display_is_rfc3339_millis() {
        let ts = Timestamp::from_millis(1_700_000_000_123);
        assert_eq!(ts.to_string(), "2023-11-14T22:13:20.123Z");
    }

    #[test]
    fn serializes_as_integer() {
        let ts = Timestamp::from_millis(42);
        assert_eq!(serde_json::to_string(&ts).unwrap(), "42");
        let back: Timestamp = serde_json::from_str("42").unwrap();
        assert_eq!(back, ts);
    }

    #[test]
    fn offset_saturates() {
        let ts = Timestamp::from_millis(i64::MAX);
        assert_eq!(ts.offset_millis(1), ts);
        assert_eq!(Timestamp::from_millis(10).offset_millis(-3).as_millis(), 7);
    }
}
