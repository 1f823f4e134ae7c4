use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// UTC timestamp with millisecond precision, formatted as ISO-8601 on the
/// wire (§6.1: "Timestamps are UTC ISO-8601 with millisecond precision").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    pub fn now() -> Self {
        Self(Utc::now())
    }

    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    pub fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }

    pub fn to_rfc3339_millis(&self) -> String {
        self.0.to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_rfc3339_millis())
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_with_millisecond_precision() {
        let ts = Timestamp::now();
        let s = ts.to_rfc3339_millis();
        // e.g. 2026-07-27T12:00:00.123Z
        assert!(s.ends_with('Z'));
        assert_eq!(s.len(), 24);
    }

    #[test]
    fn ordering_is_monotonic_with_underlying_clock() {
        let a = Timestamp::now();
        let b = Timestamp::now();
        assert!(a <= b);
    }
}
