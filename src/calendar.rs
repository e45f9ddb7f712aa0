//! Calendar-day keys.
//!
//! A day key is the local calendar date of an instant, re-expressed as UTC
//! midnight of that date. Every entry date and every "today" goes through
//! [`DayKey::from_instant`], so duplicate detection, streaks and chart series
//! all agree on where a day starts.

use chrono::{DateTime, Duration, Local, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

pub const MILLIS_PER_DAY: i64 = 86_400_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DayKey(DateTime<Utc>);

impl DayKey {
    /// Truncates using the local clock's year/month/day.
    pub fn from_instant(instant: DateTime<Utc>) -> Self {
        Self::from_date(instant.with_timezone(&Local).date_naive())
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self(date.and_time(NaiveTime::MIN).and_utc())
    }

    pub fn today() -> Self {
        Self::from_instant(Utc::now())
    }

    pub fn parse(raw: &str) -> Option<Self> {
        NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
            .ok()
            .map(Self::from_date)
    }

    pub fn as_instant(self) -> DateTime<Utc> {
        self.0
    }

    pub fn is_same_day(self, other: DayKey) -> bool {
        self.0.timestamp_millis() == other.0.timestamp_millis()
    }

    /// True when `self` is exactly one day before `next`.
    pub fn is_day_before(self, next: DayKey) -> bool {
        next.0.timestamp_millis() - self.0.timestamp_millis() == MILLIS_PER_DAY
    }

    pub fn minus_days(self, days: i64) -> Self {
        Self(self.0 - Duration::days(days))
    }

    pub fn iso(self) -> String {
        self.0.format("%Y-%m-%d").to_string()
    }
}

impl fmt::Display for DayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.iso())
    }
}

impl Serialize for DayKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.iso())
    }
}

impl<'de> Deserialize<'de> for DayKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DayKey::parse(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid calendar date: {raw}")))
    }
}
