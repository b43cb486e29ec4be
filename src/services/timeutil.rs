//! Minute-offset time arithmetic shared by the calendar, pricing and
//! availability layers. Every overlap decision in the system goes through
//! [`TimeInterval::overlaps`] so the comparison cannot drift between call
//! sites.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub const MINUTES_PER_DAY: u16 = 1440;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum TimeError {
    #[error("invalid time format: {0} (expected HH:MM)")]
    InvalidFormat(String),

    #[error("invalid time range: end {end} must be after start {start}")]
    InvalidRange { start: String, end: String },
}

/// Parse an `HH:MM` 24-hour string into minutes since midnight.
pub fn parse_time(s: &str) -> Result<u16, TimeError> {
    let err = || TimeError::InvalidFormat(s.to_string());

    let (hour_str, minute_str) = s.split_once(':').ok_or_else(err)?;
    if hour_str.is_empty() || hour_str.len() > 2 || minute_str.len() != 2 {
        return Err(err());
    }
    if !hour_str.bytes().all(|b| b.is_ascii_digit())
        || !minute_str.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(err());
    }

    let hour: u16 = hour_str.parse().map_err(|_| err())?;
    let minute: u16 = minute_str.parse().map_err(|_| err())?;
    if hour > 23 || minute > 59 {
        return Err(err());
    }

    Ok(hour * 60 + minute)
}

/// Render minutes since midnight back to the canonical `HH:MM` wire format.
pub fn format_time(minutes: u16) -> String {
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

/// Serde adapter for minute offsets carried as `HH:MM` strings on the wire.
pub mod hhmm {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::{format_time, parse_time};

    pub fn serialize<S: Serializer>(minutes: &u16, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_time(*minutes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u16, D::Error> {
        let s = String::deserialize(deserializer)?;
        parse_time(&s).map_err(D::Error::custom)
    }
}

/// A half-open `[start, end)` window within a single day.
///
/// Only constructible through the validating constructors, including via
/// serde, so a held value always satisfies `start < end <= 1440`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeInterval {
    start: u16,
    end: u16,
}

#[derive(Serialize, Deserialize)]
struct TimeIntervalWire {
    #[serde(with = "hhmm")]
    start_time: u16,
    #[serde(with = "hhmm")]
    end_time: u16,
}

impl Serialize for TimeInterval {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        TimeIntervalWire {
            start_time: self.start,
            end_time: self.end,
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for TimeInterval {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = TimeIntervalWire::deserialize(deserializer)?;
        TimeInterval::new(wire.start_time, wire.end_time).map_err(D::Error::custom)
    }
}

impl TimeInterval {
    pub fn new(start: u16, end: u16) -> Result<Self, TimeError> {
        if end <= start || end > MINUTES_PER_DAY {
            return Err(TimeError::InvalidRange {
                start: format_time(start),
                end: format_time(end.min(MINUTES_PER_DAY)),
            });
        }
        Ok(Self { start, end })
    }

    pub fn from_strings(start: &str, end: &str) -> Result<Self, TimeError> {
        Self::new(parse_time(start)?, parse_time(end)?)
    }

    pub fn start(&self) -> u16 {
        self.start
    }

    pub fn end(&self) -> u16 {
        self.end
    }

    pub fn start_string(&self) -> String {
        format_time(self.start)
    }

    pub fn end_string(&self) -> String {
        format_time(self.end)
    }

    /// Half-open overlap: touching endpoints do not conflict, so 10:00-11:00
    /// and 11:00-12:00 are compatible.
    pub fn overlaps(&self, other: &TimeInterval) -> bool {
        self.start < other.end && self.end > other.start
    }

    /// True when `self` lies entirely inside `other`.
    pub fn within(&self, other: &TimeInterval) -> bool {
        self.start >= other.start && self.end <= other.end
    }

    pub fn duration_minutes(&self) -> u16 {
        self.end - self.start
    }

    pub fn duration_hours(&self) -> f64 {
        f64::from(self.duration_minutes()) / 60.0
    }

    /// Minutes of `self` that fall inside `other`. Used by pricing to
    /// pro-rate a slot that straddles the peak boundary.
    pub fn minutes_within(&self, other: &TimeInterval) -> u16 {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        end.saturating_sub(start)
    }
}
