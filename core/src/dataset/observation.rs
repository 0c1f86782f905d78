use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Datetime layouts accepted for the `time` column.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

/// Chronological key of a reading plus the text it was parsed from.
///
/// Numeric times are read as seconds; datetimes are converted to
/// milliseconds since the Unix epoch. Equality and ordering use the key only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Timestamp {
    pub millis: i64,
    pub label: String,
}

impl Timestamp {
    pub fn new(millis: i64, label: impl Into<String>) -> Self {
        Self {
            millis,
            label: label.into(),
        }
    }

    pub fn from_seconds(seconds: f64) -> Self {
        Self::new((seconds * 1000.0).round() as i64, format!("{seconds}"))
    }

    pub fn parse(text: &str) -> Option<Self> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return None;
        }
        if let Ok(seconds) = trimmed.parse::<f64>() {
            if seconds.is_finite() {
                return Some(Self::new((seconds * 1000.0).round() as i64, trimmed));
            }
            return None;
        }
        DATETIME_FORMATS.iter().find_map(|format| {
            NaiveDateTime::parse_from_str(trimmed, format)
                .ok()
                .map(|dt| Self::new(dt.and_utc().timestamp_millis(), trimmed))
        })
    }
}

impl PartialEq for Timestamp {
    fn eq(&self, other: &Self) -> bool {
        self.millis == other.millis
    }
}

impl Eq for Timestamp {}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> Ordering {
        self.millis.cmp(&other.millis)
    }
}

/// One pod's reading at one timestamp: longitude, latitude, elevation, estimate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub value: f64,
}

impl Observation {
    pub fn new(x: f64, y: f64, z: f64, value: f64) -> Self {
        Self { x, y, z, value }
    }

    /// Placeholder for a pod that did not report at a timestamp.
    pub fn missing() -> Self {
        Self::new(f64::NAN, f64::NAN, f64::NAN, f64::NAN)
    }

    pub fn coords(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    pub fn has_gap(&self) -> bool {
        self.value.is_nan() || self.x.is_nan() || self.y.is_nan() || self.z.is_nan()
    }
}

/// Readings of every pod sharing one timestamp, in pod-name order.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub index: usize,
    pub timestamp: Timestamp,
    pub observations: Vec<Observation>,
}

impl Frame {
    pub fn new(index: usize, timestamp: Timestamp, observations: Vec<Observation>) -> Self {
        Self {
            index,
            timestamp,
            observations,
        }
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn gap_count(&self) -> usize {
        self.observations.iter().filter(|o| o.has_gap()).count()
    }

    pub fn points(&self) -> Vec<[f64; 3]> {
        self.observations.iter().map(Observation::coords).collect()
    }

    pub fn values(&self) -> Vec<f64> {
        self.observations.iter().map(|o| o.value).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_and_datetime_times_parse() {
        let numeric = Timestamp::parse("12.5").unwrap();
        assert_eq!(numeric.millis, 12_500);
        assert_eq!(numeric.label, "12.5");

        let early = Timestamp::parse("2022-06-10 06:21:41").unwrap();
        let late = Timestamp::parse("2022-06-10T06:22:41").unwrap();
        assert_eq!(late.millis - early.millis, 60_000);
        assert!(early < late);
    }

    #[test]
    fn unparsable_time_is_rejected() {
        assert!(Timestamp::parse("yesterday").is_none());
        assert!(Timestamp::parse("").is_none());
        assert!(Timestamp::parse("NaN").is_none());
    }

    #[test]
    fn timestamps_compare_by_instant_not_text() {
        assert_eq!(Timestamp::parse("60").unwrap(), Timestamp::new(60_000, "60.0"));
    }

    #[test]
    fn missing_observation_reports_gap() {
        assert!(Observation::missing().has_gap());
        assert!(Observation::new(1.0, 2.0, f64::NAN, 3.0).has_gap());
        assert!(!Observation::new(1.0, 2.0, 3.0, 4.0).has_gap());
    }
}
