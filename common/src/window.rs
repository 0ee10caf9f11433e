use std::fmt;

use chrono::Timelike;
use serde::{Deserialize, Serialize};

pub const SECONDS_PER_DAY: u32 = 86_400;

/// One interval of a day with the temperature that applies inside it.
///
/// Bounds are seconds from midnight. `start == end == 0` covers the whole day,
/// `start > end` wraps over midnight (e.g. 22:00 - 06:00). Both bounds are
/// inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    #[serde(with = "clock")]
    pub start: u32,
    #[serde(with = "clock")]
    pub end: u32,
    pub temperature: i32,
}

impl TimeWindow {
    pub fn new(start: u32, end: u32, temperature: i32) -> Self {
        Self {
            start,
            end,
            temperature,
        }
    }

    pub fn is_all_day(&self) -> bool {
        self.start == 0 && self.end == 0
    }

    pub fn wraps_midnight(&self) -> bool {
        self.start > self.end
    }

    pub fn is_within_day(&self) -> bool {
        self.start < SECONDS_PER_DAY && self.end < SECONDS_PER_DAY
    }

    pub fn contains(&self, clock_seconds: u32) -> bool {
        if self.is_all_day() {
            true
        } else if self.wraps_midnight() {
            clock_seconds >= self.start || clock_seconds <= self.end
        } else {
            self.start <= clock_seconds && clock_seconds <= self.end
        }
    }

    /// True when both windows share at least one instant.
    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        self.spans().iter().any(|&(lo, hi)| {
            other
                .spans()
                .iter()
                .any(|&(other_lo, other_hi)| lo <= other_hi && other_lo <= hi)
        })
    }

    // Closed non-wrapping ranges on 0..=86400 covering this window.
    fn spans(&self) -> Vec<(u32, u32)> {
        if self.is_all_day() {
            vec![(0, SECONDS_PER_DAY)]
        } else if self.wraps_midnight() {
            vec![(self.start, SECONDS_PER_DAY), (0, self.end)]
        } else {
            vec![(self.start, self.end)]
        }
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{} ({}°C)",
            clock::format(self.start),
            clock::format(self.end),
            self.temperature
        )
    }
}

pub fn seconds_from_midnight(hours: u32, minutes: u32) -> u32 {
    hours * 3_600 + minutes * 60
}

/// Wall clock reduced to the minute, matching the `HH:MM` resolution of
/// configured windows.
pub fn clock_seconds<T: Timelike>(now: &T) -> u32 {
    seconds_from_midnight(now.hour(), now.minute())
}

/// `HH:MM` <-> seconds from midnight.
pub mod clock {
    use serde::{de, Deserialize, Deserializer, Serializer};

    use super::seconds_from_midnight;

    pub fn parse(value: &str) -> Option<u32> {
        let (hours, minutes) = value.trim().split_once(':')?;
        let hours: u32 = hours.parse().ok()?;
        let minutes: u32 = minutes.parse().ok()?;
        if hours > 23 || minutes > 59 {
            return None;
        }
        Some(seconds_from_midnight(hours, minutes))
    }

    pub fn format(seconds: u32) -> String {
        format!("{:02}:{:02}", seconds / 3_600, (seconds % 3_600) / 60)
    }

    pub fn serialize<S: Serializer>(seconds: &u32, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(*seconds))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| {
            de::Error::custom(format!("invalid clock time '{raw}', expected HH:MM"))
        })
    }
}
