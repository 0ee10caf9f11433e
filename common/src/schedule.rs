use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    error::ConfigError,
    window::{clock_seconds, TimeWindow},
};

/// Time table for one TRV.
///
/// Windows are tried in configured order and the first one containing the
/// clock wins; `default_temperature` applies when none does. Overlapping
/// windows are rejected by [`Schedule::validate`], so the order only matters
/// for configs built by hand.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Schedule {
    pub topic: String,
    #[serde(rename = "defaultTemperature")]
    pub default_temperature: i32,
    #[serde(rename = "timeTable", default)]
    pub time_table: Vec<TimeWindow>,
}

impl Schedule {
    /// Parses and validates the JSON form:
    /// `{"topic": "..", "defaultTemperature": 22, "timeTable": [{"start": "22:30", "end": "05:30", "temperature": 18}]}`
    pub fn parse(json: &str) -> Result<Self, ConfigError> {
        debug!("parsing time table: {json}");
        let schedule: Schedule = serde_json::from_str(json)?;
        schedule.validate()?;
        Ok(schedule)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.topic.trim().is_empty() {
            return Err(ConfigError::EmptyScheduleTopic);
        }

        if let Some(window) = self.time_table.iter().find(|w| !w.is_within_day()) {
            return Err(ConfigError::WindowOutOfRange {
                topic: self.topic.clone(),
                window: *window,
            });
        }

        if let Some((first, second)) = self.first_overlap() {
            return Err(ConfigError::OverlappingWindows {
                topic: self.topic.clone(),
                first,
                second,
            });
        }

        Ok(())
    }

    pub fn first_overlap(&self) -> Option<(TimeWindow, TimeWindow)> {
        self.time_table.iter().enumerate().find_map(|(i, first)| {
            self.time_table[i + 1..]
                .iter()
                .find(|second| first.overlaps(second))
                .map(|second| (*first, *second))
        })
    }

    pub fn temperature_at(&self, clock_seconds: u32) -> i32 {
        self.time_table
            .iter()
            .find(|window| window.contains(clock_seconds))
            .map(|window| window.temperature)
            .unwrap_or(self.default_temperature)
    }

    pub fn current_temperature(&self, now: DateTime<FixedOffset>) -> i32 {
        self.temperature_at(clock_seconds(&now))
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::window::seconds_from_midnight;

    const TOPIC: &str = "myhome-kr/livingroom/danfoss-thermo-01";

    fn fixed_time(day: u32, hour: u32, minute: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(3600)
            .unwrap()
            .with_ymd_and_hms(2023, 2, day, hour, minute, 0)
            .unwrap()
    }

    fn evening_and_night() -> Schedule {
        Schedule {
            topic: TOPIC.to_string(),
            default_temperature: 22,
            time_table: vec![
                TimeWindow::new(
                    seconds_from_midnight(15, 30),
                    seconds_from_midnight(20, 0),
                    25,
                ),
                TimeWindow::new(
                    seconds_from_midnight(22, 0),
                    seconds_from_midnight(5, 0),
                    18,
                ),
            ],
        }
    }

    #[test]
    fn resolves_window_or_default() {
        let schedule = evening_and_night();

        assert_eq!(schedule.current_temperature(fixed_time(3, 16, 0)), 25);
        assert_eq!(schedule.current_temperature(fixed_time(3, 21, 0)), 22);
        assert_eq!(schedule.current_temperature(fixed_time(4, 2, 15)), 18);
        assert_eq!(schedule.current_temperature(fixed_time(4, 6, 30)), 22);
    }

    #[test]
    fn first_matching_window_wins() {
        let schedule = Schedule {
            topic: TOPIC.to_string(),
            default_temperature: 20,
            time_table: vec![
                TimeWindow::new(seconds_from_midnight(6, 0), seconds_from_midnight(22, 0), 21),
                TimeWindow::new(seconds_from_midnight(12, 0), seconds_from_midnight(13, 0), 24),
            ],
        };

        assert_eq!(schedule.temperature_at(seconds_from_midnight(12, 30)), 21);
        assert!(schedule.validate().is_err());
    }

    #[test]
    fn empty_table_always_uses_default() {
        let schedule = Schedule {
            topic: TOPIC.to_string(),
            default_temperature: 19,
            time_table: Vec::new(),
        };

        assert_eq!(schedule.current_temperature(fixed_time(4, 0, 0)), 19);
        assert_eq!(schedule.current_temperature(fixed_time(4, 23, 59)), 19);
    }

    #[test]
    fn parses_time_table_json() {
        let schedule = Schedule::parse(
            r#"
            {
                "topic": "myhome-kr/livingroom/danfoss-thermo-01",
                "defaultTemperature": 22,
                "timeTable": [
                    { "start": "22:00", "end": "06:00", "temperature": 18 }
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(schedule.topic, TOPIC);
        assert_eq!(schedule.default_temperature, 22);
        assert_eq!(
            schedule.time_table,
            vec![TimeWindow::new(79_200, 21_600, 18)]
        );
    }

    #[test]
    fn rejects_overlapping_windows() {
        let err = Schedule::parse(
            r#"
            {
                "topic": "bedroom",
                "defaultTemperature": 22,
                "timeTable": [
                    { "start": "22:00", "end": "06:00", "temperature": 18 },
                    { "start": "05:00", "end": "07:00", "temperature": 20 }
                ]
            }"#,
        )
        .unwrap_err();

        assert!(matches!(err, ConfigError::OverlappingWindows { .. }));
    }

    #[test]
    fn rejects_malformed_config() {
        assert!(matches!(
            Schedule::parse(r#"{ "topic": "bedroom", "#),
            Err(ConfigError::Json(_))
        ));
        assert!(matches!(
            Schedule::parse(r#"{ "topic": "", "defaultTemperature": 22 }"#),
            Err(ConfigError::EmptyScheduleTopic)
        ));
        assert!(matches!(
            Schedule::parse(
                r#"{ "topic": "x", "defaultTemperature": 22,
                     "timeTable": [{ "start": "7am", "end": "08:00", "temperature": 1 }] }"#
            ),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn rejects_window_past_midnight_bound() {
        let schedule = Schedule {
            topic: TOPIC.to_string(),
            default_temperature: 22,
            time_table: vec![TimeWindow::new(0, 86_400, 18)],
        };

        assert!(matches!(
            schedule.validate(),
            Err(ConfigError::WindowOutOfRange { .. })
        ));
    }
}
