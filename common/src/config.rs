use std::{collections::HashSet, str::FromStr};

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::{error::ConfigError, schedule::Schedule};

pub const DEFAULT_SENSOR_TIMEOUT_MS: u64 = 3 * 60 * 60 * 1000;
pub const DEFAULT_SCHEDULE_TICK_SECS: u64 = 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// IANA name of the zone the time tables are written in.
    pub timezone: String,
    pub tick_interval_secs: u64,
    pub schedulers: Vec<Schedule>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            timezone: "UTC".to_string(),
            tick_interval_secs: DEFAULT_SCHEDULE_TICK_SECS,
            schedulers: Vec::new(),
        }
    }
}

impl SchedulerConfig {
    pub fn parse(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.timezone()?;
        if self.tick_interval_secs == 0 {
            return Err(ConfigError::ZeroDuration("tick_interval_secs"));
        }

        let mut topics = HashSet::new();
        for schedule in &self.schedulers {
            schedule.validate()?;
            if !topics.insert(schedule.topic.as_str()) {
                return Err(ConfigError::DuplicateSchedule(schedule.topic.clone()));
            }
        }
        Ok(())
    }

    pub fn timezone(&self) -> Result<Tz, ConfigError> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| ConfigError::UnknownTimezone(self.timezone.clone()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TandemLinkConfig {
    #[serde(rename = "sensor-topic")]
    pub sensor_topic: String,
    #[serde(rename = "trv-topic")]
    pub trv_topic: String,
}

impl TandemLinkConfig {
    /// Parses `{"sensor-topic": "..", "trv-topic": ".."}`.
    pub fn parse(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sensor_topic.trim().is_empty() || self.trv_topic.trim().is_empty() {
            return Err(ConfigError::EmptyTandemTopic);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TandemConfig {
    /// When readings are pushed to the TRVs, e.g. `*/15 * * * *`.
    pub cron: String,
    pub sensor_timeout_ms: u64,
    pub tandems: Vec<TandemLinkConfig>,
}

impl Default for TandemConfig {
    fn default() -> Self {
        Self {
            cron: String::new(),
            sensor_timeout_ms: DEFAULT_SENSOR_TIMEOUT_MS,
            tandems: Vec::new(),
        }
    }
}

impl TandemConfig {
    pub fn parse(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.cron_schedule()?;
        if self.sensor_timeout_ms == 0 {
            return Err(ConfigError::ZeroDuration("sensor_timeout_ms"));
        }

        let mut trvs = HashSet::new();
        for link in &self.tandems {
            link.validate()?;
            if !trvs.insert(link.trv_topic.as_str()) {
                return Err(ConfigError::DuplicateTandem(link.trv_topic.clone()));
            }
        }
        Ok(())
    }

    pub fn cron_schedule(&self) -> Result<cron::Schedule, ConfigError> {
        if self.cron.trim().is_empty() {
            return Err(ConfigError::MissingCron);
        }
        let expression = normalize_cron(&self.cron);
        cron::Schedule::from_str(&expression).map_err(|source| ConfigError::InvalidCron {
            expression: self.cron.clone(),
            source,
        })
    }
}

/// The `cron` crate wants a seconds field; classic 5-field expressions fire
/// at second zero.
pub fn normalize_cron(expression: &str) -> String {
    let expression = expression.trim();
    if expression.split_whitespace().count() == 5 {
        format!("0 {expression}")
    } else {
        expression.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub pass: String,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 1883,
            user: String::new(),
            pass: String::new(),
        }
    }
}

impl MqttConfig {
    /// Reads `MQTT_HOST`, `MQTT_PORT`, `MQTT_USER` and `MQTT_PASS`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            host: lookup("MQTT_HOST").unwrap_or(defaults.host),
            port: lookup("MQTT_PORT")
                .and_then(|value| value.parse::<u16>().ok())
                .unwrap_or(defaults.port),
            user: lookup("MQTT_USER").unwrap_or(defaults.user),
            pass: lookup("MQTT_PASS").unwrap_or(defaults.pass),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn parses_scheduler_config() {
        let config = SchedulerConfig::parse(
            r#"
            {
                "timezone": "Europe/Prague",
                "schedulers": [
                    {
                        "topic": "myhome-kr/livingroom/danfoss-thermo-01",
                        "defaultTemperature": 22,
                        "timeTable": [{ "start": "22:30", "end": "05:30", "temperature": 18 }]
                    },
                    {
                        "topic": "myhome-kr/bedroom/danfoss-thermo-02",
                        "defaultTemperature": 20
                    }
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(config.timezone().unwrap(), chrono_tz::Europe::Prague);
        assert_eq!(config.tick_interval_secs, DEFAULT_SCHEDULE_TICK_SECS);
        assert_eq!(config.schedulers.len(), 2);
        assert!(config.schedulers[1].time_table.is_empty());
    }

    #[test]
    fn rejects_duplicate_schedule_topics() {
        let err = SchedulerConfig::parse(
            r#"{ "schedulers": [
                { "topic": "trv", "defaultTemperature": 22 },
                { "topic": "trv", "defaultTemperature": 20 }
            ] }"#,
        )
        .unwrap_err();

        assert!(matches!(err, ConfigError::DuplicateSchedule(topic) if topic == "trv"));
    }

    #[test]
    fn rejects_unknown_timezone() {
        assert!(matches!(
            SchedulerConfig::parse(r#"{ "timezone": "Mars/Olympus" }"#),
            Err(ConfigError::UnknownTimezone(_))
        ));
    }

    #[test]
    fn parses_tandem_link() {
        let cases = [
            (
                r#"{ "sensor-topic": "topic1", "trv-topic": "topic2" }"#,
                Some(TandemLinkConfig {
                    sensor_topic: "topic1".to_string(),
                    trv_topic: "topic2".to_string(),
                }),
            ),
            (r#"{ "sensor-topic": "", "trv-topic": "topic2" }"#, None),
            (r#"{ "sensor-topic": "topic1", "trv-topic": "" }"#, None),
            (r#"{ "sensor-topic": "topic1", "#, None),
        ];

        for (json, expected) in cases {
            assert_eq!(TandemLinkConfig::parse(json).ok(), expected, "{json}");
        }
    }

    #[test]
    fn tandem_config_requires_cron() {
        let err = TandemConfig::parse(
            r#"{ "tandems": [{ "sensor-topic": "s", "trv-topic": "t" }] }"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::MissingCron));

        let err = TandemConfig::parse(r#"{ "cron": "every now and then" }"#).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidCron { .. }));
    }

    #[test]
    fn tandem_config_accepts_five_field_cron() {
        let config = TandemConfig::parse(
            r#"{ "cron": "*/15 * * * *", "tandems": [{ "sensor-topic": "s", "trv-topic": "t" }] }"#,
        )
        .unwrap();

        assert_eq!(config.sensor_timeout_ms, DEFAULT_SENSOR_TIMEOUT_MS);
        assert!(config.cron_schedule().is_ok());
        assert_eq!(normalize_cron("*/15 * * * *"), "0 */15 * * * *");
        assert_eq!(normalize_cron("30 */15 * * * *"), "30 */15 * * * *");
    }

    #[test]
    fn rejects_trv_paired_twice() {
        let err = TandemConfig::parse(
            r#"{ "cron": "* * * * *", "tandems": [
                { "sensor-topic": "s1", "trv-topic": "t" },
                { "sensor-topic": "s2", "trv-topic": "t" }
            ] }"#,
        )
        .unwrap_err();

        assert!(matches!(err, ConfigError::DuplicateTandem(_)));
    }

    #[test]
    fn mqtt_config_falls_back_to_defaults() {
        let env: HashMap<&str, &str> =
            HashMap::from([("MQTT_HOST", "broker.lan"), ("MQTT_PORT", "not-a-port")]);

        let config = MqttConfig::from_lookup(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.host, "broker.lan");
        assert_eq!(config.port, 1883);
        assert!(config.user.is_empty());
    }
}
