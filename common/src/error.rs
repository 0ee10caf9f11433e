use thiserror::Error;

use crate::window::TimeWindow;

/// Problems found while loading configuration. Any of these must keep the
/// owning service from starting.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config is not valid json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("schedule topic must not be empty")]
    EmptyScheduleTopic,

    #[error("duplicate schedule for topic {0}")]
    DuplicateSchedule(String),

    #[error("window {window} of {topic} is outside of a day")]
    WindowOutOfRange { topic: String, window: TimeWindow },

    #[error("overlapping windows in schedule {topic}: {first} and {second}")]
    OverlappingWindows {
        topic: String,
        first: TimeWindow,
        second: TimeWindow,
    },

    #[error("sensor or TRV topic is empty")]
    EmptyTandemTopic,

    #[error("TRV {0} is paired with more than one sensor")]
    DuplicateTandem(String),

    #[error("unknown timezone '{0}'")]
    UnknownTimezone(String),

    #[error("sync interval must be set")]
    MissingCron,

    #[error("invalid cron expression '{expression}': {source}")]
    InvalidCron {
        expression: String,
        #[source]
        source: cron::error::Error,
    },

    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),
}

/// Reasons an inbound sensor message is ignored.
#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("payload of {0} bytes exceeds limit")]
    TooLarge(usize),

    #[error("payload is not utf-8")]
    NotUtf8(#[from] std::str::Utf8Error),

    #[error("invalid payload, not a sonoff temperature sensor format: {0}")]
    Json(#[from] serde_json::Error),

    #[error("temperature {0} is not a finite number")]
    NotFinite(f32),
}
