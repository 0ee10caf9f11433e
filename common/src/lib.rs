pub mod config;
pub mod engine;
pub mod error;
pub mod lifecycle;
pub mod schedule;
pub mod sensors;
pub mod state;
pub mod tandem;
pub mod topics;
pub mod transport;
pub mod types;
pub mod window;

pub use config::{MqttConfig, SchedulerConfig, TandemConfig, TandemLinkConfig};
pub use engine::ScheduleEngine;
pub use error::{ConfigError, PayloadError};
pub use schedule::Schedule;
pub use sensors::{external_sensor_format, SonoffTemperatureSensor, EXTERNAL_SENSOR_UNDEFINED};
pub use state::{AppliedStateStore, Evaluation};
pub use tandem::{LinkState, TandemLink, TandemSynchronizer};
pub use topics::*;
pub use types::{DeliveryFailure, PublishAction};
pub use window::TimeWindow;
