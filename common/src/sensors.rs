use serde::{Deserialize, Serialize};

use crate::error::PayloadError;

/// Danfoss TRV value meaning "no external sensor data".
pub const EXTERNAL_SENSOR_UNDEFINED: i32 = -8000;
/// Highest external temperature the TRV accepts, in 1/100 °C.
pub const EXTERNAL_SENSOR_MAX: i32 = 3500;

pub const MAX_SENSOR_PAYLOAD_BYTES: usize = 512;

/// Converts °C to the TRV's external sensor format (1/100 °C).
///
/// Anything the TRV cannot represent becomes [`EXTERNAL_SENSOR_UNDEFINED`].
pub fn external_sensor_format(temperature: f32) -> i32 {
    if temperature == EXTERNAL_SENSOR_UNDEFINED as f32 {
        return EXTERNAL_SENSOR_UNDEFINED;
    }
    if !temperature.is_finite() {
        return EXTERNAL_SENSOR_UNDEFINED;
    }

    // `as` saturates, so huge readings land above the range check.
    let scaled = (temperature * 100.0).round() as i32;
    if !(EXTERNAL_SENSOR_UNDEFINED..=EXTERNAL_SENSOR_MAX).contains(&scaled) {
        return EXTERNAL_SENSOR_UNDEFINED;
    }
    scaled
}

/// zigbee2mqtt payload of a Sonoff SNZB-02 temperature sensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SonoffTemperatureSensor {
    #[serde(default)]
    pub battery: Option<f32>,
    #[serde(default)]
    pub humidity: Option<f32>,
    #[serde(default)]
    pub linkquality: Option<i32>,
    pub temperature: f32,
    #[serde(default)]
    pub voltage: Option<i32>,
}

impl SonoffTemperatureSensor {
    pub fn from_payload(payload: &[u8]) -> Result<Self, PayloadError> {
        if payload.len() > MAX_SENSOR_PAYLOAD_BYTES {
            return Err(PayloadError::TooLarge(payload.len()));
        }
        let text = std::str::from_utf8(payload)?;
        let sensor: Self = serde_json::from_str(text)?;
        if !sensor.temperature.is_finite() {
            return Err(PayloadError::NotFinite(sensor.temperature));
        }
        Ok(sensor)
    }
}
