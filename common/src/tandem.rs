use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{info, warn};

use crate::{
    config::TandemLinkConfig,
    error::PayloadError,
    sensors::{external_sensor_format, SonoffTemperatureSensor, EXTERNAL_SENSOR_UNDEFINED},
    state::AppliedStateStore,
    topics::external_sensor_topic,
    types::PublishAction,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// A reading arrived within the sensor timeout.
    Fresh,
    /// No reading yet, or the last one is older than the sensor timeout.
    Stale,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorReading {
    pub temperature: f32,
    pub received_ms: u64,
}

/// Sensor -> TRV pairing with a freshness watchdog.
#[derive(Debug, Clone)]
pub struct TandemLink {
    pub sensor_topic: String,
    pub trv_topic: String,
    reading: Option<SensorReading>,
    state: LinkState,
}

impl TandemLink {
    pub fn new(config: &TandemLinkConfig) -> Self {
        Self {
            sensor_topic: config.sensor_topic.clone(),
            trv_topic: config.trv_topic.clone(),
            reading: None,
            state: LinkState::Stale,
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn last_reading(&self) -> Option<SensorReading> {
        self.reading
    }

    pub fn record_reading(&mut self, temperature: f32, now_ms: u64) {
        self.reading = Some(SensorReading {
            temperature,
            received_ms: now_ms,
        });
        self.state = LinkState::Fresh;
    }

    /// Runs the watchdog and returns the value the TRV should get.
    pub fn forward_value(&mut self, now_ms: u64, sensor_timeout_ms: u64) -> i32 {
        match (self.state, self.reading) {
            (LinkState::Fresh, Some(reading)) => {
                let silent_ms = now_ms.saturating_sub(reading.received_ms);
                if silent_ms > sensor_timeout_ms {
                    warn!(
                        "haven't received data from sensor {} for {} minutes, disassembling tandem",
                        self.sensor_topic,
                        silent_ms / 60_000
                    );
                    self.state = LinkState::Stale;
                    EXTERNAL_SENSOR_UNDEFINED
                } else {
                    external_sensor_format(reading.temperature)
                }
            }
            _ => {
                self.state = LinkState::Stale;
                EXTERNAL_SENSOR_UNDEFINED
            }
        }
    }
}

/// Forwards sensor readings to their paired TRVs.
///
/// Readings arrive from the MQTT handler while ticks come from the cron
/// driver, both through `&self`. TRVs start out assumed to be without an
/// external sensor, which is also the state [`TandemSynchronizer::disarm`]
/// leaves them in.
#[derive(Debug)]
pub struct TandemSynchronizer {
    links: Mutex<Vec<TandemLink>>,
    applied: AppliedStateStore,
    sensor_timeout_ms: u64,
}

impl TandemSynchronizer {
    pub fn new(links: &[TandemLinkConfig], sensor_timeout_ms: u64) -> Self {
        let applied = AppliedStateStore::new();
        for link in links {
            applied.record(&link.trv_topic, EXTERNAL_SENSOR_UNDEFINED);
        }

        Self {
            links: Mutex::new(links.iter().map(TandemLink::new).collect()),
            applied,
            sensor_timeout_ms,
        }
    }

    pub fn sensor_timeout_ms(&self) -> u64 {
        self.sensor_timeout_ms
    }

    pub fn applied(&self) -> &AppliedStateStore {
        &self.applied
    }

    pub fn sensor_topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self
            .lock_links()
            .iter()
            .map(|link| link.sensor_topic.clone())
            .collect();
        topics.sort();
        topics.dedup();
        topics
    }

    pub fn link_state(&self, trv_topic: &str) -> Option<LinkState> {
        self.lock_links()
            .iter()
            .find(|link| link.trv_topic == trv_topic)
            .map(TandemLink::state)
    }

    /// Parses a sensor message and stores the reading on every link fed by
    /// `sensor_topic`. Returns how many links were updated; a rejected
    /// payload leaves all links untouched.
    pub fn handle_sensor_message(
        &self,
        sensor_topic: &str,
        payload: &[u8],
        now_ms: u64,
    ) -> Result<usize, PayloadError> {
        let sensor = SonoffTemperatureSensor::from_payload(payload)?;
        Ok(self.record_reading(sensor_topic, sensor.temperature, now_ms))
    }

    pub fn record_reading(&self, sensor_topic: &str, temperature: f32, now_ms: u64) -> usize {
        let mut links = self.lock_links();
        let mut updated = 0;
        for link in links
            .iter_mut()
            .filter(|link| link.sensor_topic == sensor_topic)
        {
            link.record_reading(temperature, now_ms);
            updated += 1;
        }

        if updated > 0 {
            info!("setting new current temp = {temperature}°C ({sensor_topic})");
        }
        updated
    }

    pub fn tick(&self, now_ms: u64) -> Vec<PublishAction> {
        let mut links = self.lock_links();
        links
            .iter_mut()
            .filter_map(|link| {
                let value = link.forward_value(now_ms, self.sensor_timeout_ms);
                let value = self
                    .applied
                    .evaluate(&link.trv_topic, value)
                    .value_to_publish()?;
                info!(
                    "sending sensor value {value} from {} to the thermo head {}",
                    link.sensor_topic, link.trv_topic
                );
                Some(PublishAction::new(external_sensor_topic(&link.trv_topic), value))
            })
            .collect()
    }

    /// Tells every TRV that its external sensor is gone, regardless of the
    /// link state. Meant to run once before the transport shuts down.
    pub fn disarm(&self) -> Vec<PublishAction> {
        self.lock_links()
            .iter()
            .map(|link| {
                self.applied
                    .record(&link.trv_topic, EXTERNAL_SENSOR_UNDEFINED);
                PublishAction::new(
                    external_sensor_topic(&link.trv_topic),
                    EXTERNAL_SENSOR_UNDEFINED,
                )
            })
            .collect()
    }

    fn lock_links(&self) -> MutexGuard<'_, Vec<TandemLink>> {
        self.links.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
