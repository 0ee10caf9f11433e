use std::{path::PathBuf, time::Duration};

use anyhow::Context;
use chrono::{DateTime, FixedOffset, Offset, Utc};
use chrono_tz::Tz;
use rumqttc::{AsyncClient, Event, Incoming, Outgoing};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use homeaut_common::{
    lifecycle::shutdown_signal,
    transport::{deliver, mqtt_options},
    MqttConfig, ScheduleEngine, SchedulerConfig,
};

const CONFIG_PATH_ENV: &str = "HOMEAUT_SCHEDULER_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "./.homeaut/scheduler.json";
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    info!("=== starting TRV temperature scheduler ===");

    let config = load_config().await?;
    let timezone = config.timezone()?;
    for schedule in &config.schedulers {
        info!(
            "schedule {}: default {}°C, {} window(s)",
            schedule.topic,
            schedule.default_temperature,
            schedule.time_table.len()
        );
    }

    let mqtt_config = MqttConfig::from_env();
    info!("mqtt broker: {}:{}", mqtt_config.host, mqtt_config.port);
    let (mqtt, eventloop) = AsyncClient::new(mqtt_options(&mqtt_config, "tsc"), 64);
    let mqtt_task = spawn_mqtt_loop(eventloop);

    let engine = ScheduleEngine::new(config.schedulers);
    let tick_task = spawn_tick_loop(
        engine,
        mqtt.clone(),
        timezone,
        Duration::from_secs(config.tick_interval_secs),
    );

    shutdown_signal()
        .await
        .context("failed to listen for shutdown signal")?;

    info!("shutting down scheduler");
    tick_task.abort();

    let shutdown = async {
        if let Err(err) = mqtt.disconnect().await {
            warn!("mqtt disconnect failed: {err}");
        }
        let _ = mqtt_task.await;
    };
    if tokio::time::timeout(SHUTDOWN_TIMEOUT, shutdown).await.is_err() {
        warn!("shutdown did not finish within {SHUTDOWN_TIMEOUT:?}");
    }
    Ok(())
}

async fn load_config() -> anyhow::Result<SchedulerConfig> {
    let path = std::env::var(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

    let raw = tokio::fs::read_to_string(&path)
        .await
        .with_context(|| format!("failed to read scheduler config {}", path.display()))?;
    let config = SchedulerConfig::parse(&raw)
        .with_context(|| format!("invalid scheduler config {}", path.display()))?;

    info!(
        "loaded {} schedule(s) from {} (timezone {})",
        config.schedulers.len(),
        path.display(),
        config.timezone
    );
    Ok(config)
}

fn spawn_mqtt_loop(mut eventloop: rumqttc::EventLoop) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                    info!("mqtt connected");
                }
                Ok(Event::Outgoing(Outgoing::Disconnect)) => break,
                Ok(_) => {}
                Err(err) => {
                    warn!("mqtt poll error: {err}");
                    tokio::time::sleep(Duration::from_secs(2)).await;
                }
            }
        }
    })
}

fn spawn_tick_loop(
    engine: ScheduleEngine,
    mqtt: AsyncClient,
    timezone: Tz,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;

            let actions = engine.tick(now_in_timezone(timezone));
            if actions.is_empty() {
                continue;
            }
            let failures = deliver(&mqtt, actions).await;
            if !failures.is_empty() {
                warn!("{} scheduled setpoint(s) not delivered", failures.len());
            }
        }
    })
}

fn now_in_timezone(timezone: Tz) -> DateTime<FixedOffset> {
    to_local(Utc::now(), timezone)
}

fn to_local(now: DateTime<Utc>, timezone: Tz) -> DateTime<FixedOffset> {
    let local = now.with_timezone(&timezone);
    local.with_timezone(&local.offset().fix())
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Timelike};

    use super::*;

    #[test]
    fn local_clock_follows_timezone_and_dst() {
        let winter = Utc.with_ymd_and_hms(2023, 2, 3, 21, 30, 0).unwrap();
        let summer = Utc.with_ymd_and_hms(2023, 7, 3, 21, 30, 0).unwrap();

        let prague_winter = to_local(winter, chrono_tz::Europe::Prague);
        let prague_summer = to_local(summer, chrono_tz::Europe::Prague);

        assert_eq!((prague_winter.hour(), prague_winter.minute()), (22, 30));
        assert_eq!((prague_summer.hour(), prague_summer.minute()), (23, 30));
        assert_eq!(to_local(winter, Tz::UTC).hour(), 21);
    }
}
