use std::{
    path::PathBuf,
    sync::{Arc, OnceLock},
    time::{Duration, Instant},
};

use anyhow::Context;
use chrono::{DateTime, Utc};
use rumqttc::{AsyncClient, Event, Incoming, Outgoing, QoS};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use homeaut_common::{
    lifecycle::shutdown_signal,
    transport::{deliver, mqtt_options},
    MqttConfig, TandemConfig, TandemSynchronizer,
};

const CONFIG_PATH_ENV: &str = "HOMEAUT_TANDEM_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "./.homeaut/tandem.json";
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    info!("=== starting thermo head <---> sensor synchronizer ===");

    let config = load_config().await?;
    let cron_schedule = config.cron_schedule()?;
    info!("sensor --> TRV sync interval: {}", config.cron);
    for link in &config.tandems {
        info!("paired {} --> {}", link.sensor_topic, link.trv_topic);
    }

    let sync = Arc::new(TandemSynchronizer::new(
        &config.tandems,
        config.sensor_timeout_ms,
    ));

    let mqtt_config = MqttConfig::from_env();
    info!("mqtt broker: {}:{}", mqtt_config.host, mqtt_config.port);
    let (mqtt, eventloop) = AsyncClient::new(mqtt_options(&mqtt_config, "tss"), 64);

    let mqtt_task = spawn_mqtt_loop(Arc::clone(&sync), mqtt.clone(), eventloop);
    let sync_task = spawn_sync_loop(Arc::clone(&sync), mqtt.clone(), cron_schedule);

    shutdown_signal()
        .await
        .context("failed to listen for shutdown signal")?;

    info!("disassembling all sensor --> TRV tandems");
    sync_task.abort();

    let shutdown = async {
        let failures = deliver(&mqtt, sync.disarm()).await;
        if !failures.is_empty() {
            warn!("{} TRV(s) were not told their sensor is gone", failures.len());
        }
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

async fn load_config() -> anyhow::Result<TandemConfig> {
    let path = std::env::var(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

    let raw = tokio::fs::read_to_string(&path)
        .await
        .with_context(|| format!("failed to read tandem config {}", path.display()))?;
    let config = TandemConfig::parse(&raw)
        .with_context(|| format!("invalid tandem config {}", path.display()))?;

    info!(
        "loaded {} tandem(s) from {}",
        config.tandems.len(),
        path.display()
    );
    Ok(config)
}

fn spawn_mqtt_loop(
    sync: Arc<TandemSynchronizer>,
    mqtt: AsyncClient,
    mut eventloop: rumqttc::EventLoop,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Incoming::Publish(message))) => {
                    handle_sensor_message(&sync, &message.topic, &message.payload);
                }
                Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                    info!("mqtt connected");
                    // Clean sessions drop subscriptions, so renew them on every connect.
                    subscribe_sensors(&sync, &mqtt);
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

fn subscribe_sensors(sync: &TandemSynchronizer, mqtt: &AsyncClient) {
    for topic in sync.sensor_topics() {
        // Runs on the event loop task, so it must not wait for queue space.
        match mqtt.try_subscribe(topic.clone(), QoS::AtMostOnce) {
            Ok(()) => info!("topic {topic} subscribed"),
            Err(err) => warn!("subscription of {topic} failed: {err}"),
        }
    }
}

fn handle_sensor_message(sync: &TandemSynchronizer, topic: &str, payload: &[u8]) {
    debug!("sensor message received on {topic} ({} bytes)", payload.len());
    match sync.handle_sensor_message(topic, payload, monotonic_ms()) {
        Ok(0) => debug!("no tandem listens to {topic}"),
        Ok(_) => {}
        Err(err) => warn!("can't parse sensor payload ({topic}): {err}"),
    }
}

fn spawn_sync_loop(
    sync: Arc<TandemSynchronizer>,
    mqtt: AsyncClient,
    schedule: cron::Schedule,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        for next in schedule.upcoming(Utc) {
            tokio::time::sleep(delay_until(next, Utc::now())).await;

            let actions = sync.tick(monotonic_ms());
            if actions.is_empty() {
                continue;
            }
            let failures = deliver(&mqtt, actions).await;
            if !failures.is_empty() {
                warn!("{} sensor value(s) not delivered", failures.len());
            }
        }
        warn!("sync schedule has no upcoming runs, stopping sync loop");
    })
}

fn delay_until(next: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (next - now).to_std().unwrap_or(Duration::ZERO)
}

fn monotonic_ms() -> u64 {
    static START: OnceLock<Instant> = OnceLock::new();
    START
        .get_or_init(Instant::now)
        .elapsed()
        .as_millis()
        .try_into()
        .unwrap_or(u64::MAX)
}
