use rumqttc::{AsyncClient, MqttOptions, QoS};
use tracing::{info, warn};

use crate::{
    config::MqttConfig,
    types::{DeliveryFailure, PublishAction},
};

pub fn mqtt_options(config: &MqttConfig, client_id: &str) -> MqttOptions {
    let mut options = MqttOptions::new(client_id, config.host.clone(), config.port);
    options.set_clean_session(true);
    if !config.user.is_empty() {
        options.set_credentials(config.user.clone(), config.pass.clone());
    }
    options
}

/// Publishes every action once. A failed publish does not stop the rest and
/// is handed back to the caller; nothing is retried.
pub async fn deliver(mqtt: &AsyncClient, actions: Vec<PublishAction>) -> Vec<DeliveryFailure> {
    let mut failures = Vec::new();
    for action in actions {
        info!("publishing {action}");
        if let Err(err) = mqtt
            .publish(action.topic.clone(), QoS::AtLeastOnce, false, action.payload())
            .await
        {
            warn!(
                target: "homeaut::delivery",
                topic = %action.topic,
                value = action.value,
                "publish failed, value stays recorded as applied: {err}"
            );
            failures.push(DeliveryFailure {
                action,
                reason: err.to_string(),
            });
        }
    }
    failures
}
