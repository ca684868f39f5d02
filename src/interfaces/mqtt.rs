use std::env;

use once_cell::sync::Lazy;
use rumqttc::{Client, Connection, MqttOptions, QoS};
use thiserror::Error;

use crate::constants::{defaults, envvars};
use crate::helpers::rand_hex;

static MQTT_HOST: Lazy<String> = Lazy::new(|| {
    if let Ok(host) = env::var(envvars::MQTT_HOST) {
        return host;
    }
    defaults::MQTT_HOST.to_string()
});

static MQTT_PORT: Lazy<u16> = Lazy::new(|| {
    if let Some(port) = env::var(envvars::MQTT_PORT)
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
    {
        return port;
    }
    defaults::MQTT_PORT
});

#[derive(Debug, Clone, PartialEq)]
pub struct MqttMessage {
    pub topic: String,
    pub payload: String,
}

impl MqttMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<String>) -> Self {
        MqttMessage {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum MqttError {
    #[error(transparent)]
    MqttClient(#[from] rumqttc::ClientError),
    #[error(transparent)]
    MqttConnection(#[from] rumqttc::ConnectionError),
}

pub fn get_rand_client_id(prefix: Option<&str>) -> String {
    const RAND_ID_BYTES: usize = 3;
    let randhex = rand_hex(RAND_ID_BYTES);

    if let Some(pref) = prefix {
        format!("{pref}-{randhex}")
    } else {
        randhex
    }
}

pub fn client_conn(client_id: String, clean_session: Option<bool>) -> (Client, Connection) {
    let host = MQTT_HOST.clone();
    let port = *MQTT_PORT;
    log::info!("Establishing MQTT connection to {host}:{port} as {client_id}");

    let mut mqttoptions = MqttOptions::new(client_id, host, port);
    mqttoptions.set_clean_session(clean_session.unwrap_or(true));
    mqttoptions.set_keep_alive(defaults::MQTT_KEEP_ALIVE);

    Client::new(mqttoptions, 10)
}

/// Hand a message to the event loop without waiting for room in its request
/// channel. A full channel comes back as `ClientError::TryRequest`.
pub fn try_publish(
    client: &mut Client,
    msg: &MqttMessage,
    retain: Option<bool>,
    qos: Option<QoS>,
) -> Result<(), MqttError> {
    log::debug!("Publishing to {}: {}", msg.topic, msg.payload);

    client.try_publish(
        msg.topic.clone(),
        qos.unwrap_or(QoS::AtLeastOnce),
        retain.unwrap_or(false),
        msg.payload.clone().into_bytes(),
    )?;
    Ok(())
}

impl MqttError {
    /// The client's request channel was full; the request can be retried
    /// once the event loop has been polled.
    pub fn is_backpressure(&self) -> bool {
        matches!(self, MqttError::MqttClient(rumqttc::ClientError::TryRequest(_)))
    }
}
