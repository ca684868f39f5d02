//! Binding to the hub's plugin runtime.
//!
//! The runtime talks to node servers over MQTT with single-key JSON objects:
//! the key names the event (`discover`, `shortPoll`, `command`, ...) and the
//! value carries its arguments. [`Host`] is what the controller needs from
//! the runtime; [`MqttHost`] implements it on top of a `rumqttc` client.

use std::collections::{BTreeMap, VecDeque};
use std::env;

use rumqttc::{Client, QoS};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::constants::{defaults, envvars, topics};
use crate::node_mgmt::drivers::DriverValue;
use crate::node_mgmt::NodeDef;

use super::mqtt::{self, MqttError, MqttMessage};

#[derive(Error, Debug)]
pub enum HostError {
    #[error("MQTT error: {0}")]
    Mqtt(#[from] MqttError),
    #[error("could not encode host message: {0}")]
    Encode(#[from] serde_json::Error),
}

impl HostError {
    pub fn is_backpressure(&self) -> bool {
        matches!(self, HostError::Mqtt(e) if e.is_backpressure())
    }
}

/// What the controller needs from the hub runtime
pub trait Host {
    fn add_node(&mut self, node: &NodeDef) -> Result<(), HostError>;
    fn set_drivers(&mut self, address: &str, values: &[DriverValue]) -> Result<(), HostError>;
    fn set_notice(&mut self, key: &str, text: &str) -> Result<(), HostError>;
    fn clear_notices(&mut self) -> Result<(), HostError>;
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct NodeCommand {
    pub address: String,
    pub cmd: String,
    #[serde(default)]
    pub value: Option<Value>,
}

/// Inbound message from the runtime
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum HostEvent {
    Discover {},
    ShortPoll {},
    LongPoll {},
    #[serde(rename = "customparams")]
    CustomParams(BTreeMap<String, Value>),
    Command(NodeCommand),
    Query {
        #[serde(default)]
        address: Option<String>,
    },
    Stop {},
}

impl HostEvent {
    pub fn from_payload(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }
}

#[derive(Debug, Serialize)]
struct DriverUpdate<'a> {
    address: &'a str,
    #[serde(flatten)]
    value: &'a DriverValue,
}

/// Outbound message to the runtime
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
enum HostMessage<'a> {
    Ready {},
    #[serde(rename = "addnode")]
    AddNode(Vec<&'a NodeDef>),
    Set(Vec<DriverUpdate<'a>>),
    Notices(&'a BTreeMap<String, String>),
}

/// `<uuid>_<profile>` identifier the runtime assigned to this node server
pub fn node_server_id() -> String {
    let uuid = env::var(envvars::PG3_UUID).unwrap_or_else(|_| defaults::PG3_UUID.to_string());
    let profile =
        env::var(envvars::PG3_PROFILE).unwrap_or_else(|_| defaults::PG3_PROFILE.to_string());
    format!("{uuid}_{profile}")
}

/// Outbound request waiting for room in the MQTT client's request channel
#[derive(Debug, Clone, PartialEq)]
enum Outbound {
    Subscribe(String),
    Publish(MqttMessage),
}

/// [`Host`] over MQTT. Messages are queued, never published from inside a
/// handler; the run loop hands them to the client with [`MqttHost::flush`]
/// between polls of the connection.
pub struct MqttHost {
    client: Client,
    ns_id: String,
    notices: BTreeMap<String, String>,
    outbox: VecDeque<Outbound>,
}

impl MqttHost {
    pub fn new(client: Client, ns_id: String) -> Self {
        MqttHost {
            client,
            ns_id,
            notices: BTreeMap::new(),
            outbox: VecDeque::new(),
        }
    }

    pub fn inbound_topic(&self) -> String {
        topics::for_node_server(topics::CLIENT_PFX, &self.ns_id)
    }

    /// Queue a subscription to the inbound topic ahead of anything pending
    pub fn subscribe(&mut self) {
        let topic = self.inbound_topic();
        log::info!("Subscribing to {}", topic);
        self.outbox.push_front(Outbound::Subscribe(topic));
    }

    pub fn ready(&mut self) -> Result<(), HostError> {
        self.send(topics::COMMAND_PFX, &HostMessage::Ready {})
    }

    /// Number of requests not yet handed to the client
    pub fn pending(&self) -> usize {
        self.outbox.len()
    }

    /// Hand queued requests to the client until its channel is full. Returns
    /// how many are still queued.
    pub fn flush(&mut self) -> Result<usize, HostError> {
        while let Some(next) = self.outbox.pop_front() {
            let res = match &next {
                Outbound::Subscribe(topic) => self
                    .client
                    .try_subscribe(topic.clone(), QoS::AtLeastOnce)
                    .map_err(MqttError::from),
                Outbound::Publish(msg) => mqtt::try_publish(&mut self.client, msg, None, None),
            };
            if let Err(e) = res {
                self.outbox.push_front(next);
                if e.is_backpressure() {
                    log::trace!("MQTT request channel full; {} queued", self.outbox.len());
                    break;
                }
                return Err(e.into());
            }
        }
        Ok(self.outbox.len())
    }

    pub fn disconnect(&mut self) -> Result<(), HostError> {
        self.client.try_disconnect().map_err(MqttError::from)?;
        Ok(())
    }

    fn send(&mut self, topic_pfx: &str, msg: &HostMessage) -> Result<(), HostError> {
        let msg = MqttMessage::new(
            topics::for_node_server(topic_pfx, &self.ns_id),
            serde_json::to_string(msg)?,
        );
        self.outbox.push_back(Outbound::Publish(msg));
        Ok(())
    }

    fn send_notices(&mut self) -> Result<(), HostError> {
        let notices = self.notices.clone();
        self.send(topics::CUSTOM_PFX, &HostMessage::Notices(&notices))
    }
}

impl Host for MqttHost {
    fn add_node(&mut self, node: &NodeDef) -> Result<(), HostError> {
        log::info!("Adding node {} ({})", node.address, node.name);
        self.send(topics::COMMAND_PFX, &HostMessage::AddNode(vec![node]))
    }

    fn set_drivers(&mut self, address: &str, values: &[DriverValue]) -> Result<(), HostError> {
        let updates = values
            .iter()
            .map(|value| DriverUpdate { address, value })
            .collect();
        self.send(topics::STATUS_PFX, &HostMessage::Set(updates))
    }

    fn set_notice(&mut self, key: &str, text: &str) -> Result<(), HostError> {
        self.notices.insert(key.to_string(), text.to_string());
        self.send_notices()
    }

    fn clear_notices(&mut self) -> Result<(), HostError> {
        self.notices.clear();
        self.send_notices()
    }
}

/// Host that records everything it is asked to do
#[cfg(test)]
#[derive(Default)]
pub struct RecordingHost {
    pub added: Vec<NodeDef>,
    pub driver_sets: Vec<(String, Vec<DriverValue>)>,
    pub notices: BTreeMap<String, String>,
    pub fail_publish: bool,
}

#[cfg(test)]
impl RecordingHost {
    fn check(&self) -> Result<(), HostError> {
        if self.fail_publish {
            let err = serde_json::from_str::<Value>("").unwrap_err();
            return Err(HostError::Encode(err));
        }
        Ok(())
    }

    /// Last value published for a node driver
    pub fn last_value(&self, address: &str, driver: crate::node_mgmt::drivers::Driver) -> Option<f64> {
        self.driver_sets
            .iter()
            .rev()
            .filter(|(a, _)| a == address)
            .flat_map(|(_, values)| values.iter().rev())
            .find(|dv| dv.driver == driver)
            .map(|dv| dv.value)
    }
}

#[cfg(test)]
impl Host for RecordingHost {
    fn add_node(&mut self, node: &NodeDef) -> Result<(), HostError> {
        self.check()?;
        self.added.push(node.clone());
        Ok(())
    }

    fn set_drivers(&mut self, address: &str, values: &[DriverValue]) -> Result<(), HostError> {
        self.check()?;
        self.driver_sets.push((address.to_string(), values.to_vec()));
        Ok(())
    }

    fn set_notice(&mut self, key: &str, text: &str) -> Result<(), HostError> {
        self.notices.insert(key.to_string(), text.to_string());
        Ok(())
    }

    fn clear_notices(&mut self) -> Result<(), HostError> {
        self.notices.clear();
        Ok(())
    }
}
