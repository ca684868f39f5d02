use std::collections::BTreeMap;

use serde::Serialize;

use crate::interfaces::polyglot::{Host, HostError};

use super::drivers::{Driver, DriverValue};

const GATEWAY_DRIVERS: &[Driver] = &[Driver::Status];
const TAPLINKER_DRIVERS: &[Driver] = &[
    Driver::Status,
    Driver::Battery,
    Driver::Signal,
    Driver::Watering,
    Driver::Remaining,
    Driver::Total,
    Driver::Elapsed,
    Driver::InstantMinutes,
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeKind {
    Gateway,
    Taplinker,
}

impl NodeKind {
    pub fn node_def_id(&self) -> &'static str {
        match self {
            NodeKind::Gateway => "gateway",
            NodeKind::Taplinker => "taplinker",
        }
    }

    pub fn drivers(&self) -> &'static [Driver] {
        match self {
            NodeKind::Gateway => GATEWAY_DRIVERS,
            NodeKind::Taplinker => TAPLINKER_DRIVERS,
        }
    }
}

/// Node definition as announced to the hub
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDef {
    pub address: String,
    pub name: String,
    pub node_def_id: &'static str,
    pub primary_node: String,
    pub drivers: Vec<DriverValue>,
}

/// Local representation of a hub node and the driver values last published for it
#[derive(Clone, Debug)]
pub struct Node {
    pub address: String,
    pub primary: String,
    pub name: String,
    pub kind: NodeKind,
    values: BTreeMap<Driver, f64>,
}

impl Node {
    pub fn new(kind: NodeKind, primary: &str, address: &str, name: &str) -> Self {
        Node {
            address: address.to_string(),
            primary: primary.to_string(),
            name: name.to_string(),
            kind,
            values: kind.drivers().iter().map(|d| (*d, 0.0)).collect(),
        }
    }

    pub fn def(&self) -> NodeDef {
        NodeDef {
            address: self.address.clone(),
            name: self.name.clone(),
            node_def_id: self.kind.node_def_id(),
            primary_node: self.primary.clone(),
            drivers: self.driver_values(),
        }
    }

    pub fn driver(&self, driver: Driver) -> Option<f64> {
        self.values.get(&driver).copied()
    }

    pub fn driver_values(&self) -> Vec<DriverValue> {
        self.values
            .iter()
            .map(|(d, v)| DriverValue::new(*d, *v))
            .collect()
    }

    /// Publish the given values, skipping those already reported unless
    /// `force` is set. Local state is only updated once the host accepted
    /// the update. Drivers this node kind doesn't have are ignored.
    pub fn set_drivers<H: Host>(
        &mut self,
        host: &mut H,
        values: &[(Driver, f64)],
        force: bool,
    ) -> Result<usize, HostError> {
        let changed: Vec<DriverValue> = values
            .iter()
            .filter(|(d, v)| match self.values.get(d) {
                Some(current) => force || current != v,
                None => {
                    log::warn!("Node {} has no driver {}", self.address, d.as_str());
                    false
                }
            })
            .map(|(d, v)| DriverValue::new(*d, *v))
            .collect();

        if changed.is_empty() {
            return Ok(0);
        }
        host.set_drivers(&self.address, &changed)?;
        for dv in changed.iter() {
            log::debug!("{} {} = {}", self.address, dv.driver.as_str(), dv.value);
            self.values.insert(dv.driver, dv.value);
        }
        Ok(changed.len())
    }

    pub fn report_drivers<H: Host>(&mut self, host: &mut H) -> Result<(), HostError> {
        host.set_drivers(&self.address, &self.driver_values())
    }
}

/// Registered nodes keyed by address
#[derive(Default)]
pub struct Nodes(BTreeMap<String, Node>);

impl Nodes {
    pub fn contains(&self, address: &str) -> bool {
        self.0.contains_key(address)
    }

    pub fn get(&self, address: &str) -> Option<&Node> {
        self.0.get(address)
    }

    pub fn get_mut(&mut self, address: &str) -> Option<&mut Node> {
        self.0.get_mut(address)
    }

    pub fn insert(&mut self, node: Node) {
        self.0.insert(node.address.clone(), node);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.0.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Node> {
        self.0.values_mut()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}
