//! Records returned by the LinkTap cloud API.
//!
//! The API is loose about types (numbers sometimes arrive as strings, battery
//! levels carry a `%` suffix), so numeric fields go through a lenient
//! deserializer and missing optional fields default rather than fail.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::node_mgmt::address::node_address;

use super::lenient;

pub const STATUS_CONNECTED: &str = "Connected";

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("could not parse device JSON: {0}")]
    ParseJson(#[from] serde_json::Error),
}

/// Envelope shared by every API response
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct ApiResult {
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct AllDevices {
    #[serde(default)]
    pub devices: Vec<Gateway>,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Gateway {
    pub name: String,
    pub gateway_id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub taplinker: Vec<Taplinker>,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Taplinker {
    pub taplinker_name: String,
    pub taplinker_id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default, deserialize_with = "lenient::number")]
    pub battery_status: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub signal: Option<f64>,
    #[serde(default)]
    pub watering: Option<Watering>,
}

/// Progress of an ongoing watering, in minutes
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct Watering {
    #[serde(default, deserialize_with = "lenient::number")]
    pub remaining: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub total: Option<f64>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct WateringStatusResponse {
    #[serde(default)]
    pub status: Option<WateringStatus>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WateringStatus {
    /// Minutes left in the current watering
    #[serde(default, deserialize_with = "lenient::number")]
    pub on_duration: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub total: Option<f64>,
}

impl From<WateringStatus> for Watering {
    fn from(status: WateringStatus) -> Self {
        Watering {
            remaining: status.on_duration,
            total: status.total,
        }
    }
}

impl AllDevices {
    pub fn from_json(raw: &str) -> Result<Self, ModelError> {
        serde_json::from_str(raw).map_err(Into::into)
    }

    pub fn find_gateway(&self, address: &str) -> Option<&Gateway> {
        self.devices.iter().find(|gw| gw.node_address() == address)
    }

    pub fn find_taplinker(&self, address: &str) -> Option<(&Gateway, &Taplinker)> {
        self.devices.iter().find_map(|gw| {
            gw.taplinker
                .iter()
                .find(|tl| tl.node_address() == address)
                .map(|tl| (gw, tl))
        })
    }

    pub fn find_taplinker_mut(&mut self, address: &str) -> Option<&mut Taplinker> {
        self.devices
            .iter_mut()
            .flat_map(|gw| gw.taplinker.iter_mut())
            .find(|tl| tl.node_address() == address)
    }

    pub fn taplinker_count(&self) -> usize {
        self.devices.iter().map(|gw| gw.taplinker.len()).sum()
    }
}

impl Gateway {
    pub fn node_address(&self) -> String {
        node_address(&self.gateway_id)
    }

    pub fn is_connected(&self) -> bool {
        self.status == STATUS_CONNECTED
    }
}

impl Taplinker {
    pub fn node_address(&self) -> String {
        node_address(&self.taplinker_id)
    }

    pub fn is_connected(&self) -> bool {
        self.status == STATUS_CONNECTED
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_DEVICES: &str = r#"{
        "result": "ok",
        "devices": [{
            "name": "Backyard",
            "location": "Home",
            "gatewayId": "3F7A23FE004B1200",
            "status": "Connected",
            "version": "S609",
            "taplinker": [{
                "taplinkerName": "Lawn",
                "taplinkerId": "6D5C1AB2004B1200",
                "status": "Connected",
                "location": "Lawn",
                "version": "S601",
                "signal": 86,
                "batteryStatus": "95%",
                "workMode": "M",
                "watering": {"remaining": "12", "total": 20},
                "vel": 0
            }, {
                "taplinkerName": "Beds",
                "taplinkerId": "1E2D3C4B004B1200",
                "status": "Disconnected",
                "signal": "40%",
                "batteryStatus": "5%",
                "watering": null
            }]
        }]
    }"#;

    #[test]
    fn test_parse_all_devices() {
        let all = AllDevices::from_json(ALL_DEVICES).unwrap();
        assert_eq!(all.devices.len(), 1);
        assert_eq!(all.taplinker_count(), 2);

        let gw = &all.devices[0];
        assert_eq!(gw.node_address(), "3f7a23fe");
        assert!(gw.is_connected());

        let lawn = &gw.taplinker[0];
        assert_eq!(lawn.battery_status, Some(95.0));
        assert_eq!(lawn.signal, Some(86.0));
        assert_eq!(
            lawn.watering,
            Some(Watering {
                remaining: Some(12.0),
                total: Some(20.0)
            })
        );

        let beds = &gw.taplinker[1];
        assert!(!beds.is_connected());
        assert_eq!(beds.signal, Some(40.0));
        assert_eq!(beds.watering, None);
    }

    #[test]
    fn test_find_by_node_address() {
        let all = AllDevices::from_json(ALL_DEVICES).unwrap();
        assert_eq!(all.find_gateway("3f7a23fe").unwrap().name, "Backyard");
        let (gw, tl) = all.find_taplinker("1e2d3c4b").unwrap();
        assert_eq!(gw.name, "Backyard");
        assert_eq!(tl.taplinker_name, "Beds");
        assert!(all.find_taplinker("3f7a23fe").is_none());
        assert!(all.find_gateway("deadbeef").is_none());
    }

    #[test]
    fn test_snapshot_survives_reserialization() {
        let all = AllDevices::from_json(ALL_DEVICES).unwrap();
        let reparsed = AllDevices::from_json(&serde_json::to_string(&all).unwrap()).unwrap();
        assert_eq!(reparsed, all);
    }

    #[test]
    fn test_empty_device_list() {
        let all = AllDevices::from_json(r#"{"result": "ok"}"#).unwrap();
        assert!(all.devices.is_empty());
        assert!(AllDevices::from_json("not json").is_err());
    }
}
