use crate::data_mgmt::models::Gateway;

use super::drivers::{bool_value, Driver};

pub const CMD_ON: &str = "DON";
pub const CMD_OFF: &str = "DOF";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GatewayCommand {
    On,
    Off,
}

impl GatewayCommand {
    pub fn parse(cmd: &str) -> Option<Self> {
        match cmd {
            CMD_ON => Some(GatewayCommand::On),
            CMD_OFF => Some(GatewayCommand::Off),
            _ => None,
        }
    }

    /// Gateway on/off only changes the hub-side status; the API has no such call
    pub fn driver_values(&self) -> Vec<(Driver, f64)> {
        vec![(Driver::Status, bool_value(*self == GatewayCommand::On))]
    }
}

pub fn driver_values(gw: &Gateway) -> Vec<(Driver, f64)> {
    vec![(Driver::Status, bool_value(gw.is_connected()))]
}
