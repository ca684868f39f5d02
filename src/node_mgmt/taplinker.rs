use serde_json::Value;
use thiserror::Error;

use crate::data_mgmt::models::{Taplinker, Watering};
use crate::interfaces::linktap_api::WateringMode;

use super::drivers::{bool_value, Driver};

pub const CMD_INSTANT_ON: &str = "GV5";
pub const CMD_INTERVAL_MODE: &str = "GV6";
pub const CMD_ODD_EVEN_MODE: &str = "GV7";
pub const CMD_SEVEN_DAY_MODE: &str = "GV8";
pub const CMD_MONTH_MODE: &str = "GV9";
pub const CMD_INSTANT_OFF: &str = "GV10";

/// Longest instant watering the API accepts, in minutes
pub const MAX_INSTANT_DURATION: u32 = 1439;

#[derive(Error, Debug, PartialEq)]
pub enum CommandError {
    #[error("unknown command '{0}'")]
    Unknown(String),
    #[error("invalid value {value:?} for command '{cmd}'")]
    InvalidValue { cmd: String, value: Option<Value> },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaplinkerCommand {
    InstantOn { duration: u32 },
    InstantOff,
    Mode(WateringMode),
}

impl TaplinkerCommand {
    pub fn parse(cmd: &str, value: Option<&Value>) -> Result<Self, CommandError> {
        match cmd {
            CMD_INSTANT_ON => {
                let duration = value
                    .and_then(duration_from_value)
                    .filter(|d| (1..=MAX_INSTANT_DURATION).contains(d))
                    .ok_or_else(|| CommandError::InvalidValue {
                        cmd: cmd.to_string(),
                        value: value.cloned(),
                    })?;
                Ok(TaplinkerCommand::InstantOn { duration })
            }
            CMD_INSTANT_OFF => Ok(TaplinkerCommand::InstantOff),
            CMD_INTERVAL_MODE => Ok(TaplinkerCommand::Mode(WateringMode::Interval)),
            CMD_ODD_EVEN_MODE => Ok(TaplinkerCommand::Mode(WateringMode::OddEven)),
            CMD_SEVEN_DAY_MODE => Ok(TaplinkerCommand::Mode(WateringMode::SevenDay)),
            CMD_MONTH_MODE => Ok(TaplinkerCommand::Mode(WateringMode::Month)),
            _ => Err(CommandError::Unknown(cmd.to_string())),
        }
    }

    /// Watering state the device is in once the command succeeded; `None`
    /// for commands that don't affect the current watering
    pub fn resulting_watering(&self) -> Option<Option<Watering>> {
        match self {
            TaplinkerCommand::InstantOn { duration } => Some(Some(Watering {
                remaining: Some(*duration as f64),
                total: Some(*duration as f64),
            })),
            TaplinkerCommand::InstantOff => Some(None),
            TaplinkerCommand::Mode(_) => None,
        }
    }

    pub fn driver_values(&self) -> Vec<(Driver, f64)> {
        let mut values = match self.resulting_watering() {
            Some(watering) => watering_values(watering.as_ref()),
            None => vec![],
        };
        if let TaplinkerCommand::InstantOn { duration } = self {
            values.push((Driver::InstantMinutes, *duration as f64));
        }
        values
    }
}

// The hub sends numeric values as strings
fn duration_from_value(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse::<f64>().ok().and_then(|f| {
            (f.fract() == 0.0 && f >= 0.0 && f <= u32::MAX as f64).then_some(f as u32)
        }),
        _ => None,
    }
}

pub fn watering_values(watering: Option<&Watering>) -> Vec<(Driver, f64)> {
    match watering {
        Some(w) => {
            let remaining = w.remaining.unwrap_or(0.0);
            let total = w.total.unwrap_or(0.0);
            vec![
                (Driver::Watering, 1.0),
                (Driver::Remaining, remaining),
                (Driver::Total, total),
                (Driver::Elapsed, (total - remaining).max(0.0)),
            ]
        }
        None => vec![
            (Driver::Watering, 0.0),
            (Driver::Remaining, 0.0),
            (Driver::Total, 0.0),
            (Driver::Elapsed, 0.0),
        ],
    }
}

pub fn driver_values(tl: &Taplinker) -> Vec<(Driver, f64)> {
    let mut values = vec![(Driver::Status, bool_value(tl.is_connected()))];
    if let Some(battery) = tl.battery_status {
        values.push((Driver::Battery, battery));
    }
    if let Some(signal) = tl.signal {
        values.push((Driver::Signal, signal));
    }
    values.extend(watering_values(tl.watering.as_ref()));
    values
}
