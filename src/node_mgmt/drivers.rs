use serde::Serialize;

pub const UOM_BOOLEAN: u16 = 2;
pub const UOM_MINUTES: u16 = 44;
pub const UOM_PERCENT: u16 = 51;

/// Node driver names as understood by the hub
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Driver {
    #[serde(rename = "ST")]
    Status,
    #[serde(rename = "BATLVL")]
    Battery,
    #[serde(rename = "GV0")]
    Signal,
    #[serde(rename = "GV1")]
    Watering,
    #[serde(rename = "GV2")]
    Remaining,
    #[serde(rename = "GV3")]
    Total,
    #[serde(rename = "GV4")]
    Elapsed,
    #[serde(rename = "GV5")]
    InstantMinutes,
}

impl Driver {
    pub fn as_str(&self) -> &'static str {
        match self {
            Driver::Status => "ST",
            Driver::Battery => "BATLVL",
            Driver::Signal => "GV0",
            Driver::Watering => "GV1",
            Driver::Remaining => "GV2",
            Driver::Total => "GV3",
            Driver::Elapsed => "GV4",
            Driver::InstantMinutes => "GV5",
        }
    }

    pub fn uom(&self) -> u16 {
        match self {
            Driver::Status | Driver::Watering => UOM_BOOLEAN,
            Driver::Battery | Driver::Signal => UOM_PERCENT,
            Driver::Remaining | Driver::Total | Driver::Elapsed | Driver::InstantMinutes => {
                UOM_MINUTES
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct DriverValue {
    pub driver: Driver,
    pub value: f64,
    pub uom: u16,
}

impl DriverValue {
    pub fn new(driver: Driver, value: f64) -> Self {
        DriverValue {
            driver,
            value,
            uom: driver.uom(),
        }
    }
}

pub fn bool_value(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}
