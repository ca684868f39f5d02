use std::time::Duration;

pub const API_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
pub const LOG_LEVEL: &str = "INFO";

pub const MQTT_HOST: &str = "localhost";
pub const MQTT_PORT: u16 = 1883;
pub const MQTT_KEEP_ALIVE: Duration = Duration::from_secs(30);
pub const PG3_UUID: &str = "00:00:00:00:00:00";
pub const PG3_PROFILE: &str = "1";

// The vendor rejects getAllDevices calls made less than 5 minutes apart
pub const DEVICES_MIN_INTERVAL: Duration = Duration::from_secs(300);
pub const WATERING_STATUS_MIN_INTERVAL: Duration = Duration::from_secs(30);

pub const DISCOVER_RETRY_DELAY: Duration = Duration::from_secs(300);
pub const DISCOVER_MAX_RETRIES: u32 = 3000;
pub const NODE_ADD_DELAY: Duration = Duration::from_secs(2);

pub const RUN_LOOP_TICK: Duration = Duration::from_secs(1);
