pub const DATA_DIR: &str = "LTNS_DATA_DIR";
pub const LOG_LEVEL: &str = "LOGGING_LEVEL";

pub const MQTT_HOST: &str = "MQTT_HOST";
pub const MQTT_PORT: &str = "MQTT_PORT";
pub const PG3_UUID: &str = "PG3_UUID";
pub const PG3_PROFILE: &str = "PG3_PROFILE";

pub const LINKTAP_API_BASE_URL: &str = "LINKTAP_API_BASE_URL";
pub const LINKTAP_USERNAME: &str = "LINKTAP_USERNAME";
pub const LINKTAP_API_KEY: &str = "LINKTAP_API_KEY";

pub const DISCOVER_RETRY_SECS: &str = "LTNS_DISCOVER_RETRY_SECS";
pub const DISCOVER_MAX_RETRIES: &str = "LTNS_DISCOVER_MAX_RETRIES";
pub const NODE_ADD_DELAY_MS: &str = "LTNS_NODE_ADD_DELAY_MS";
