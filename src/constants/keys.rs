pub const API_BASE_URL: &str = "api_base_url";
pub const USERNAME: &str = "username";
pub const API_KEY: &str = "api_key";

pub const DEVICES_SNAPSHOT: &str = "devices_snapshot";
pub const DEVICES_SNAPSHOT_TS: &str = "devices_snapshot_ts";
