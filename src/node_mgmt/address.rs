/// Every LinkTap device id ends with this suffix, so node addresses keep
/// only the distinguishing prefix.
pub const DEVICE_ID_SUFFIX: &str = "004B1200";
pub const ADDRESS_LEN: usize = 8;

/// Node address for a vendor device id: its first 8 characters, lower-cased
pub fn node_address(device_id: &str) -> String {
    device_id
        .chars()
        .take(ADDRESS_LEN)
        .collect::<String>()
        .to_lowercase()
}

/// Best-effort vendor id for a node whose device isn't in the latest snapshot
pub fn fallback_device_id(address: &str) -> String {
    format!("{}{DEVICE_ID_SUFFIX}", address.to_uppercase())
}
