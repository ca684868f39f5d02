//! MQTT topics used to talk to the host runtime. Each is suffixed with the
//! node server's `<uuid>_<profile>` identifier.

pub const CLIENT_PFX: &str = "udi/pg3/ns/clients";
pub const STATUS_PFX: &str = "udi/pg3/ns/status";
pub const COMMAND_PFX: &str = "udi/pg3/ns/command";
pub const CUSTOM_PFX: &str = "udi/pg3/ns/custom";

pub fn for_node_server(prefix: &str, ns_id: &str) -> String {
    format!("{prefix}/{ns_id}")
}
