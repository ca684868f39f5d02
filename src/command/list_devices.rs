use std::fs;

use anyhow::{anyhow, Context, Result};
use kvstore::KVDb;

use crate::argsets::ListDevicesArgs;
use crate::data_mgmt::models::AllDevices;
use crate::interfaces::kvpath;
use crate::interfaces::linktap_api::{get_api_base_url, Credentials, LinkTapClient};

fn fetch_devices() -> Result<AllDevices> {
    let kvs = KVDb::new(kvpath::SQLITE_STORE.as_path())?;
    let credentials = match Credentials::from_env() {
        Some(credentials) => credentials,
        None => Credentials::load(&kvs)?
            .ok_or_else(|| anyhow!("No LinkTap credentials in environment or KV store"))?,
    };
    let client = LinkTapClient::new(&get_api_base_url(Some(&kvs)), credentials)?;
    Ok(client.get_all_devices()?)
}

fn read_devices(path: &std::path::Path) -> Result<AllDevices> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Could not read {}", path.display()))?;
    Ok(AllDevices::from_json(&raw)?)
}

pub fn list_devices(args: ListDevicesArgs) -> Result<()> {
    let devices = match args.file {
        Some(path) => read_devices(&path)?,
        None => fetch_devices()?,
    };

    for gw in devices.devices.iter() {
        println!(
            "gateway {} [{}] id={} status={}",
            gw.node_address(),
            gw.name,
            gw.gateway_id,
            gw.status
        );
        for tl in gw.taplinker.iter() {
            println!(
                "  taplinker {} [{}] id={} status={}",
                tl.node_address(),
                tl.taplinker_name,
                tl.taplinker_id,
                tl.status
            );
        }
    }
    log::info!(
        "{} gateway(s), {} tap-linker(s)",
        devices.devices.len(),
        devices.taplinker_count()
    );
    Ok(())
}
