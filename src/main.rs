mod argsets;
mod command;
mod constants;
mod data_mgmt;
mod helpers;
mod interfaces;
mod node_mgmt;

use anyhow::{anyhow, Result};
use env_logger::Env;

use constants::{defaults, envvars};

const CMD_RUN: &str = "run";
const CMD_LIST_DEVICES: &str = "list-devices";
const CMD_KVS_GET: &str = "kvs-get";
const CMD_KVS_SET: &str = "kvs-set";

fn main() -> Result<()> {
    helpers::load_dotenv();
    env_logger::Builder::from_env(Env::default().filter_or(envvars::LOG_LEVEL, defaults::LOG_LEVEL))
        .init();

    let mut args = pico_args::Arguments::from_env();
    match args.subcommand()?.as_deref() {
        Some(CMD_RUN) => command::run(),
        Some(CMD_LIST_DEVICES) => command::list_devices(argsets::ListDevicesArgs {
            file: args.opt_value_from_str("--file")?,
        }),
        Some(CMD_KVS_GET) => command::kvs_get(argsets::KvsGetArgs {
            key: args.free_from_str()?,
        }),
        Some(CMD_KVS_SET) => command::kvs_set(argsets::KvsSetArgs {
            key: args.free_from_str()?,
            value: args.free_from_str()?,
        }),
        _ => Err(anyhow!(
            "Subcommand must be one of '{CMD_RUN}', '{CMD_LIST_DEVICES}', '{CMD_KVS_GET}', '{CMD_KVS_SET}'"
        )),
    }
}
