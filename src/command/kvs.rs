use anyhow::{anyhow, Result};
use kvstore::KVDb;
use serde_json::Value;

use crate::argsets::{KvsGetArgs, KvsSetArgs};
use crate::interfaces::kvpath;

fn open_store() -> Result<KVDb> {
    Ok(KVDb::new(kvpath::SQLITE_STORE.as_path())?)
}

pub fn kvs_set(args: KvsSetArgs) -> Result<()> {
    let kvs = open_store()?;
    // Store valid JSON as-is, anything else as a JSON string
    let value = serde_json::from_str(&args.value).unwrap_or(Value::String(args.value));
    kvs.set(&args.key, &value)?;
    log::debug!("Set {} = {}", args.key, value);
    Ok(())
}

pub fn kvs_get(args: KvsGetArgs) -> Result<()> {
    let kvs = open_store()?;
    let value: Value = kvs
        .get(&args.key)?
        .ok_or_else(|| anyhow!("No value set for key '{}'", &args.key))?;
    match value {
        Value::String(s) => print!("{s}"),
        other => print!("{other}"),
    }
    Ok(())
}
