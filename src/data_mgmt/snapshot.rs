use kvstore::{KVDb, KVStoreError};

use crate::constants::keys;

use super::models::AllDevices;

/// Last successful `getAllDevices` response and when it was fetched
#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot {
    pub devices: AllDevices,
    pub fetched_at: i64,
}

impl Snapshot {
    pub fn age_secs(&self, now: i64) -> i64 {
        now - self.fetched_at
    }
}

pub fn save(kvs: &KVDb, snapshot: &Snapshot) -> Result<(), KVStoreError> {
    kvs.set(keys::DEVICES_SNAPSHOT, &snapshot.devices)?;
    kvs.set(keys::DEVICES_SNAPSHOT_TS, &snapshot.fetched_at)?;
    log::debug!(
        "[t: {}] Saved snapshot of {} gateway(s)",
        snapshot.fetched_at,
        snapshot.devices.devices.len()
    );
    Ok(())
}

pub fn load(kvs: &KVDb) -> Result<Option<Snapshot>, KVStoreError> {
    let fetched_at: Option<i64> = kvs.get(keys::DEVICES_SNAPSHOT_TS)?;
    let devices: Option<AllDevices> = kvs.get(keys::DEVICES_SNAPSHOT)?;
    Ok(match (devices, fetched_at) {
        (Some(devices), Some(fetched_at)) => Some(Snapshot {
            devices,
            fetched_at,
        }),
        _ => None,
    })
}

/// Forget the cached snapshot. Returns whether one was stored.
pub fn clear(kvs: &KVDb) -> Result<bool, KVStoreError> {
    let removed = kvs.delete(keys::DEVICES_SNAPSHOT)?;
    kvs.delete(keys::DEVICES_SNAPSHOT_TS)?;
    Ok(removed)
}
