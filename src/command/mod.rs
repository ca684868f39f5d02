mod kvs;
mod list_devices;
mod run;

pub use kvs::{kvs_get, kvs_set};
pub use list_devices::list_devices;
pub use run::run;
