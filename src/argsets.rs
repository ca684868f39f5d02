use std::path::PathBuf;

pub struct ListDevicesArgs {
    /// Saved `getAllDevices` response to read instead of calling the API
    pub file: Option<PathBuf>,
}

pub struct KvsGetArgs {
    pub key: String,
}

pub struct KvsSetArgs {
    pub key: String,
    pub value: String,
}
