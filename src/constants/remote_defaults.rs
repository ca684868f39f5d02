use once_cell::sync::Lazy;
use std::collections::HashMap;

use super::keys;

pub static REMOTE_DEFAULTS: Lazy<HashMap<&str, &str>> =
    Lazy::new(|| HashMap::from([(keys::API_BASE_URL, "https://www.link-tap.com/api/")]));
