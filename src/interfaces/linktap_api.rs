use std::env;
use std::sync::Arc;

use kvstore::{KVDb, KVStoreError};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use url::Url;

use crate::constants::{defaults, envvars, keys, REMOTE_DEFAULTS};
use crate::data_mgmt::models::{AllDevices, ApiResult, WateringStatus, WateringStatusResponse};

const OP_GET_ALL_DEVICES: &str = "getAllDevices";
const OP_GET_WATERING_STATUS: &str = "getWateringStatus";
const OP_ACTIVATE_INSTANT_MODE: &str = "activateInstantMode";

const RESULT_ERROR: &str = "error";

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("request rejected by API: {0}")]
    Rejected(String),
    #[error("unexpected HTTP status {0}")]
    Status(u16),
    #[error(transparent)]
    Transport(#[from] Box<ureq::Transport>),
    #[error("could not read response: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not decode response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("invalid API URL: {0}")]
    Url(#[from] url::ParseError),
    #[error(transparent)]
    Tls(#[from] native_tls::Error),
}

impl ApiError {
    /// The API answered, but refused the request (rate limit, bad credentials, ...)
    pub fn is_rejection(&self) -> bool {
        matches!(self, ApiError::Rejected(_) | ApiError::Status(_))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub api_key: String,
}

impl Credentials {
    pub fn from_env() -> Option<Self> {
        let non_empty = |var: &str| env::var(var).ok().filter(|v: &String| !v.trim().is_empty());
        Some(Credentials {
            username: non_empty(envvars::LINKTAP_USERNAME)?,
            api_key: non_empty(envvars::LINKTAP_API_KEY)?,
        })
    }

    /// Credentials persisted by an earlier run, if both halves are present
    pub fn load(kvs: &KVDb) -> Result<Option<Self>, KVStoreError> {
        let username: Option<String> = kvs.get(keys::USERNAME)?;
        let api_key: Option<String> = kvs.get(keys::API_KEY)?;
        Ok(username.zip(api_key).map(|(username, api_key)| Credentials { username, api_key }))
    }

    pub fn save(&self, kvs: &KVDb) -> Result<(), KVStoreError> {
        kvs.set(keys::USERNAME, &self.username)?;
        kvs.set(keys::API_KEY, &self.api_key)
    }
}

/// Scheduled watering modes that can be (re)activated on a tap-linker
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WateringMode {
    Interval,
    OddEven,
    SevenDay,
    Month,
}

impl WateringMode {
    pub fn operation(&self) -> &'static str {
        match self {
            WateringMode::Interval => "activateIntervalMode",
            WateringMode::OddEven => "activateOddEvenMode",
            WateringMode::SevenDay => "activateSevenDayMode",
            WateringMode::Month => "activateMonthMode",
        }
    }
}

fn bool_param(b: bool) -> &'static str {
    if b {
        "true"
    } else {
        "false"
    }
}

/// Resolve the API base URL: environment first, then the KV store, then the
/// built-in default.
pub fn get_api_base_url(kvs: Option<&KVDb>) -> String {
    if let Ok(base_url) = env::var(envvars::LINKTAP_API_BASE_URL) {
        return base_url;
    }
    if let Some(Ok(Some(base_url))) = kvs.map(|kvs| kvs.get::<String>(keys::API_BASE_URL)) {
        return base_url;
    }
    REMOTE_DEFAULTS
        .get(keys::API_BASE_URL)
        .map(|s| s.to_string())
        .unwrap_or_default()
}

fn get_ureq_agent() -> Result<ureq::Agent, ApiError> {
    Ok(ureq::AgentBuilder::new()
        .tls_connector(Arc::new(native_tls::TlsConnector::new()?))
        .timeout(defaults::API_REQUEST_TIMEOUT)
        .build())
}

pub struct LinkTapClient {
    agent: ureq::Agent,
    base_url: Url,
    credentials: Credentials,
}

impl LinkTapClient {
    pub fn new(base_url: &str, credentials: Credentials) -> Result<Self, ApiError> {
        // Url::join would otherwise replace the last path segment
        let base_url = if base_url.ends_with('/') {
            Url::parse(base_url)?
        } else {
            Url::parse(&format!("{base_url}/"))?
        };
        Ok(LinkTapClient {
            agent: get_ureq_agent()?,
            base_url,
            credentials,
        })
    }

    fn call<T: DeserializeOwned>(&self, operation: &str, params: &[(&str, &str)]) -> Result<T, ApiError> {
        let url = self.base_url.join(operation)?;
        let mut form = vec![
            ("username", self.credentials.username.as_str()),
            ("apiKey", self.credentials.api_key.as_str()),
        ];
        form.extend_from_slice(params);

        log::debug!("Calling {} with {:?}", operation, params);
        let response = match self.agent.post(url.as_str()).send_form(&form) {
            Ok(response) => response,
            Err(ureq::Error::Status(code, _)) => return Err(ApiError::Status(code)),
            Err(ureq::Error::Transport(transport)) => return Err(Box::new(transport).into()),
        };

        let body: Value = serde_json::from_str(&response.into_string()?)?;
        log::trace!("{} response: {}", operation, body);
        let envelope: ApiResult = serde_json::from_value(body.clone())?;
        if envelope.result.as_deref() == Some(RESULT_ERROR) {
            return Err(ApiError::Rejected(envelope.message.unwrap_or_default()));
        }
        serde_json::from_value(body).map_err(Into::into)
    }

    pub fn get_all_devices(&self) -> Result<AllDevices, ApiError> {
        self.call(OP_GET_ALL_DEVICES, &[])
    }

    /// `Ok(None)` means the tap-linker isn't watering right now
    pub fn get_watering_status(&self, taplinker_id: &str) -> Result<Option<WateringStatus>, ApiError> {
        let resp: WateringStatusResponse =
            self.call(OP_GET_WATERING_STATUS, &[("taplinkerId", taplinker_id)])?;
        Ok(resp.status)
    }

    pub fn activate_instant_mode(
        &self,
        gateway_id: &str,
        taplinker_id: &str,
        action: bool,
        duration: u32,
        eco: bool,
    ) -> Result<(), ApiError> {
        let duration = duration.to_string();
        self.call::<ApiResult>(
            OP_ACTIVATE_INSTANT_MODE,
            &[
                ("gatewayId", gateway_id),
                ("taplinkerId", taplinker_id),
                ("action", bool_param(action)),
                ("duration", &duration),
                ("eco", bool_param(eco)),
                // Re-activate the watering plan once instant mode ends
                ("autoBack", "true"),
            ],
        )?;
        Ok(())
    }

    pub fn activate_mode(
        &self,
        mode: WateringMode,
        gateway_id: &str,
        taplinker_id: &str,
    ) -> Result<(), ApiError> {
        self.call::<ApiResult>(
            mode.operation(),
            &[("gatewayId", gateway_id), ("taplinkerId", taplinker_id)],
        )?;
        Ok(())
    }
}
