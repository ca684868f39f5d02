//! Reconciliation of LinkTap device state onto hub nodes.
//!
//! The controller owns the node registry and the latest `getAllDevices`
//! snapshot. Host events drive it: custom parameters supply credentials and
//! trigger discovery, long polls refresh the snapshot, short polls push the
//! snapshot (and live watering progress) to the nodes, and node commands are
//! turned into API calls. Failed discovery is retried from [`Controller::tick`]
//! on a fixed delay, up to a bounded number of attempts.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::env;
use std::time::{Duration, Instant};

use kvstore::KVDb;
use serde_json::Value;

use crate::constants::{defaults, envvars};
use crate::data_mgmt::snapshot::{self, Snapshot};
use crate::helpers::{now_epoch, RetrySchedule};
use crate::interfaces::linktap_api::{ApiError, Credentials, LinkTapClient};
use crate::interfaces::polyglot::{Host, HostEvent, NodeCommand};

use super::address::fallback_device_id;
use super::drivers::Driver;
use super::gateway::{self, GatewayCommand};
use super::node::{Node, NodeKind, Nodes};
use super::taplinker::{self, TaplinkerCommand};

const PARAM_USERNAME: &str = "username";
const PARAM_API_KEY: &str = "apiKey";
const NOTICE_USERNAME: &str = "Please set username";
const NOTICE_API_KEY: &str = "Please set api key";

const CMD_QUERY: &str = "QUERY";

#[derive(Clone, Debug)]
pub struct ControllerOpts {
    pub api_base_url: String,
    pub devices_min_interval: Duration,
    pub watering_status_min_interval: Duration,
    pub discover_retry_delay: Duration,
    pub discover_max_retries: u32,
    pub node_add_delay: Duration,
}

fn env_parse<T: std::str::FromStr>(var: &str) -> Option<T> {
    env::var(var).ok().and_then(|v| v.parse().ok())
}

impl ControllerOpts {
    pub fn new(api_base_url: String) -> Self {
        ControllerOpts {
            api_base_url,
            devices_min_interval: defaults::DEVICES_MIN_INTERVAL,
            watering_status_min_interval: defaults::WATERING_STATUS_MIN_INTERVAL,
            discover_retry_delay: defaults::DISCOVER_RETRY_DELAY,
            discover_max_retries: defaults::DISCOVER_MAX_RETRIES,
            node_add_delay: defaults::NODE_ADD_DELAY,
        }
    }

    /// Defaults, with the retry and pacing knobs overridable from the environment
    pub fn from_env(api_base_url: String) -> Self {
        let mut opts = Self::new(api_base_url);
        if let Some(secs) = env_parse::<u64>(envvars::DISCOVER_RETRY_SECS) {
            opts.discover_retry_delay = Duration::from_secs(secs);
        }
        if let Some(max) = env_parse::<u32>(envvars::DISCOVER_MAX_RETRIES) {
            opts.discover_max_retries = max;
        }
        if let Some(ms) = env_parse::<u64>(envvars::NODE_ADD_DELAY_MS) {
            opts.node_add_delay = Duration::from_millis(ms);
        }
        opts
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Fetch {
    Fresh,
    Cached,
    Failed,
}

pub struct Controller {
    opts: ControllerOpts,
    kvs: KVDb,
    client: Option<LinkTapClient>,
    snapshot: Option<Snapshot>,
    ready: bool,
    nodes: Nodes,
    discover_retry: RetrySchedule,
    watering_checked: HashMap<String, Instant>,
    /// Nodes found by discovery, added to the host one per `node_add_delay`
    pending_adds: VecDeque<Node>,
    next_add_at: Option<Instant>,
    discovering: bool,
}

impl Controller {
    pub fn new(opts: ControllerOpts, kvs: KVDb) -> Self {
        let snapshot = snapshot::load(&kvs).unwrap_or_else(|e| {
            log::warn!("Could not load cached device snapshot: {}", e);
            None
        });
        let discover_retry =
            RetrySchedule::fixed(opts.discover_retry_delay, opts.discover_max_retries);
        Controller {
            opts,
            kvs,
            client: None,
            snapshot,
            ready: false,
            nodes: Nodes::default(),
            discover_retry,
            watering_checked: HashMap::new(),
            pending_adds: VecDeque::new(),
            next_add_at: None,
            discovering: false,
        }
    }

    pub fn handle_event<H: Host>(&mut self, host: &mut H, event: HostEvent, now: Instant) -> Flow {
        log::debug!("Host event: {:?}", event);
        match event {
            HostEvent::Discover {} => self.discover(host, now),
            HostEvent::ShortPoll {} => self.short_poll(host, now),
            HostEvent::LongPoll {} => self.long_poll(host),
            HostEvent::CustomParams(params) => self.on_custom_params(host, &params, now),
            HostEvent::Command(cmd) => self.on_command(host, &cmd),
            HostEvent::Query { address } => self.on_query(host, address.as_deref()),
            HostEvent::Stop {} => {
                log::info!("Stop requested by host");
                return Flow::Stop;
            }
        }
        Flow::Continue
    }

    /// Pick up credentials persisted by a previous run, so discovery doesn't
    /// have to wait for the host to resend its parameters.
    pub fn resume<H: Host>(&mut self, host: &mut H, now: Instant) {
        match self.stored_credentials() {
            Some(credentials) => {
                log::info!("Resuming with stored credentials for {}", credentials.username);
                self.set_credentials(credentials);
                self.discover(host, now);
            }
            None => log::info!("No stored credentials; waiting for custom parameters"),
        }
    }

    pub fn on_custom_params<H: Host>(
        &mut self,
        host: &mut H,
        params: &BTreeMap<String, Value>,
        now: Instant,
    ) {
        if let Err(e) = host.clear_notices() {
            log::warn!("Could not clear notices: {}", e);
        }

        let username = string_param(params, PARAM_USERNAME);
        let api_key = string_param(params, PARAM_API_KEY);
        credential_notices(host, username.is_none(), api_key.is_none());

        if let (Some(username), Some(api_key)) = (username, api_key) {
            self.set_credentials(Credentials { username, api_key });
            self.discover(host, now);
        }
    }

    fn stored_credentials(&self) -> Option<Credentials> {
        Credentials::load(&self.kvs).unwrap_or_else(|e| {
            log::warn!("Could not read stored credentials: {}", e);
            None
        })
    }

    fn set_credentials(&mut self, credentials: Credentials) {
        let unchanged = match Credentials::load(&self.kvs) {
            Ok(stored) => stored.as_ref() == Some(&credentials),
            Err(e) => {
                // Unknown previous owner; keep the snapshot, overwrite the record
                log::warn!("Could not read stored credentials: {}", e);
                if let Err(e) = credentials.save(&self.kvs) {
                    log::warn!("Could not persist credentials: {}", e);
                }
                true
            }
        };
        if !unchanged {
            // A snapshot fetched with other credentials may describe another account
            self.drop_snapshot();
            if let Err(e) = credentials.save(&self.kvs) {
                log::warn!("Could not persist credentials: {}", e);
            }
        }
        self.client = match LinkTapClient::new(&self.opts.api_base_url, credentials) {
            Ok(client) => Some(client),
            Err(e) => {
                log::error!("Could not create API client: {}", e);
                None
            }
        };
    }

    fn drop_snapshot(&mut self) {
        if self.snapshot.take().is_some() {
            log::info!("Credentials changed; dropping cached device snapshot");
        }
        if let Err(e) = snapshot::clear(&self.kvs) {
            log::warn!("Could not remove cached device snapshot: {}", e);
        }
    }

    fn fetch_devices(&mut self) -> Fetch {
        let Some(client) = &self.client else {
            log::warn!("Credentials not set; cannot fetch devices");
            return Fetch::Failed;
        };

        let now = now_epoch();
        if let Some(snapshot) = &self.snapshot {
            let age = snapshot.age_secs(now);
            if age >= 0 && (age as u64) < self.opts.devices_min_interval.as_secs() {
                log::debug!("Using device snapshot fetched {}s ago", age);
                return Fetch::Cached;
            }
        }

        match client.get_all_devices() {
            Ok(devices) => {
                log::info!(
                    "Fetched {} gateway(s) with {} tap-linker(s)",
                    devices.devices.len(),
                    devices.taplinker_count()
                );
                let snapshot = Snapshot {
                    devices,
                    fetched_at: now,
                };
                if let Err(e) = snapshot::save(&self.kvs, &snapshot) {
                    log::warn!("Could not cache device snapshot: {}", e);
                }
                self.snapshot = Some(snapshot);
                Fetch::Fresh
            }
            Err(e) if e.is_rejection() => {
                log::info!(
                    "get_link_tap_devices: The minimum interval of calling this API is 5 minutes. ({})",
                    e
                );
                Fetch::Failed
            }
            Err(e) => {
                log::info!("Get all devices failed: {}", e);
                Fetch::Failed
            }
        }
    }

    pub fn discover<H: Host>(&mut self, host: &mut H, now: Instant) {
        if self.client.is_none() {
            log::info!("Discovery requested before credentials were set");
            credential_notices(host, true, true);
            return;
        }
        if self.fetch_devices() == Fetch::Failed {
            self.ready = false;
            if self.discover_retry.is_exhausted() {
                log::info!("Failed to get devices; automatic retries have been exhausted");
            } else if self.discover_retry.schedule(now).is_some() {
                log::info!(
                    "Failed to get devices. Will retry in {} minutes",
                    self.opts.discover_retry_delay.as_secs() / 60
                );
            }
            return;
        }

        self.discover_retry.cancel();
        self.queue_new_nodes();
        self.discovering = true;
        self.add_due_nodes(host, now);
    }

    fn queue_new_nodes(&mut self) {
        let Some(snapshot) = &self.snapshot else {
            return;
        };
        for gw in snapshot.devices.devices.iter() {
            let gw_address = gw.node_address();
            let gw_node = Node::new(NodeKind::Gateway, &gw_address, &gw_address, &gw.name);
            let tl_nodes = gw.taplinker.iter().map(|tl| {
                Node::new(NodeKind::Taplinker, &gw_address, &tl.node_address(), &tl.taplinker_name)
            });
            for node in std::iter::once(gw_node).chain(tl_nodes) {
                let queued = self.pending_adds.iter().any(|n| n.address == node.address);
                if !queued && !self.nodes.contains(&node.address) {
                    self.pending_adds.push_back(node);
                }
            }
        }
    }

    /// Add queued nodes whose turn has come. The host needs time to process
    /// each addition, so consecutive adds are `node_add_delay` apart. Once
    /// the queue drains, discovery completes.
    fn add_due_nodes<H: Host>(&mut self, host: &mut H, now: Instant) {
        while self.next_add_at.map_or(true, |at| at <= now) {
            let Some(node) = self.pending_adds.pop_front() else {
                break;
            };
            if self.nodes.contains(&node.address) {
                continue;
            }
            match host.add_node(&node.def()) {
                Ok(()) => {
                    log::info!(
                        "Added {} node {} ({})",
                        node.kind.node_def_id(),
                        node.address,
                        node.name
                    );
                    self.nodes.insert(node);
                }
                Err(e) => log::error!("Could not add node {}: {}", node.address, e),
            }
            self.next_add_at = Some(now + self.opts.node_add_delay);
        }

        if self.discovering && self.pending_adds.is_empty() {
            self.discovering = false;
            log::info!("Discovery complete: {} node(s) registered", self.nodes.len());
            self.ready = true;
            self.update_nodes(host);
        }
    }

    /// Push the current snapshot to every node. Nodes missing from the
    /// snapshot keep their last values.
    pub fn update_nodes<H: Host>(&mut self, host: &mut H) {
        let Some(snapshot) = &self.snapshot else {
            return;
        };
        for node in self.nodes.iter_mut() {
            let values = match node.kind {
                NodeKind::Gateway => snapshot
                    .devices
                    .find_gateway(&node.address)
                    .map(gateway::driver_values),
                NodeKind::Taplinker => snapshot
                    .devices
                    .find_taplinker(&node.address)
                    .map(|(_, tl)| taplinker::driver_values(tl)),
            };
            match values {
                Some(values) => {
                    if let Err(e) = node.set_drivers(host, &values, false) {
                        log::error!("Could not update node {}: {}", node.address, e);
                    }
                }
                None => log::debug!("Node {} not in latest device list", node.address),
            }
        }
    }

    pub fn long_poll<H: Host>(&mut self, host: &mut H) {
        if !self.ready {
            log::debug!("Not ready; skipping long poll");
            return;
        }
        match self.fetch_devices() {
            Fetch::Fresh => self.update_nodes(host),
            Fetch::Cached => {}
            Fetch::Failed => log::info!("LinkTap Devices API returned no data"),
        }
    }

    pub fn short_poll<H: Host>(&mut self, host: &mut H, now: Instant) {
        if !self.ready {
            return;
        }
        self.refresh_watering(now);
        self.update_nodes(host);
    }

    /// Refresh live progress of tap-linkers that are watering, at most once
    /// per `watering_status_min_interval` each.
    fn refresh_watering(&mut self, now: Instant) {
        let min_interval = self.opts.watering_status_min_interval;
        let due: Vec<String> = self
            .nodes
            .iter()
            .filter(|n| n.kind == NodeKind::Taplinker && n.driver(Driver::Watering) == Some(1.0))
            .filter(|n| match self.watering_checked.get(&n.address) {
                Some(at) => now.saturating_duration_since(*at) >= min_interval,
                None => true,
            })
            .map(|n| n.address.clone())
            .collect();

        let (Some(client), Some(snapshot)) = (&self.client, &mut self.snapshot) else {
            return;
        };
        for address in due {
            let Some(tl) = snapshot.devices.find_taplinker_mut(&address) else {
                continue;
            };
            self.watering_checked.insert(address.clone(), now);
            match client.get_watering_status(&tl.taplinker_id) {
                Ok(status) => tl.watering = status.map(Into::into),
                Err(e) => log::info!("Could not get watering status for {}: {}", address, e),
            }
        }
    }

    pub fn on_query<H: Host>(&mut self, host: &mut H, address: Option<&str>) {
        let nodes: Vec<&mut Node> = match address {
            Some(address) => match self.nodes.get_mut(address) {
                Some(node) => vec![node],
                None => {
                    log::warn!("Query for unknown node {}", address);
                    return;
                }
            },
            None => self.nodes.iter_mut().collect(),
        };
        for node in nodes {
            if let Err(e) = node.report_drivers(host) {
                log::error!("Could not report drivers of {}: {}", node.address, e);
            }
        }
    }

    pub fn on_command<H: Host>(&mut self, host: &mut H, cmd: &NodeCommand) {
        if cmd.cmd == CMD_QUERY {
            return self.on_query(host, Some(&cmd.address));
        }
        let Some(kind) = self.nodes.get(&cmd.address).map(|n| n.kind) else {
            log::warn!("Command {} for unknown node {}", cmd.cmd, cmd.address);
            return;
        };

        match kind {
            NodeKind::Gateway => match GatewayCommand::parse(&cmd.cmd) {
                Some(gw_cmd) => self.set_node_drivers(host, &cmd.address, &gw_cmd.driver_values()),
                None => log::warn!("Unknown gateway command {}", cmd.cmd),
            },
            NodeKind::Taplinker => match TaplinkerCommand::parse(&cmd.cmd, cmd.value.as_ref()) {
                Ok(tl_cmd) => self.run_taplinker_command(host, &cmd.address, tl_cmd),
                Err(e) => log::warn!("Ignoring command for {}: {}", cmd.address, e),
            },
        }
    }

    fn set_node_drivers<H: Host>(&mut self, host: &mut H, address: &str, values: &[(Driver, f64)]) {
        if let Some(node) = self.nodes.get_mut(address) {
            if let Err(e) = node.set_drivers(host, values, false) {
                log::error!("Could not update node {}: {}", address, e);
            }
        }
    }

    /// Vendor ids of a tap-linker and its gateway
    fn device_ids(&self, address: &str) -> Option<(String, String)> {
        if let Some((gw, tl)) = self
            .snapshot
            .as_ref()
            .and_then(|s| s.devices.find_taplinker(address))
        {
            return Some((gw.gateway_id.clone(), tl.taplinker_id.clone()));
        }
        self.nodes
            .get(address)
            .map(|node| (fallback_device_id(&node.primary), fallback_device_id(address)))
    }

    fn run_taplinker_command<H: Host>(&mut self, host: &mut H, address: &str, tl_cmd: TaplinkerCommand) {
        let Some(client) = &self.client else {
            log::warn!("Credentials not set; ignoring {:?} for {}", tl_cmd, address);
            return;
        };
        let Some((gateway_id, taplinker_id)) = self.device_ids(address) else {
            return;
        };

        let result: Result<(), ApiError> = match tl_cmd {
            TaplinkerCommand::InstantOn { duration } => {
                client.activate_instant_mode(&gateway_id, &taplinker_id, true, duration, false)
            }
            TaplinkerCommand::InstantOff => {
                client.activate_instant_mode(&gateway_id, &taplinker_id, false, 0, false)
            }
            TaplinkerCommand::Mode(mode) => client.activate_mode(mode, &gateway_id, &taplinker_id),
        };
        if let Err(e) = result {
            log::error!("{:?} failed for {}: {}", tl_cmd, address, e);
            return;
        }
        log::info!("{:?} activated for {}", tl_cmd, address);

        // Keep the snapshot in line so short polls don't revert the drivers
        if let Some(watering) = tl_cmd.resulting_watering() {
            if let Some(tl) = self
                .snapshot
                .as_mut()
                .and_then(|s| s.devices.find_taplinker_mut(address))
            {
                tl.watering = watering;
            }
            self.watering_checked.insert(address.to_string(), Instant::now());
        }
        self.set_node_drivers(host, address, &tl_cmd.driver_values());
    }

    /// Add nodes that are due and run a scheduled discovery retry
    pub fn tick<H: Host>(&mut self, host: &mut H, now: Instant) {
        self.add_due_nodes(host, now);

        let was_exhausted = self.discover_retry.is_exhausted();
        match self.discover_retry.take_due(now) {
            Some(attempt) => {
                log::info!(
                    "discover_retry: Failed to start. Retrying attempt: {}",
                    attempt
                );
                self.discover(host, now);
            }
            None if !was_exhausted && self.discover_retry.is_exhausted() => {
                log::info!(
                    "discover_retry: Failed to start after {} retries. Aborting",
                    self.discover_retry.max_attempts()
                );
            }
            None => {}
        }
    }
}

#[cfg(test)]
impl Controller {
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn nodes(&self) -> &Nodes {
        &self.nodes
    }

    pub fn snapshot(&self) -> Option<&Snapshot> {
        self.snapshot.as_ref()
    }

    pub fn discover_retry_pending(&self) -> bool {
        self.discover_retry.is_pending()
    }

    pub fn discover_exhausted(&self) -> bool {
        self.discover_retry.is_exhausted()
    }

    pub fn pending_adds(&self) -> usize {
        self.pending_adds.len()
    }
}

fn string_param(params: &BTreeMap<String, Value>, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn notice<H: Host>(host: &mut H, key: &str, text: &str) {
    if let Err(e) = host.set_notice(key, text) {
        log::warn!("Could not post notice '{}': {}", text, e);
    }
}

fn credential_notices<H: Host>(host: &mut H, username_missing: bool, api_key_missing: bool) {
    if username_missing {
        notice(host, PARAM_USERNAME, NOTICE_USERNAME);
    }
    if api_key_missing {
        notice(host, PARAM_API_KEY, NOTICE_API_KEY);
    }
}
