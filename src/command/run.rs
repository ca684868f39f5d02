use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use kvstore::KVDb;
use rumqttc::{Connection, Event, Outgoing, Packet, RecvTimeoutError};

use crate::constants::defaults;
use crate::interfaces::linktap_api::get_api_base_url;
use crate::interfaces::polyglot::{node_server_id, HostEvent, MqttHost};
use crate::interfaces::{kvpath, mqtt};
use crate::node_mgmt::{Controller, ControllerOpts, Flow};

const CLIENT_ID_PREFIX: &str = "linktap-ns";
const RECONNECT_DELAY: Duration = Duration::from_secs(5);
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

pub fn run() -> Result<()> {
    let kvs = KVDb::new(kvpath::SQLITE_STORE.as_path())?;
    let opts = ControllerOpts::from_env(get_api_base_url(Some(&kvs)));
    log::info!("Using LinkTap API at {}", opts.api_base_url);
    let mut controller = Controller::new(opts, kvs);

    let (client, mut connection) =
        mqtt::client_conn(mqtt::get_rand_client_id(Some(CLIENT_ID_PREFIX)), None);
    let mut host = MqttHost::new(client, node_server_id());
    let inbound_topic = host.inbound_topic();
    let mut resumed = false;
    let mut stopping = false;

    loop {
        // Handlers only queue; the client gets the messages here, between polls
        if let Err(e) = host.flush() {
            log::error!("Could not pass messages to MQTT client: {}", e);
        }
        if stopping && host.pending() == 0 {
            break;
        }

        match connection.recv_timeout(defaults::RUN_LOOP_TICK) {
            Ok(Ok(Event::Incoming(Packet::ConnAck(_)))) => {
                log::info!("Connected to MQTT broker");
                host.subscribe();
                host.ready()?;
                if !resumed {
                    controller.resume(&mut host, Instant::now());
                    resumed = true;
                }
            }
            Ok(Ok(Event::Incoming(Packet::Publish(msg)))) if msg.topic == inbound_topic => {
                if stopping {
                    continue;
                }
                match HostEvent::from_payload(&msg.payload) {
                    Ok(event) => {
                        if controller.handle_event(&mut host, event, Instant::now()) == Flow::Stop {
                            stopping = true;
                        }
                    }
                    Err(e) => log::warn!("Ignoring unrecognised host message: {}", e),
                }
            }
            Ok(Ok(event)) => log::trace!("MQTT event: {:?}", event),
            Ok(Err(e)) => {
                log::error!("MQTT connection error: {}", e);
                thread::sleep(RECONNECT_DELAY);
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                log::warn!("MQTT event loop closed");
                return Ok(());
            }
        }
        if !stopping {
            controller.tick(&mut host, Instant::now());
        }
    }

    shutdown(&mut host, &mut connection);
    log::info!("Stopped");
    Ok(())
}

/// Let the event loop send what it still holds, then the disconnect
fn shutdown(host: &mut MqttHost, connection: &mut Connection) {
    let deadline = Instant::now() + SHUTDOWN_GRACE;
    let mut requested = false;
    while Instant::now() < deadline {
        if !requested {
            match host.disconnect() {
                Ok(()) => requested = true,
                Err(e) if e.is_backpressure() => {}
                Err(e) => {
                    log::warn!("Could not disconnect cleanly: {}", e);
                    return;
                }
            }
        }
        match connection.recv_timeout(defaults::RUN_LOOP_TICK) {
            Ok(Ok(Event::Outgoing(Outgoing::Disconnect))) => return,
            Ok(Err(e)) => {
                log::debug!("Connection closed during shutdown: {}", e);
                return;
            }
            Err(RecvTimeoutError::Disconnected) => return,
            _ => {}
        }
    }
    log::warn!("Timed out waiting for MQTT disconnect");
}
