use std::collections::BTreeSet;
use std::thread;
use std::time::{Duration, Instant};

use assert_cmd::Command;
use rumqttc::mqttbytes::v4::Publish;
use serde_json::Value;

mod stubs;

use stubs::broker::{Broker, Seen};
use stubs::devices::{many_devices, API_KEY, USERNAME};

const BIN: &str = "linktap-ns";
const NS_ID: &str = "00:21:b9:02:55:cd_7";
const WAIT: Duration = Duration::from_secs(20);

fn topic(prefix: &str) -> String {
    format!("udi/pg3/ns/{prefix}/{NS_ID}")
}

fn next_or_fail(broker: &Broker, deadline: Instant) -> Seen {
    let left = deadline.saturating_duration_since(Instant::now());
    broker
        .next(left)
        .unwrap_or_else(|| panic!("Nothing more from the node server within {:?}", WAIT))
}

/// Note `ready` and `addnode` messages on the command topic
fn tally(msg: &Publish, ready: &mut bool, added: &mut BTreeSet<String>) {
    if msg.topic != topic("command") {
        return;
    }
    let body: Value = serde_json::from_slice(&msg.payload).unwrap();
    if body.get("ready").is_some() {
        *ready = true;
    }
    if let Some(nodes) = body.get("addnode").and_then(Value::as_array) {
        for node in nodes {
            added.insert(node["address"].as_str().unwrap().to_string());
        }
    }
}

#[test]
fn run_delivers_large_discovery_and_stops() {
    let broker = Broker::start();
    let mut server = mockito::Server::new();
    // 2 gateways with 5 tap-linkers each: 12 nodes, well past the client's request capacity
    let m = server
        .mock("POST", "/getAllDevices")
        .with_body(many_devices(2, 5))
        .expect(1)
        .create();

    let tempdir = tempfile::tempdir().unwrap();
    let data_dir = tempdir.path().to_path_buf();
    let port = broker.port;
    let api_url = server.url();
    let command_thread = thread::spawn(move || {
        let mut cmd = Command::cargo_bin(BIN).unwrap();
        cmd.env("LTNS_DATA_DIR", data_dir)
            .env("MQTT_HOST", "127.0.0.1")
            .env("MQTT_PORT", port.to_string())
            .env("PG3_UUID", "00:21:b9:02:55:cd")
            .env("PG3_PROFILE", "7")
            .env("LINKTAP_API_BASE_URL", api_url)
            .env("LTNS_NODE_ADD_DELAY_MS", "0")
            .env_remove("LINKTAP_USERNAME")
            .env_remove("LINKTAP_API_KEY")
            .arg("run")
            .timeout(Duration::from_secs(30))
            .assert()
            .success();
    });

    let deadline = Instant::now() + WAIT;
    let mut ready = false;
    let mut added = BTreeSet::new();
    let mut published = 0;
    loop {
        match next_or_fail(&broker, deadline) {
            Seen::Subscribed(path) => {
                assert_eq!(path, topic("clients"));
                break;
            }
            Seen::Published(msg) => {
                published += 1;
                tally(&msg, &mut ready, &mut added);
            }
            _ => {}
        }
    }

    broker.publish(
        &topic("clients"),
        &format!(r#"{{"customparams":{{"username":"{USERNAME}","apiKey":"{API_KEY}"}}}}"#),
    );

    while added.len() < 12 || !ready {
        if let Seen::Published(msg) = next_or_fail(&broker, deadline) {
            published += 1;
            tally(&msg, &mut ready, &mut added);
        }
    }
    assert_eq!(added.len(), 12);
    assert!(added.contains("a0000000"));
    assert!(added.contains("b0010004"));
    assert!(published > 12);

    // The loop still takes events after the burst
    broker.publish(&topic("clients"), r#"{"stop":{}}"#);
    loop {
        if let Seen::Disconnected = next_or_fail(&broker, deadline) {
            break;
        }
    }

    command_thread.join().unwrap();
    m.assert();
}
