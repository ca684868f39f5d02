#![allow(dead_code)]

use std::io::{ErrorKind, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;

use bytes::BytesMut;
use rumqttc::mqttbytes::v4::{
    self, ConnAck, ConnectReturnCode, Packet, PingResp, PubAck, Publish, SubAck,
    SubscribeReasonCode,
};
use rumqttc::mqttbytes::{Error as PacketError, QoS};

const MAX_PACKET_SIZE: usize = 1024 * 1024;
const READ_POLL: Duration = Duration::from_millis(20);

#[derive(Debug)]
pub enum Seen {
    Connected,
    Subscribed(String),
    Published(Publish),
    Disconnected,
}

/// Broker for a single client. Acknowledges whatever the client sends,
/// reports it, and forwards queued publishes to the client.
pub struct Broker {
    pub port: u16,
    seen: Receiver<Seen>,
    to_client: Sender<Publish>,
}

impl Broker {
    pub fn start() -> Broker {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let (seen_tx, seen) = mpsc::channel();
        let (to_client, outbound) = mpsc::channel();
        thread::spawn(move || {
            if let Ok((stream, _)) = listener.accept() {
                serve(stream, seen_tx, outbound);
            }
        });
        Broker {
            port,
            seen,
            to_client,
        }
    }

    pub fn publish(&self, topic: &str, payload: &str) {
        self.to_client
            .send(Publish::new(topic, QoS::AtMostOnce, payload))
            .unwrap();
    }

    pub fn next(&self, timeout: Duration) -> Option<Seen> {
        self.seen.recv_timeout(timeout).ok()
    }
}

fn write_packet(
    stream: &mut TcpStream,
    encode: impl FnOnce(&mut BytesMut) -> Result<usize, PacketError>,
) {
    let mut out = BytesMut::new();
    encode(&mut out).unwrap();
    stream.write_all(&out).unwrap();
}

fn serve(mut stream: TcpStream, seen: Sender<Seen>, outbound: Receiver<Publish>) {
    stream.set_read_timeout(Some(READ_POLL)).unwrap();
    let mut buf = BytesMut::new();
    let mut chunk = [0u8; 4096];

    loop {
        while let Ok(publish) = outbound.try_recv() {
            write_packet(&mut stream, |out| publish.write(out));
        }
        match stream.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => continue,
            Err(_) => break,
        }

        loop {
            let packet = match v4::read(&mut buf, MAX_PACKET_SIZE) {
                Ok(packet) => packet,
                Err(PacketError::InsufficientBytes(_)) => break,
                Err(e) => panic!("Malformed packet from client: {e:?}"),
            };
            match packet {
                Packet::Connect(_) => {
                    write_packet(&mut stream, |out| {
                        ConnAck::new(ConnectReturnCode::Success, false).write(out)
                    });
                    let _ = seen.send(Seen::Connected);
                }
                Packet::Subscribe(sub) => {
                    let codes = sub
                        .filters
                        .iter()
                        .map(|f| SubscribeReasonCode::Success(f.qos))
                        .collect();
                    write_packet(&mut stream, |out| SubAck::new(sub.pkid, codes).write(out));
                    for filter in sub.filters {
                        let _ = seen.send(Seen::Subscribed(filter.path));
                    }
                }
                Packet::Publish(publish) => {
                    if publish.qos != QoS::AtMostOnce {
                        write_packet(&mut stream, |out| PubAck::new(publish.pkid).write(out));
                    }
                    let _ = seen.send(Seen::Published(publish));
                }
                Packet::PingReq => write_packet(&mut stream, |out| PingResp.write(out)),
                Packet::Disconnect => {
                    let _ = seen.send(Seen::Disconnected);
                    return;
                }
                _ => {}
            }
        }
    }
    let _ = seen.send(Seen::Disconnected);
}
