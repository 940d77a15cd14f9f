//! Shared helpers for Tether integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use tether_protocol::client::{ClientConfig, ClientEvent, ClientEvents, TetherClient};
use tether_protocol::core::{AnyPacket, FIRST_USER_PACKET_ID, FrameError, MAX_MTU, Packet};
use tether_protocol::packet::{DecodedPacket, PacketRegistry, encode, read_string, write_string};
use tokio::net::UdpSocket;
use tokio::time::timeout;

/// How long a test waits for something that should happen.
pub const PATIENCE: Duration = Duration::from_secs(5);

/// Install a subscriber once per test binary. `RUST_LOG` controls the level.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Reliable application packet carrying one line of text.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Chat {
    pub text: String,
}

impl Chat {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
        }
    }
}

impl Packet for Chat {
    const ID: u8 = FIRST_USER_PACKET_ID;
    const RELIABLE: bool = true;
    const UNCONNECTED: bool = false;

    fn encode_payload(&self, buf: &mut BytesMut) -> Result<(), FrameError> {
        write_string(buf, &self.text)
    }

    fn decode_payload(&mut self, buf: &mut &[u8]) -> Result<(), FrameError> {
        self.text = read_string(buf)?;
        Ok(())
    }
}

pub fn registry() -> Arc<PacketRegistry> {
    let registry = PacketRegistry::with_system_packets();
    registry.add::<Chat>();
    Arc::new(registry)
}

/// Config with short timers so tests finish quickly.
pub fn fast_config() -> ClientConfig {
    ClientConfig::builder()
        .resend_interval(Duration::from_millis(100))
        .connect_timeout(Duration::from_secs(3))
        .build()
        .unwrap()
}

pub fn engine(config: ClientConfig) -> (TetherClient, ClientEvents) {
    TetherClient::new(config, registry()).unwrap()
}

/// Wait for the first event matching `predicate`, discarding the rest.
pub async fn wait_for<F>(events: &mut ClientEvents, mut predicate: F) -> ClientEvent
where
    F: FnMut(&ClientEvent) -> bool,
{
    timeout(PATIENCE, async {
        loop {
            let event = events.recv().await.expect("event stream closed");
            if predicate(&event) {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

/// Count matching events arriving within `window`.
pub async fn count_within<F>(events: &mut ClientEvents, window: Duration, mut predicate: F) -> usize
where
    F: FnMut(&ClientEvent) -> bool,
{
    let mut count = 0;
    let _ = timeout(window, async {
        while let Some(event) = events.recv().await {
            if predicate(&event) {
                count += 1;
            }
        }
    })
    .await;
    count
}

/// A raw UDP socket standing in for the far end of a connection.
pub struct FakePeer {
    pub socket: UdpSocket,
    pub registry: Arc<PacketRegistry>,
}

impl FakePeer {
    pub async fn bind() -> Self {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        Self {
            socket,
            registry: registry(),
        }
    }

    pub fn port(&self) -> u16 {
        self.socket.local_addr().unwrap().port()
    }

    /// Receive and decode one datagram, failing the test after `PATIENCE`.
    pub async fn recv(&self) -> (DecodedPacket, SocketAddr) {
        self.recv_within(PATIENCE)
            .await
            .expect("no datagram received")
    }

    /// Receive and decode one datagram, or `None` if nothing arrives in time.
    pub async fn recv_within(&self, window: Duration) -> Option<(DecodedPacket, SocketAddr)> {
        let mut buf = vec![0u8; MAX_MTU];
        let (len, from) = timeout(window, self.socket.recv_from(&mut buf))
            .await
            .ok()?
            .unwrap();
        let decoded = self.registry.decode(&buf[..len]).unwrap();
        Some((decoded, from))
    }

    pub async fn send(&self, packet: &dyn AnyPacket, session_id: u32, sequence: u32, to: SocketAddr) {
        let wire = encode(packet, session_id, sequence, MAX_MTU).unwrap();
        self.socket.send_to(&wire, to).await.unwrap();
    }

    pub async fn send_raw(&self, data: &[u8], to: SocketAddr) {
        self.socket.send_to(data, to).await.unwrap();
    }
}
