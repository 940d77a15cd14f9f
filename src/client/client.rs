//! The Tether connection engine.
//!
//! [`TetherClient`] owns one UDP socket, the connection state machine, and
//! the reliability queue. `connect` or `listen` spawns a sender and a
//! receiver task that share the engine's state; `disconnect` cancels both.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::config::ClientConfig;
use super::event::{ClientEvent, ClientEvents};
use super::resolve::resolve_host;
use super::worker::{run_receiver, run_sender};
use crate::core::{AnyPacket, Packet, REASON_LOCAL};
use crate::packet::{Login, Logout, PacketRegistry};
use crate::transport::{
    ConnectionPhase, ConnectionState, EndpointCache, Envelope, ReliabilityQueue, TetherSocket,
    TransportError,
};

/// Errors that can occur in the Tether client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The packet may not be sent in the current phase.
    #[error("cannot send packet {packet_id} while {phase}")]
    InvalidState {
        /// Identifier of the rejected packet.
        packet_id: u8,
        /// Phase at the time of the call.
        phase: ConnectionPhase,
    },

    /// Host name resolution failed.
    #[error("failed to resolve {0}")]
    Resolve(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The packet could not be framed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Per-connection resources, present while the loops run.
pub(crate) struct Link {
    pub(crate) socket: TetherSocket,
    outbound: mpsc::UnboundedSender<Envelope>,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

/// State shared between the public handle and the loops.
///
/// Lock order is `state` before `link`. Neither lock is held across an await.
pub(crate) struct Shared {
    pub(crate) config: ClientConfig,
    pub(crate) registry: Arc<PacketRegistry>,
    pub(crate) state: Mutex<ConnectionState>,
    pub(crate) queue: ReliabilityQueue,
    pub(crate) endpoints: EndpointCache,
    link: Mutex<Option<Link>>,
    events: mpsc::UnboundedSender<ClientEvent>,
    next_sequence: AtomicU32,
}

impl Shared {
    pub(crate) fn emit(&self, event: ClientEvent) {
        // A dropped event receiver is not an error.
        let _ = self.events.send(event);
    }

    pub(crate) fn phase(&self) -> ConnectionPhase {
        self.state.lock().phase
    }

    pub(crate) fn session_id(&self) -> u32 {
        self.state.lock().session_id
    }

    pub(crate) fn remote(&self) -> Option<SocketAddr> {
        self.state.lock().remote
    }

    fn next_sequence(&self) -> u32 {
        loop {
            let sequence = self.next_sequence.fetch_add(1, Ordering::Relaxed);
            if sequence != 0 {
                return sequence;
            }
        }
    }

    /// Hand an envelope to the sender loop. `false` if the loops are gone.
    pub(crate) fn enqueue(&self, envelope: Envelope) -> bool {
        match self.link.lock().as_ref() {
            Some(link) => link.outbound.send(envelope).is_ok(),
            None => false,
        }
    }

    /// Tear the connection down.
    ///
    /// Only the first call after a connect or listen has any effect: it
    /// resets the state machine, cancels both loops, drops the socket and
    /// the outbound queue, clears the reliability queue, and emits
    /// `Disconnected`. The loop handles are returned for the caller to await
    /// or detach.
    pub(crate) fn shutdown(&self, reason: &str) -> Vec<JoinHandle<()>> {
        let mut state = self.state.lock();
        if !state.reset() {
            return Vec::new();
        }
        let link = self.link.lock().take();
        let dropped = self.queue.clear();
        let tasks = match link {
            Some(link) => {
                link.cancel.cancel();
                link.tasks
            }
            None => Vec::new(),
        };
        info!(reason, dropped, "disconnected");
        self.emit(ClientEvent::Disconnected {
            reason: reason.to_string(),
        });
        tasks
    }

    fn logout_target(&self) -> Option<(TetherSocket, SocketAddr, u32)> {
        let state = self.state.lock();
        if state.phase != ConnectionPhase::Connected {
            return None;
        }
        let remote = state.remote?;
        let socket = self.link.lock().as_ref()?.socket.clone();
        Some((socket, remote, state.session_id))
    }
}

/// A Tether connection engine.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
///
/// use tether_protocol::client::{ClientConfig, ClientEvent, TetherClient};
/// use tether_protocol::packet::PacketRegistry;
///
/// # async fn run() -> Result<(), tether_protocol::client::ClientError> {
/// let registry = Arc::new(PacketRegistry::with_system_packets());
/// let (client, mut events) = TetherClient::new(ClientConfig::default(), registry)?;
///
/// client.connect("localhost", 7777, "hello".into()).await?;
///
/// while let Some(event) = events.recv().await {
///     if let ClientEvent::Connected { session_id } = event {
///         println!("connected with session {session_id}");
///         break;
///     }
/// }
///
/// client.disconnect(None, true).await;
/// # Ok(())
/// # }
/// ```
pub struct TetherClient {
    shared: Arc<Shared>,
}

impl TetherClient {
    /// Create a disconnected engine and its event stream.
    pub fn new(
        config: ClientConfig,
        registry: Arc<PacketRegistry>,
    ) -> Result<(Self, ClientEvents), ClientError> {
        config.validate()?;
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let endpoints =
            EndpointCache::new(config.endpoint_cache_capacity, config.endpoint_idle_timeout);
        let shared = Arc::new(Shared {
            config,
            registry,
            state: Mutex::new(ConnectionState::new()),
            queue: ReliabilityQueue::new(),
            endpoints,
            link: Mutex::new(None),
            events: events_tx,
            next_sequence: AtomicU32::new(1),
        });
        Ok((Self { shared }, ClientEvents::new(events_rx)))
    }

    /// Connect to `host:port`, sending `metadata` in the Login.
    ///
    /// Uses the configured connect timeout. See
    /// [`connect_with_timeout`](Self::connect_with_timeout).
    pub async fn connect(&self, host: &str, port: u16, metadata: Bytes) -> Result<(), ClientError> {
        let timeout = self.shared.config.connect_timeout;
        self.connect_with_timeout(host, port, metadata, timeout)
            .await
    }

    /// Connect to `host:port` with an explicit liveness timeout.
    ///
    /// Does nothing unless disconnected. Returns once the Login is queued;
    /// completion is reported by a `Connected` event.
    pub async fn connect_with_timeout(
        &self,
        host: &str,
        port: u16,
        metadata: Bytes,
        timeout: Duration,
    ) -> Result<(), ClientError> {
        if self.shared.phase().is_active() {
            debug!(host, port, "connect ignored, already active");
            return Ok(());
        }

        let remote = resolve_host(host, port).await?;
        let socket = TetherSocket::bind_ephemeral(remote, self.shared.config.mtu).await?;

        let started = {
            let mut state = self.shared.state.lock();
            if state.begin_connect(remote, Instant::now()) {
                self.start(socket, timeout);
                true
            } else {
                false
            }
        };
        if !started {
            debug!(peer = %remote, "connect ignored, already active");
            return Ok(());
        }

        info!(peer = %remote, "connecting");
        self.send(Login::new(metadata))?;
        Ok(())
    }

    /// Bind `addr` and wait for a peer's Login.
    ///
    /// Returns the bound address. The first accepted Login makes its sender
    /// the remote. Does nothing unless disconnected, returning the current
    /// local address if there is one.
    pub async fn listen(&self, addr: SocketAddr) -> Result<SocketAddr, ClientError> {
        if let Some(local) = self.active_local_addr() {
            return Ok(local);
        }

        let socket = TetherSocket::bind(addr, self.shared.config.mtu).await?;
        let local = socket.local_addr()?;

        let started = {
            let mut state = self.shared.state.lock();
            if state.begin_listen(Instant::now()) {
                self.start(socket, self.shared.config.connect_timeout);
                true
            } else {
                false
            }
        };
        if !started {
            return self
                .local_addr()
                .ok_or_else(|| io::Error::other("engine stopped while binding").into());
        }

        info!(local = %local, "listening");
        Ok(local)
    }

    fn active_local_addr(&self) -> Option<SocketAddr> {
        if self.shared.phase().is_active() {
            self.local_addr()
        } else {
            None
        }
    }

    /// Spawn both loops. Called with the state lock held, right after the
    /// state machine left `Disconnected`.
    fn start(&self, socket: TetherSocket, timeout: Duration) {
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let receiver = tokio::spawn(run_receiver(
            Arc::clone(&self.shared),
            socket.clone(),
            cancel.clone(),
        ));
        let sender = tokio::spawn(run_sender(
            Arc::clone(&self.shared),
            socket.clone(),
            cancel.clone(),
            outbound_rx,
            timeout,
        ));

        *self.shared.link.lock() = Some(Link {
            socket,
            outbound,
            cancel,
            tasks: vec![receiver, sender],
        });
    }

    /// Queue `packet` for sending to the current remote.
    ///
    /// Returns the sequence assigned to a reliable packet. Fails without
    /// touching the socket if the packet is not allowed in the current phase
    /// or does not fit the MTU.
    pub fn send<P: Packet>(&self, packet: P) -> Result<Option<u32>, ClientError> {
        self.send_arc(Arc::new(packet))
    }

    /// [`send`](Self::send) for an already shared packet.
    pub fn send_arc(&self, packet: Arc<dyn AnyPacket>) -> Result<Option<u32>, ClientError> {
        let shared = &self.shared;
        let state = shared.state.lock();
        if !state.can_send(packet.is_unconnected()) {
            return Err(ClientError::InvalidState {
                packet_id: packet.packet_id(),
                phase: state.phase,
            });
        }

        let packet_id = packet.packet_id();
        let mut envelope = Envelope::from_arc(packet).with_session(state.session_id);
        let mut scratch = BytesMut::new();
        envelope
            .encode_into(shared.config.mtu, &mut scratch)
            .map_err(TransportError::from)?;

        let link = shared.link.lock();
        let Some(link) = link.as_ref() else {
            return Err(ClientError::InvalidState {
                packet_id,
                phase: ConnectionPhase::Disconnected,
            });
        };

        let sequence = if envelope.is_reliable() {
            let sequence = shared.next_sequence();
            envelope.sequence = sequence;
            shared.queue.track(envelope.clone());
            Some(sequence)
        } else {
            None
        };

        debug!(packet_id, ?sequence, "queued");
        if link.outbound.send(envelope).is_err() {
            if let Some(sequence) = sequence {
                shared.queue.acknowledge(sequence);
            }
            return Err(ClientError::InvalidState {
                packet_id,
                phase: ConnectionPhase::Disconnected,
            });
        }
        Ok(sequence)
    }

    /// Close the connection.
    ///
    /// With `wait_for_queue`, first waits until every reliable packet has
    /// been acknowledged or abandoned. A connected engine then tells the
    /// peer with a best-effort Logout. Safe to call in any phase; only the
    /// first call after a connect emits `Disconnected`.
    pub async fn disconnect(&self, reason: Option<&str>, wait_for_queue: bool) {
        if wait_for_queue {
            while self.shared.phase().is_active() && !self.shared.queue.is_empty() {
                sleep(self.shared.config.drain_poll_interval).await;
            }
        }

        let reason = reason.unwrap_or(REASON_LOCAL);
        self.send_logout(reason).await;

        for task in self.shared.shutdown(reason) {
            if let Err(err) = task.await {
                if err.is_panic() {
                    error!(error = %err, "connection task panicked");
                }
            }
        }
    }

    async fn send_logout(&self, reason: &str) {
        let Some((socket, remote, session_id)) = self.shared.logout_target() else {
            return;
        };
        let envelope = Envelope::new(Logout::new(reason))
            .to(remote)
            .with_session(session_id);
        let mut buf = socket.send_buffer();
        if let Err(err) = envelope.encode_into(socket.mtu(), &mut buf) {
            debug!(error = %err, "logout not sent");
            return;
        }
        match socket.send_to(&buf, remote).await {
            Ok(_) => self.shared.emit(ClientEvent::PacketSent(envelope)),
            Err(err) => debug!(peer = %remote, error = %err, "logout not sent"),
        }
    }

    /// Current phase.
    pub fn phase(&self) -> ConnectionPhase {
        self.shared.phase()
    }

    /// Check if the handshake has completed.
    pub fn is_connected(&self) -> bool {
        self.phase() == ConnectionPhase::Connected
    }

    /// Session id, zero before the handshake completes.
    pub fn session_id(&self) -> u32 {
        self.shared.session_id()
    }

    /// Current remote peer.
    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.shared.remote()
    }

    /// Local socket address while the loops run.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        let link = self.shared.link.lock();
        link.as_ref()
            .and_then(|link| link.socket.local_addr().ok())
    }

    /// Reliable packets awaiting acknowledgment.
    pub fn pending_reliable(&self) -> usize {
        self.shared.queue.len()
    }

    /// Check whether the reliable packet `sequence` is awaiting acknowledgment.
    pub fn is_pending(&self, sequence: u32) -> bool {
        self.shared.queue.contains(sequence)
    }

    /// The engine's packet registry.
    pub fn registry(&self) -> &Arc<PacketRegistry> {
        &self.shared.registry
    }

    /// The engine's configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.shared.config
    }
}

impl Drop for TetherClient {
    fn drop(&mut self) {
        // Loops hold their own reference to the shared state; stop them.
        self.shared.shutdown(REASON_LOCAL);
    }
}

impl std::fmt::Debug for TetherClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TetherClient")
            .field("phase", &self.phase())
            .field("session_id", &self.session_id())
            .field("remote", &self.remote_addr())
            .field("pending_reliable", &self.pending_reliable())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::Ping;

    fn client() -> (TetherClient, ClientEvents) {
        let registry = Arc::new(PacketRegistry::with_system_packets());
        TetherClient::new(ClientConfig::default(), registry).unwrap()
    }

    #[tokio::test]
    async fn test_new_client_is_disconnected() {
        let (client, _events) = client();
        assert_eq!(client.phase(), ConnectionPhase::Disconnected);
        assert_eq!(client.session_id(), 0);
        assert!(client.remote_addr().is_none());
        assert!(client.local_addr().is_none());
        assert_eq!(client.pending_reliable(), 0);
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let registry = Arc::new(PacketRegistry::with_system_packets());
        let config = ClientConfig {
            mtu: 2,
            ..ClientConfig::default()
        };
        let err = TetherClient::new(config, registry).unwrap_err();
        assert!(matches!(err, ClientError::Config(_)));
    }

    #[tokio::test]
    async fn test_send_while_disconnected() {
        let (client, _events) = client();

        let err = client.send(Ping).unwrap_err();
        assert!(matches!(
            err,
            ClientError::InvalidState {
                packet_id: 2,
                phase: ConnectionPhase::Disconnected
            }
        ));

        // Unconnected packets need running loops too.
        assert!(client.send(Login::default()).is_err());
        assert_eq!(client.pending_reliable(), 0);
    }

    #[tokio::test]
    async fn test_disconnect_when_idle_is_silent() {
        let (client, mut events) = client();
        client.disconnect(None, false).await;
        client.disconnect(Some("again"), true).await;
        assert!(events.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_sequences_start_at_one() {
        let (client, _events) = client();
        assert_eq!(client.shared.next_sequence(), 1);
        assert_eq!(client.shared.next_sequence(), 2);

        client.shared.next_sequence.store(u32::MAX, Ordering::Relaxed);
        assert_eq!(client.shared.next_sequence(), u32::MAX);
        assert_eq!(client.shared.next_sequence(), 1);
    }

    #[tokio::test]
    async fn test_listen_then_disconnect() {
        let (client, mut events) = client();
        let local = client.listen("127.0.0.1:0".parse().unwrap()).await.unwrap();
        assert_eq!(client.phase(), ConnectionPhase::Listening);
        assert_eq!(client.local_addr(), Some(local));

        // Second listen is a no-op.
        let again = client.listen("127.0.0.1:0".parse().unwrap()).await.unwrap();
        assert_eq!(again, local);

        client.disconnect(Some("bye"), false).await;
        assert_eq!(client.phase(), ConnectionPhase::Disconnected);
        assert!(client.local_addr().is_none());

        match events.recv().await {
            Some(ClientEvent::Disconnected { reason }) => assert_eq!(reason, "bye"),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_connect_resolve_failure_stays_disconnected() {
        let (client, mut events) = client();
        let err = client
            .connect("host.invalid", 9, Bytes::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Resolve(_)));
        assert_eq!(client.phase(), ConnectionPhase::Disconnected);
        assert!(events.try_recv().is_none());
    }
}
