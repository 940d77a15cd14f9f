//! Connection state management for Tether transport layer.
//!
//! [`ConnectionState`] is plain data guarded by the engine. Every transition
//! takes an explicit clock reading so the state machine can be driven in
//! tests without sleeping.

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::time::Instant;

use crate::core::PACKET_ID_ACK;

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionPhase {
    /// No loops running. Initial state, and terminal until the next connect.
    Disconnected,
    /// Loops running on a bound address, waiting for a peer's Login.
    Listening,
    /// Login sent, waiting for its Ack.
    Connecting,
    /// Handshake complete.
    Connected,
}

impl ConnectionPhase {
    /// Check if the engine's loops are running in this phase.
    pub fn is_active(self) -> bool {
        self != ConnectionPhase::Disconnected
    }
}

impl fmt::Display for ConnectionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionPhase::Disconnected => "disconnected",
            ConnectionPhase::Listening => "listening",
            ConnectionPhase::Connecting => "connecting",
            ConnectionPhase::Connected => "connected",
        };
        f.write_str(name)
    }
}

/// State of one connection.
#[derive(Debug, Clone)]
pub struct ConnectionState {
    /// Current connection phase.
    pub phase: ConnectionPhase,
    /// Session id. Zero until a handshake assigns one.
    pub session_id: u32,
    /// Remote peer. `None` while disconnected or listening.
    pub remote: Option<SocketAddr>,
    /// When we last received any datagram.
    pub last_activity: Instant,
    /// When we last put any datagram on the wire.
    pub last_sent: Instant,
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionState {
    /// Create a disconnected connection state.
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            phase: ConnectionPhase::Disconnected,
            session_id: 0,
            remote: None,
            last_activity: now,
            last_sent: now,
        }
    }

    /// Enter `Connecting` towards `remote`.
    ///
    /// Returns `false`, changing nothing, unless currently disconnected.
    pub fn begin_connect(&mut self, remote: SocketAddr, now: Instant) -> bool {
        if self.phase != ConnectionPhase::Disconnected {
            return false;
        }
        self.phase = ConnectionPhase::Connecting;
        self.session_id = 0;
        self.remote = Some(remote);
        self.last_activity = now;
        self.last_sent = now;
        true
    }

    /// Enter `Listening`.
    ///
    /// Returns `false`, changing nothing, unless currently disconnected.
    pub fn begin_listen(&mut self, now: Instant) -> bool {
        if self.phase != ConnectionPhase::Disconnected {
            return false;
        }
        self.phase = ConnectionPhase::Listening;
        self.session_id = 0;
        self.remote = None;
        self.last_activity = now;
        self.last_sent = now;
        true
    }

    /// Accept a peer's Login and become `Connected`.
    ///
    /// A listening engine adopts `peer` as its remote. An existing session id
    /// is kept, otherwise `session_id` is assigned. Returns `false` if already
    /// connected or if `peer` is not the adopted remote.
    pub fn accept(&mut self, peer: SocketAddr, session_id: u32, now: Instant) -> bool {
        if !self.phase.is_active() || self.phase == ConnectionPhase::Connected {
            return false;
        }
        if self.remote.is_some_and(|remote| remote != peer) {
            return false;
        }
        if self.remote.is_none() {
            self.remote = Some(peer);
        }
        if self.session_id == 0 {
            self.session_id = session_id;
        }
        self.phase = ConnectionPhase::Connected;
        self.last_activity = now;
        true
    }

    /// Complete our own handshake with the session id the peer assigned.
    ///
    /// Returns `false` unless currently connecting.
    pub fn complete_handshake(&mut self, session_id: u32, now: Instant) -> bool {
        if self.phase != ConnectionPhase::Connecting {
            return false;
        }
        self.session_id = session_id;
        self.phase = ConnectionPhase::Connected;
        self.last_activity = now;
        true
    }

    /// Whether `addr` is the adopted remote.
    pub fn is_remote(&self, addr: SocketAddr) -> bool {
        self.remote == Some(addr)
    }

    /// Record an inbound datagram.
    pub fn on_activity(&mut self, now: Instant) {
        self.last_activity = now;
    }

    /// Record an outbound datagram.
    pub fn on_sent(&mut self, now: Instant) {
        self.last_sent = now;
    }

    /// Check if nothing has been received for longer than `timeout`.
    ///
    /// Only connecting and connected states time out.
    pub fn is_timed_out(&self, now: Instant, timeout: Duration) -> bool {
        matches!(
            self.phase,
            ConnectionPhase::Connecting | ConnectionPhase::Connected
        ) && now.saturating_duration_since(self.last_activity) > timeout
    }

    /// Check if a keepalive is due: connected and nothing sent for `interval`.
    pub fn needs_keepalive(&self, now: Instant, interval: Duration) -> bool {
        self.phase == ConnectionPhase::Connected
            && now.saturating_duration_since(self.last_sent) >= interval
    }

    /// Check if a packet may be sent in the current phase.
    pub fn can_send(&self, unconnected: bool) -> bool {
        match self.phase {
            ConnectionPhase::Disconnected => false,
            ConnectionPhase::Connected => true,
            ConnectionPhase::Listening | ConnectionPhase::Connecting => unconnected,
        }
    }

    /// Check if an inbound packet should be processed in the current phase.
    ///
    /// Acks are always processed so the initiator can complete its handshake.
    pub fn accepts(&self, packet_id: u8, unconnected: bool) -> bool {
        unconnected || packet_id == PACKET_ID_ACK || self.phase == ConnectionPhase::Connected
    }

    /// Return to `Disconnected`, forgetting the session and remote.
    ///
    /// Returns `false` if already disconnected.
    pub fn reset(&mut self) -> bool {
        if self.phase == ConnectionPhase::Disconnected {
            return false;
        }
        self.phase = ConnectionPhase::Disconnected;
        self.session_id = 0;
        self.remote = None;
        true
    }
}
