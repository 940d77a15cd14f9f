//! Lifecycle and packet notifications raised by the engine.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::transport::{Endpoint, Envelope};

/// Notification from the connection engine.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// Handshake complete.
    Connected {
        /// Session id in use.
        session_id: u32,
    },
    /// Connection ended. Raised once per connect or listen.
    Disconnected {
        /// Why.
        reason: String,
    },
    /// A packet was put on the wire (first send or retransmission).
    PacketSent(Envelope),
    /// A packet arrived and passed the phase check.
    PacketReceived {
        /// The decoded packet with its source address.
        envelope: Envelope,
        /// Cached handle for the sender.
        endpoint: Arc<Endpoint>,
    },
    /// A reliable packet was acknowledged.
    PacketAcknowledged(Envelope),
    /// A reliable packet was abandoned after its retries ran out.
    DeliveryFailed(Envelope),
}

/// Receiving half of the engine's event stream.
///
/// Events are buffered without bound, so a slow consumer never stalls the
/// sender or receiver loop.
#[derive(Debug)]
pub struct ClientEvents {
    rx: mpsc::UnboundedReceiver<ClientEvent>,
}

impl ClientEvents {
    pub(crate) fn new(rx: mpsc::UnboundedReceiver<ClientEvent>) -> Self {
        Self { rx }
    }

    /// Receive the next event.
    ///
    /// Returns `None` once the engine has been dropped.
    pub async fn recv(&mut self) -> Option<ClientEvent> {
        self.rx.recv().await
    }

    /// Take an already buffered event without waiting.
    pub fn try_recv(&mut self) -> Option<ClientEvent> {
        self.rx.try_recv().ok()
    }
}
