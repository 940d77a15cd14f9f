//! Per-packet delivery metadata.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use tokio::time::Instant;

use crate::core::{AnyPacket, FrameError, Packet};
use crate::packet::{DecodedPacket, encode_into};

/// One packet plus its addressing, header values, and retransmission state.
///
/// Outbound envelopes without an address go to the connection's current
/// remote. Inbound envelopes carry the sender's address.
#[derive(Debug, Clone)]
pub struct Envelope {
    /// The packet. Shared so events can carry it without copying.
    pub packet: Arc<dyn AnyPacket>,
    /// Destination (outbound) or source (inbound).
    pub addr: Option<SocketAddr>,
    /// Session id written in the header.
    pub session_id: u32,
    /// Sequence written in the header, for types that carry one.
    pub sequence: u32,
    /// When the envelope was last put on the wire. Set at creation and
    /// restamped by the sender on the first send and each resend.
    pub sent_at: Instant,
    /// Retransmissions so far.
    pub retries: u32,
}

impl Envelope {
    /// Wrap a packet.
    pub fn new<P: Packet>(packet: P) -> Self {
        Self::from_arc(Arc::new(packet))
    }

    /// Wrap an already shared packet.
    pub fn from_arc(packet: Arc<dyn AnyPacket>) -> Self {
        Self {
            packet,
            addr: None,
            session_id: 0,
            sequence: 0,
            sent_at: Instant::now(),
            retries: 0,
        }
    }

    /// Wrap a decoded inbound datagram.
    pub fn from_decoded(decoded: DecodedPacket, source: SocketAddr) -> Self {
        Self {
            packet: Arc::from(decoded.packet),
            addr: Some(source),
            session_id: decoded.header.session_id,
            sequence: decoded.header.sequence,
            sent_at: Instant::now(),
            retries: 0,
        }
    }

    /// Set the destination.
    pub fn to(mut self, addr: SocketAddr) -> Self {
        self.addr = Some(addr);
        self
    }

    /// Set the header sequence.
    pub fn with_sequence(mut self, sequence: u32) -> Self {
        self.sequence = sequence;
        self
    }

    /// Set the header session id.
    pub fn with_session(mut self, session_id: u32) -> Self {
        self.session_id = session_id;
        self
    }

    /// Packet identifier.
    pub fn packet_id(&self) -> u8 {
        self.packet.packet_id()
    }

    /// Whether the packet is tracked for acknowledgment.
    pub fn is_reliable(&self) -> bool {
        self.packet.is_reliable()
    }

    /// Whether the packet may travel before the connection is established.
    pub fn is_unconnected(&self) -> bool {
        self.packet.is_unconnected()
    }

    /// Downcast the packet to a concrete type.
    pub fn downcast_ref<P: Packet>(&self) -> Option<&P> {
        self.packet.downcast_ref::<P>()
    }

    /// Whether the packet has gone unacknowledged for longer than `interval`.
    pub fn is_due(&self, now: Instant, interval: Duration) -> bool {
        now.saturating_duration_since(self.sent_at) > interval
    }

    /// Record a retransmission. The session id is refreshed because the
    /// first send may have gone out before the handshake assigned one.
    pub fn mark_resent(&mut self, now: Instant, session_id: u32) {
        self.sent_at = now;
        self.retries += 1;
        self.session_id = session_id;
    }

    /// Encode header and payload into `buf`.
    pub fn encode_into(&self, mtu: usize, buf: &mut BytesMut) -> Result<usize, FrameError> {
        encode_into(
            self.packet.as_ref(),
            self.session_id,
            self.sequence,
            mtu,
            buf,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::MAX_MTU;
    use crate::packet::{Ack, Login, PacketRegistry, Ping};

    #[test]
    fn test_envelope_defaults() {
        let envelope = Envelope::new(Ping);
        assert_eq!(envelope.packet_id(), 2);
        assert!(envelope.addr.is_none());
        assert_eq!(envelope.retries, 0);
        assert!(!envelope.is_reliable());
        assert!(!envelope.is_unconnected());
    }

    #[tokio::test]
    async fn test_is_due() {
        let envelope = Envelope::new(Login::default());
        let interval = Duration::from_millis(500);
        assert!(!envelope.is_due(envelope.sent_at, interval));
        assert!(!envelope.is_due(envelope.sent_at + interval, interval));
        assert!(envelope.is_due(envelope.sent_at + interval + Duration::from_millis(1), interval));
    }

    #[tokio::test]
    async fn test_mark_resent_repairs_session() {
        let mut envelope = Envelope::new(Login::default()).with_sequence(4);
        let later = envelope.sent_at + Duration::from_millis(600);

        envelope.mark_resent(later, 0xBEEF);
        assert_eq!(envelope.retries, 1);
        assert_eq!(envelope.sent_at, later);
        assert_eq!(envelope.session_id, 0xBEEF);
        assert_eq!(envelope.sequence, 4);
    }

    #[tokio::test]
    async fn test_encode_decode_envelope() {
        let registry = PacketRegistry::with_system_packets();
        let source: SocketAddr = "10.0.0.1:5000".parse().unwrap();

        let envelope = Envelope::new(Ack).with_session(7).with_sequence(99);
        let mut buf = BytesMut::new();
        let written = envelope.encode_into(MAX_MTU, &mut buf).unwrap();
        assert_eq!(written, 9);

        let decoded = Envelope::from_decoded(registry.decode(&buf).unwrap(), source);
        assert_eq!(decoded.addr, Some(source));
        assert_eq!(decoded.session_id, 7);
        assert_eq!(decoded.sequence, 99);
        assert!(decoded.downcast_ref::<Ack>().is_some());
    }
}
