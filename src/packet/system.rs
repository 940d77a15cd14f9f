//! Built-in control packets (identifiers 0-3).

use bytes::{BufMut, Bytes, BytesMut};

use super::codec::{read_string, write_string};
use crate::core::{
    FrameError, PACKET_ID_ACK, PACKET_ID_LOGIN, PACKET_ID_LOGOUT, PACKET_ID_PING, Packet,
};

/// Handshake request.
///
/// Reliable and unconnected: it is sent before a session exists and is
/// retransmitted until the peer acknowledges it. The metadata is opaque to
/// the transport and consumes the rest of the datagram.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Login {
    /// Application-defined handshake metadata.
    pub metadata: Bytes,
}

impl Login {
    /// Create a login carrying `metadata`.
    pub fn new(metadata: impl Into<Bytes>) -> Self {
        Self {
            metadata: metadata.into(),
        }
    }
}

impl Packet for Login {
    const ID: u8 = PACKET_ID_LOGIN;
    const RELIABLE: bool = true;
    const UNCONNECTED: bool = true;

    fn encode_payload(&self, buf: &mut BytesMut) -> Result<(), FrameError> {
        buf.put_slice(&self.metadata);
        Ok(())
    }

    fn decode_payload(&mut self, buf: &mut &[u8]) -> Result<(), FrameError> {
        self.metadata = Bytes::copy_from_slice(buf);
        *buf = &[];
        Ok(())
    }
}

/// Close notice with a human-readable reason.
///
/// Payload: `[reason_len:4 LE][reason:utf8]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Logout {
    /// Why the peer is leaving.
    pub reason: String,
}

impl Logout {
    /// Create a logout with `reason`.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl Packet for Logout {
    const ID: u8 = PACKET_ID_LOGOUT;
    const RELIABLE: bool = false;
    const UNCONNECTED: bool = false;

    fn encode_payload(&self, buf: &mut BytesMut) -> Result<(), FrameError> {
        write_string(buf, &self.reason)
    }

    fn decode_payload(&mut self, buf: &mut &[u8]) -> Result<(), FrameError> {
        self.reason = read_string(buf)?;
        Ok(())
    }
}

/// Liveness probe. Header only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Ping;

impl Packet for Ping {
    const ID: u8 = PACKET_ID_PING;
    const RELIABLE: bool = false;
    const UNCONNECTED: bool = false;
}

/// Acknowledgment of a reliable packet.
///
/// Not itself reliable. The acknowledged sequence travels in the header's
/// sequence slot, so the packet has no payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Ack;

impl Packet for Ack {
    const ID: u8 = PACKET_ID_ACK;
    const RELIABLE: bool = false;
    const UNCONNECTED: bool = false;
    const CARRIES_SEQUENCE: bool = true;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{AnyPacket, MAX_MTU};
    use crate::packet::codec::{encode, read_header};

    #[test]
    fn test_system_flags() {
        let login: &dyn AnyPacket = &Login::default();
        assert!(login.is_reliable() && login.is_unconnected());
        assert_eq!(login.header_len(), 5);

        let logout: &dyn AnyPacket = &Logout::default();
        assert!(!logout.is_reliable() && !logout.is_unconnected());
        assert_eq!(logout.header_len(), 5);

        let ping: &dyn AnyPacket = &Ping;
        assert_eq!(ping.header_len(), 5);

        let ack: &dyn AnyPacket = &Ack;
        assert!(!ack.is_reliable());
        assert!(ack.carries_sequence());
        assert_eq!(ack.header_len(), 9);
    }

    #[test]
    fn test_login_wire() {
        let login = Login::new(&b"hi"[..]);
        let bytes = encode(&login, 77, 5, MAX_MTU).unwrap();
        // No session id: [id][seq:4][metadata]
        assert_eq!(hex::encode(&bytes), "00050000006869");

        let mut cursor = &bytes[..];
        let header = read_header(&Login::default(), &mut cursor).unwrap();
        assert_eq!(header.session_id, 0);
        assert_eq!(header.sequence, 5);

        let mut decoded = Login::default();
        decoded.decode_payload(&mut cursor).unwrap();
        assert_eq!(decoded, login);
        assert!(cursor.is_empty());
    }

    #[test]
    fn test_login_empty_metadata() {
        let bytes = encode(&Login::default(), 0, 1, MAX_MTU).unwrap();
        let mut cursor = &bytes[5..];
        let mut decoded = Login::new(&b"stale"[..]);
        decoded.decode_payload(&mut cursor).unwrap();
        assert!(decoded.metadata.is_empty());
    }

    #[test]
    fn test_logout_wire() {
        let logout = Logout::new("bye");
        let bytes = encode(&logout, 0x01020304, 0, MAX_MTU).unwrap();
        assert_eq!(hex::encode(&bytes), "010403020103000000627965");

        let mut cursor = &bytes[5..];
        let mut decoded = Logout::default();
        decoded.decode_payload(&mut cursor).unwrap();
        assert_eq!(decoded.reason, "bye");
    }

    #[test]
    fn test_logout_truncated_reason() {
        let mut cursor: &[u8] = &[9, 0, 0, 0, b'x'];
        let mut decoded = Logout::default();
        assert!(matches!(
            decoded.decode_payload(&mut cursor),
            Err(FrameError::TooShort { .. })
        ));
    }

    #[test]
    fn test_ack_carries_sequence_in_header() {
        let bytes = encode(&Ack, 9, 0xDEADBEEF, MAX_MTU).unwrap();
        assert_eq!(hex::encode(&bytes), "0309000000efbeadde");
    }

    #[test]
    fn test_ping_header_only() {
        let bytes = encode(&Ping, 1, 1, MAX_MTU).unwrap();
        assert_eq!(&bytes[..], &[2, 1, 0, 0, 0]);
    }
}
