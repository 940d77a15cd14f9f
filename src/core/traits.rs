//! Core traits for Tether packets.
//!
//! [`Packet`] is what applications implement. Its reliability and connection
//! flags are associated constants, so they are fixed per type and known to
//! the decoder from the identifier alone. [`AnyPacket`] is the object-safe
//! face of the same contract, used wherever packets of mixed types travel
//! together (envelopes, the registry, events).

use std::any::Any;
use std::fmt;

use bytes::BytesMut;

use super::constants::{PACKET_ID_SIZE, SEQUENCE_SIZE, SESSION_ID_SIZE};
use super::error::FrameError;

/// A message type that can be framed, registered, and dispatched by identifier.
///
/// The header (identifier, session id, sequence) is written by the codec. An
/// implementation only encodes and decodes its own payload.
///
/// # Example
///
/// ```
/// use bytes::{BufMut, BytesMut};
/// use tether_protocol::core::{FrameError, Packet};
///
/// #[derive(Debug, Default, PartialEq)]
/// struct Chat {
///     line: u32,
/// }
///
/// impl Packet for Chat {
///     const ID: u8 = 10;
///     const RELIABLE: bool = true;
///     const UNCONNECTED: bool = false;
///
///     fn encode_payload(&self, buf: &mut BytesMut) -> Result<(), FrameError> {
///         buf.put_u32_le(self.line);
///         Ok(())
///     }
///
///     fn decode_payload(&mut self, buf: &mut &[u8]) -> Result<(), FrameError> {
///         self.line = tether_protocol::packet::read_u32(buf)?;
///         Ok(())
///     }
/// }
/// ```
pub trait Packet: fmt::Debug + Default + Send + Sync + 'static {
    /// Wire identifier, unique within a registry.
    const ID: u8;

    /// Tracked by the reliability queue and acknowledged by the peer.
    const RELIABLE: bool;

    /// May be sent and accepted before the connection is established.
    /// Unconnected packets carry no session id.
    const UNCONNECTED: bool;

    /// The header carries a sequence number. Defaults to [`Self::RELIABLE`];
    /// acknowledgments override it to carry the sequence they acknowledge.
    const CARRIES_SEQUENCE: bool = Self::RELIABLE;

    /// Append the variant payload after the header.
    fn encode_payload(&self, buf: &mut BytesMut) -> Result<(), FrameError> {
        let _ = buf;
        Ok(())
    }

    /// Populate `self` from the bytes following the header, advancing `buf`.
    fn decode_payload(&mut self, buf: &mut &[u8]) -> Result<(), FrameError> {
        let _ = buf;
        Ok(())
    }
}

/// Object-safe view of a [`Packet`].
///
/// Implemented for every `Packet` type; do not implement it by hand.
pub trait AnyPacket: fmt::Debug + Send + Sync + 'static {
    /// Wire identifier.
    fn packet_id(&self) -> u8;

    /// See [`Packet::RELIABLE`].
    fn is_reliable(&self) -> bool;

    /// See [`Packet::UNCONNECTED`].
    fn is_unconnected(&self) -> bool;

    /// See [`Packet::CARRIES_SEQUENCE`].
    fn carries_sequence(&self) -> bool;

    /// Encode the payload.
    fn write_payload(&self, buf: &mut BytesMut) -> Result<(), FrameError>;

    /// Decode the payload into `self`.
    fn read_payload(&mut self, buf: &mut &[u8]) -> Result<(), FrameError>;

    /// Upcast for downcasting to the concrete type.
    fn as_any(&self) -> &dyn Any;

    /// Header length implied by the flags.
    fn header_len(&self) -> usize {
        let mut len = PACKET_ID_SIZE;
        if !self.is_unconnected() {
            len += SESSION_ID_SIZE;
        }
        if self.carries_sequence() {
            len += SEQUENCE_SIZE;
        }
        len
    }
}

impl<P: Packet> AnyPacket for P {
    fn packet_id(&self) -> u8 {
        P::ID
    }

    fn is_reliable(&self) -> bool {
        P::RELIABLE
    }

    fn is_unconnected(&self) -> bool {
        P::UNCONNECTED
    }

    fn carries_sequence(&self) -> bool {
        P::CARRIES_SEQUENCE
    }

    fn write_payload(&self, buf: &mut BytesMut) -> Result<(), FrameError> {
        <P as Packet>::encode_payload(self, buf)
    }

    fn read_payload(&mut self, buf: &mut &[u8]) -> Result<(), FrameError> {
        <P as Packet>::decode_payload(self, buf)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl dyn AnyPacket {
    /// Downcast to a concrete packet type.
    pub fn downcast_ref<P: Packet>(&self) -> Option<&P> {
        self.as_any().downcast_ref::<P>()
    }

    /// Check whether this packet is of type `P`.
    pub fn is<P: Packet>(&self) -> bool {
        self.as_any().is::<P>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, PartialEq)]
    struct Probe;

    impl Packet for Probe {
        const ID: u8 = 9;
        const RELIABLE: bool = true;
        const UNCONNECTED: bool = false;
    }

    #[derive(Debug, Default)]
    struct Beacon;

    impl Packet for Beacon {
        const ID: u8 = 10;
        const RELIABLE: bool = false;
        const UNCONNECTED: bool = true;
    }

    #[test]
    fn test_flags_through_trait_object() {
        let probe: Box<dyn AnyPacket> = Box::new(Probe);
        assert_eq!(probe.packet_id(), 9);
        assert!(probe.is_reliable());
        assert!(!probe.is_unconnected());
        assert!(probe.carries_sequence());
        assert_eq!(probe.header_len(), 9);

        let beacon: Box<dyn AnyPacket> = Box::new(Beacon);
        assert!(!beacon.carries_sequence());
        assert_eq!(beacon.header_len(), 1);
    }

    #[test]
    fn test_downcast() {
        let probe: Box<dyn AnyPacket> = Box::new(Probe);
        assert!(probe.is::<Probe>());
        assert!(!probe.is::<Beacon>());
        assert_eq!(probe.downcast_ref::<Probe>(), Some(&Probe));
        assert!(probe.downcast_ref::<Beacon>().is_none());
    }
}
