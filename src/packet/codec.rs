//! Header encoding and decoding for Tether datagrams.
//!
//! Wire format (all integers little-endian):
//! ```text
//! +--------+--------------------+--------------------+-------------------+
//! | Id     | Session ID         | Sequence           | Payload           |
//! | 1 byte | 4 bytes (LE32)     | 4 bytes (LE32)     | variable          |
//! |        | if !unconnected    | if reliable or ack |                   |
//! +--------+--------------------+--------------------+-------------------+
//! ```
//!
//! Which optional fields are present is decided by the packet type, never by
//! the stream, so a decoder needs the registered type before it can parse
//! anything past the identifier.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::core::{AnyPacket, FrameError};

/// Header fields common to every packet.
///
/// Fields absent from the wire for a given packet type decode as zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PacketHeader {
    /// Packet identifier.
    pub packet_id: u8,
    /// Session id (zero for unconnected packets).
    pub session_id: u32,
    /// Sequence number (zero unless the type carries one).
    pub sequence: u32,
}

impl PacketHeader {
    /// Create a header.
    pub fn new(packet_id: u8, session_id: u32, sequence: u32) -> Self {
        Self {
            packet_id,
            session_id,
            sequence,
        }
    }
}

/// Encode `packet` with its header into `buf`, returning the bytes written.
///
/// Fails with [`FrameError::Oversized`] if the result exceeds `mtu`; `buf`
/// is left holding the partial write in that case and should be cleared.
pub fn encode_into(
    packet: &dyn AnyPacket,
    session_id: u32,
    sequence: u32,
    mtu: usize,
    buf: &mut BytesMut,
) -> Result<usize, FrameError> {
    let start = buf.len();

    buf.put_u8(packet.packet_id());
    if !packet.is_unconnected() {
        buf.put_u32_le(session_id);
    }
    if packet.carries_sequence() {
        buf.put_u32_le(sequence);
    }
    packet.write_payload(buf)?;

    let written = buf.len() - start;
    if written > mtu {
        return Err(FrameError::Oversized { size: written, mtu });
    }
    Ok(written)
}

/// Encode `packet` with its header into a fresh buffer.
pub fn encode(
    packet: &dyn AnyPacket,
    session_id: u32,
    sequence: u32,
    mtu: usize,
) -> Result<Bytes, FrameError> {
    let mut buf = BytesMut::with_capacity(packet.header_len());
    encode_into(packet, session_id, sequence, mtu, &mut buf)?;
    Ok(buf.freeze())
}

/// Read the packet identifier without consuming anything.
pub fn peek_id(data: &[u8]) -> Result<u8, FrameError> {
    data.first().copied().ok_or(FrameError::Empty)
}

/// Parse the header for `packet` from the front of `buf`, advancing past it.
///
/// `packet` is only consulted for its flags. The caller has already matched
/// the identifier to the packet type.
pub fn read_header(packet: &dyn AnyPacket, buf: &mut &[u8]) -> Result<PacketHeader, FrameError> {
    let expected = packet.header_len();
    if buf.len() < expected {
        return Err(FrameError::TooShort {
            expected,
            actual: buf.len(),
        });
    }

    let mut header = PacketHeader {
        packet_id: buf.get_u8(),
        ..PacketHeader::default()
    };
    if !packet.is_unconnected() {
        header.session_id = buf.get_u32_le();
    }
    if packet.carries_sequence() {
        header.sequence = buf.get_u32_le();
    }
    Ok(header)
}

/// Read a little-endian `u32` payload field.
pub fn read_u32(buf: &mut &[u8]) -> Result<u32, FrameError> {
    ensure_remaining(buf, 4)?;
    Ok(buf.get_u32_le())
}

/// Read a `u8` payload field.
pub fn read_u8(buf: &mut &[u8]) -> Result<u8, FrameError> {
    ensure_remaining(buf, 1)?;
    Ok(buf.get_u8())
}

/// Read `len` raw bytes.
pub fn read_bytes(buf: &mut &[u8], len: usize) -> Result<Bytes, FrameError> {
    ensure_remaining(buf, len)?;
    Ok(buf.copy_to_bytes(len))
}

/// Write a `u32` length prefix followed by the UTF-8 bytes of `value`.
pub fn write_string(buf: &mut BytesMut, value: &str) -> Result<(), FrameError> {
    let len = u32::try_from(value.len()).map_err(|_| FrameError::LengthOverflow)?;
    buf.put_u32_le(len);
    buf.put_slice(value.as_bytes());
    Ok(())
}

/// Read a `u32` length-prefixed UTF-8 string.
pub fn read_string(buf: &mut &[u8]) -> Result<String, FrameError> {
    let len = read_u32(buf)? as usize;
    ensure_remaining(buf, len)?;
    let data: &[u8] = *buf;
    let (text, rest) = data.split_at(len);
    let value = std::str::from_utf8(text)
        .map_err(|_| FrameError::InvalidUtf8)?
        .to_owned();
    *buf = rest;
    Ok(value)
}

fn ensure_remaining(buf: &[u8], needed: usize) -> Result<(), FrameError> {
    if buf.len() < needed {
        return Err(FrameError::TooShort {
            expected: needed,
            actual: buf.len(),
        });
    }
    Ok(())
}
