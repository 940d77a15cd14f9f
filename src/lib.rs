//! # Tether Protocol
//!
//! A thin reliability and dispatch layer over UDP datagrams. It provides:
//!
//! - **Framing**: a compact header (identifier, session id, sequence) in front
//!   of each packet's own payload
//! - **Dispatch**: a registry mapping identifiers to packet types, so raw
//!   datagrams decode into concrete Rust values
//! - **Reliability**: at-least-once delivery for packets that ask for it, with
//!   acknowledgments, timed retransmission and a retry limit
//! - **Lifecycle**: a Login/Ack handshake, liveness timeout, and events for
//!   everything that happens on the connection
//!
//! Congestion control, flow control, stream multiplexing, encryption and NAT
//! traversal are out of scope.
//!
//! ## Feature Flags
//!
//! - `transport` (default): sockets, envelopes, endpoint cache, reliability queue
//! - `client` (default): the connection engine
//!
//! ## Modules
//!
//! - [`core`]: Packet traits, constants, and error types (always included)
//! - [`packet`]: Codec, system packets and the registry (always included)
//! - [`transport`]: Transport layer (requires `transport` feature)
//! - [`client`]: Connection engine (requires `client` feature)
//!
//! ## Example Usage
//!
//! ```rust
//! use bytes::{BufMut, BytesMut};
//! use tether_protocol::prelude::*;
//!
//! // Define an application packet
//! #[derive(Debug, Default, PartialEq)]
//! struct Move {
//!     x: u32,
//!     y: u32,
//! }
//!
//! impl Packet for Move {
//!     const ID: u8 = FIRST_USER_PACKET_ID;
//!     const RELIABLE: bool = true;
//!     const UNCONNECTED: bool = false;
//!
//!     fn encode_payload(&self, buf: &mut BytesMut) -> Result<(), FrameError> {
//!         buf.put_u32_le(self.x);
//!         buf.put_u32_le(self.y);
//!         Ok(())
//!     }
//!
//!     fn decode_payload(&mut self, buf: &mut &[u8]) -> Result<(), FrameError> {
//!         self.x = read_u32(buf)?;
//!         self.y = read_u32(buf)?;
//!         Ok(())
//!     }
//! }
//!
//! let registry = PacketRegistry::with_system_packets();
//! registry.add::<Move>();
//!
//! let wire = encode(&Move { x: 3, y: 4 }, 0xAB, 1, MAX_MTU).unwrap();
//! let decoded = registry.decode(&wire).unwrap();
//! assert_eq!(decoded.header.sequence, 1);
//! assert_eq!(decoded.packet.downcast_ref::<Move>(), Some(&Move { x: 3, y: 4 }));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// Core module (always included)
pub mod core;

// Packet layer (always included)
pub mod packet;

// Transport layer (feature-gated)
#[cfg(feature = "transport")]
#[cfg_attr(docsrs, doc(cfg(feature = "transport")))]
pub mod transport;

// Connection engine (feature-gated)
#[cfg(feature = "client")]
#[cfg_attr(docsrs, doc(cfg(feature = "client")))]
pub mod client;

/// Prelude module for convenient imports.
pub mod prelude {
    // Core traits and types
    pub use crate::core::*;

    // Packet layer
    pub use crate::packet::{
        Ack, DecodedPacket, Login, Logout, PacketHeader, PacketRegistry, Ping, encode, read_u32,
        read_u8, read_string, write_string,
    };

    // Transport types (when enabled)
    #[cfg(feature = "transport")]
    pub use crate::transport::{
        ConnectionPhase, Endpoint, EndpointCache, Envelope, ReliabilityQueue, TetherSocket,
        TransportError, TransportResult,
    };

    // Connection engine (when enabled)
    #[cfg(feature = "client")]
    pub use crate::client::{
        ClientConfig, ClientConfigBuilder, ClientError, ClientEvent, ClientEvents,
        DeliveryFailurePolicy, LogoutPolicy, TetherClient,
    };
}

// Re-export commonly used items at crate root
pub use core::{AnyPacket, FrameError, Packet, RegistryError, TetherError};
pub use packet::PacketRegistry;

#[cfg(feature = "client")]
pub use client::{ClientConfig, ClientError, ClientEvent, TetherClient};
