//! Packet registry: identifier to packet type mapping and decode dispatch.

use std::fmt;

use dashmap::DashMap;

use super::codec::{PacketHeader, peek_id, read_header};
use super::system::{Ack, Login, Logout, Ping};
use crate::core::{AnyPacket, FrameError, Packet, RegistryError};

/// Creates a default instance of a registered packet type.
pub type PacketConstructor = fn() -> Box<dyn AnyPacket>;

fn construct<P: Packet>() -> Box<dyn AnyPacket> {
    Box::new(P::default())
}

/// A registered packet type.
#[derive(Clone, Copy)]
pub struct RegisteredPacket {
    /// Identifier the type is registered under.
    pub id: u8,
    /// Rust type name, for diagnostics.
    pub type_name: &'static str,
    constructor: PacketConstructor,
}

impl RegisteredPacket {
    /// Create a default instance of the registered type.
    pub fn instantiate(&self) -> Box<dyn AnyPacket> {
        (self.constructor)()
    }
}

impl fmt::Debug for RegisteredPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredPacket")
            .field("id", &self.id)
            .field("type_name", &self.type_name)
            .finish()
    }
}

/// A datagram decoded into its header and concrete packet.
#[derive(Debug)]
pub struct DecodedPacket {
    /// Header fields.
    pub header: PacketHeader,
    /// The populated packet.
    pub packet: Box<dyn AnyPacket>,
}

/// Identifier to packet type table.
///
/// Safe to share between the receiver loop and setup code. Registration is
/// expected before traffic starts, but concurrent registration while decoding
/// is allowed.
#[derive(Debug, Default)]
pub struct PacketRegistry {
    entries: DashMap<u8, RegisteredPacket>,
}

impl PacketRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with Login, Logout, Ping and Ack registered.
    pub fn with_system_packets() -> Self {
        let registry = Self::new();
        registry.add::<Login>();
        registry.add::<Logout>();
        registry.add::<Ping>();
        registry.add::<Ack>();
        registry
    }

    /// Register `P` under `id`, returning whatever was there before.
    ///
    /// Last registration wins. `id` must equal `P::ID`, since the packet type
    /// writes its own identifier when encoded.
    pub fn register<P: Packet>(&self, id: u8) -> Result<Option<RegisteredPacket>, RegistryError> {
        if id != P::ID {
            return Err(RegistryError::IdMismatch {
                slot: id,
                intrinsic: P::ID,
            });
        }
        Ok(self.add::<P>())
    }

    /// Register `P` under its own identifier.
    pub fn add<P: Packet>(&self) -> Option<RegisteredPacket> {
        let entry = RegisteredPacket {
            id: P::ID,
            type_name: std::any::type_name::<P>(),
            constructor: construct::<P>,
        };
        self.entries.insert(P::ID, entry)
    }

    /// Remove the type registered under `id`.
    pub fn deregister(&self, id: u8) -> Option<RegisteredPacket> {
        self.entries.remove(&id).map(|(_, entry)| entry)
    }

    /// Remove every registration.
    pub fn deregister_all(&self) {
        self.entries.clear();
    }

    /// Look up the type registered under `id`.
    pub fn get(&self, id: u8) -> Option<RegisteredPacket> {
        self.entries.get(&id).map(|entry| *entry)
    }

    /// Check whether `id` is registered.
    pub fn contains(&self, id: u8) -> bool {
        self.entries.contains_key(&id)
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Decode a datagram into its registered packet type.
    ///
    /// Reads the identifier, instantiates the registered type, then parses the
    /// header and payload according to that type's flags.
    pub fn decode(&self, data: &[u8]) -> Result<DecodedPacket, FrameError> {
        let id = peek_id(data)?;
        let entry = self.get(id).ok_or(FrameError::UnknownPacketId(id))?;

        let mut packet = entry.instantiate();
        let mut cursor = data;
        let header = read_header(packet.as_ref(), &mut cursor)?;
        packet.read_payload(&mut cursor)?;

        Ok(DecodedPacket { header, packet })
    }
}
