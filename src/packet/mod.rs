//! Tether Protocol - Packet layer
//!
//! - **Codec**: header layout and payload field helpers
//! - **System packets**: [`Login`], [`Logout`], [`Ping`], [`Ack`]
//! - **Registry**: [`PacketRegistry`] maps identifiers to packet types and
//!   decodes raw datagrams into them

mod codec;
mod registry;
mod system;

pub use codec::*;
pub use registry::*;
pub use system::*;
