//! Tether Protocol - Transport Layer
//!
//! This module provides the pieces the connection engine is assembled from:
//!
//! - **Async sockets**: [`TetherSocket`] wrapper for tokio UDP
//! - **Envelopes**: [`Envelope`] pairs a packet with addressing and retry state
//! - **Endpoint cache**: [`EndpointCache`] resolves peer addresses to shared handles
//! - **Reliability queue**: [`ReliabilityQueue`] tracks reliable packets until acked
//! - **Connection state machine**: [`ConnectionState`] with lifecycle management
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │          Connection Engine              │
//! ├─────────────────────────────────────────┤
//! │         Transport Layer                 │  ← This module
//! │  envelopes, acks, endpoints, state      │
//! ├─────────────────────────────────────────┤
//! │      Packet Layer (codec, registry)     │
//! ├─────────────────────────────────────────┤
//! │              UDP                        │
//! └─────────────────────────────────────────┘
//! ```

mod connection;
mod endpoint;
mod envelope;
mod error;
mod reliability;
mod socket;

pub use connection::*;
pub use endpoint::*;
pub use envelope::*;
pub use error::*;
pub use reliability::*;
pub use socket::*;
