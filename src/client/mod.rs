//! Tether Protocol - Connection engine
//!
//! [`TetherClient`] drives one connection: it owns the socket, the state
//! machine and the reliability queue, and reports progress as
//! [`ClientEvent`]s.

#[allow(clippy::module_inception)]
mod client;
mod config;
mod event;
mod resolve;
mod worker;

pub use client::{ClientError, TetherClient};
pub use config::*;
pub use event::*;
pub use resolve::resolve_host;
