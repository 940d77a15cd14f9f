//! Protocol constants for the Tether wire format and engine defaults.
//!
//! Identifiers and field sizes are fixed by the wire format and MUST NOT be
//! changed. The timing defaults can be overridden through the client config.

use std::time::Duration;

// =============================================================================
// SYSTEM PACKET IDENTIFIERS
// =============================================================================

/// Login (handshake request). Reliable, unconnected.
pub const PACKET_ID_LOGIN: u8 = 0;

/// Logout (advisory close notice). Unreliable, connected-only.
pub const PACKET_ID_LOGOUT: u8 = 1;

/// Ping (liveness probe). Unreliable, connected-only.
pub const PACKET_ID_PING: u8 = 2;

/// Ack (acknowledges a reliable sequence). Unreliable, connected-only.
pub const PACKET_ID_ACK: u8 = 3;

/// First identifier free for application packets.
pub const FIRST_USER_PACKET_ID: u8 = 4;

// =============================================================================
// HEADER SIZES
// =============================================================================

/// Packet identifier size.
pub const PACKET_ID_SIZE: usize = 1;

/// Session id size (LE32).
pub const SESSION_ID_SIZE: usize = 4;

/// Sequence number size (LE32).
pub const SEQUENCE_SIZE: usize = 4;

/// Largest possible header (id + session id + sequence).
pub const MAX_HEADER_SIZE: usize = PACKET_ID_SIZE + SESSION_ID_SIZE + SEQUENCE_SIZE;

/// Logout reason length prefix size (LE32).
pub const REASON_LENGTH_SIZE: usize = 4;

// =============================================================================
// MTU
// =============================================================================

/// Largest UDP payload over IPv4 (65535 - 8 byte UDP header - 20 byte IP header).
pub const MAX_MTU: usize = 65507;

/// Default MTU ceiling for send and receive buffers.
pub const DEFAULT_MTU: usize = MAX_MTU;

// =============================================================================
// TIMING DEFAULTS
// =============================================================================

/// Resend a reliable packet when unacknowledged for this long.
pub const DEFAULT_RESEND_INTERVAL: Duration = Duration::from_millis(500);

/// Retransmissions before a reliable packet is abandoned.
pub const DEFAULT_MAX_RETRIES: u32 = 20;

/// Disconnect when nothing has been received for this long.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(8000);

/// Sender loop yield between iterations when idle.
pub const DEFAULT_SEND_TICK: Duration = Duration::from_millis(1);

/// Poll period while `disconnect` waits for the reliability queue to drain.
pub const DEFAULT_DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

// =============================================================================
// ENDPOINT CACHE
// =============================================================================

/// Endpoint cache size before eviction kicks in.
pub const DEFAULT_ENDPOINT_CACHE_CAPACITY: usize = 1024;

/// Cached endpoints idle for this long are eligible for eviction.
pub const DEFAULT_ENDPOINT_IDLE_TIMEOUT: Duration = Duration::from_secs(300);

// =============================================================================
// DISCONNECT REASONS
// =============================================================================

/// Reason reported when the liveness timeout fires.
pub const REASON_TIMEOUT: &str = "Timeout!";

/// Reason reported by a plain `disconnect` with no explicit reason.
pub const REASON_LOCAL: &str = "Disconnected";
