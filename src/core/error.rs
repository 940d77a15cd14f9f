//! Error types for the Tether protocol.

use thiserror::Error;

/// Errors raised while encoding or decoding a datagram.
///
/// These are framing errors: the offending datagram is dropped and the
/// connection carries on.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Datagram shorter than the bytes required to parse it.
    #[error("datagram too short: expected {expected} bytes, got {actual}")]
    TooShort {
        /// Bytes required.
        expected: usize,
        /// Bytes available.
        actual: usize,
    },

    /// Empty datagram (no identifier byte).
    #[error("empty datagram")]
    Empty,

    /// No packet type registered for this identifier.
    #[error("unknown packet identifier {0}")]
    UnknownPacketId(u8),

    /// A string field was not valid UTF-8.
    #[error("invalid utf-8 in string field")]
    InvalidUtf8,

    /// Encoded packet exceeds the MTU ceiling.
    #[error("encoded packet is {size} bytes, exceeds mtu of {mtu}")]
    Oversized {
        /// Encoded size.
        size: usize,
        /// Configured MTU ceiling.
        mtu: usize,
    },

    /// A length field does not fit its wire width.
    #[error("length field overflow")]
    LengthOverflow,
}

/// Errors raised by the packet registry.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// A packet type was registered under an identifier other than its own.
    #[error("packet type with identifier {intrinsic} cannot be registered under {slot}")]
    IdMismatch {
        /// Identifier the registration targeted.
        slot: u8,
        /// Identifier the packet type writes on the wire.
        intrinsic: u8,
    },
}

/// Top-level Tether errors.
#[derive(Debug, Error)]
pub enum TetherError {
    /// Framing error.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// Registry error.
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_error_display() {
        let err = FrameError::TooShort {
            expected: 9,
            actual: 3,
        };
        assert_eq!(err.to_string(), "datagram too short: expected 9 bytes, got 3");
        assert_eq!(
            FrameError::UnknownPacketId(42).to_string(),
            "unknown packet identifier 42"
        );
    }

    #[test]
    fn test_tether_error_from() {
        let err: TetherError = FrameError::InvalidUtf8.into();
        assert!(matches!(err, TetherError::Frame(FrameError::InvalidUtf8)));

        let err: TetherError = RegistryError::IdMismatch {
            slot: 7,
            intrinsic: 5,
        }
        .into();
        assert!(err.to_string().contains("registered under 7"));
    }
}
