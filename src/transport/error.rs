//! Transport layer error types.
//!
//! Errors fall into two camps: those that drop one datagram or envelope and
//! let the connection carry on, and those that end the connection.

use std::io;

use thiserror::Error;

use crate::core::FrameError;

/// Transport layer errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Malformed datagram or unencodable packet.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// Socket failure on send or receive.
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    /// Nothing received within the configured timeout.
    #[error("connection timeout")]
    ConnectionTimeout,

    /// A reliable packet exhausted its retries without an acknowledgment.
    #[error("delivery failed for sequence {sequence} after {retries} retries")]
    DeliveryFailed {
        /// Sequence of the abandoned packet.
        sequence: u32,
        /// Retransmissions performed.
        retries: u32,
    },

    /// Envelope has no destination and the connection has no remote yet.
    #[error("no destination address")]
    NoRemote,
}

impl TransportError {
    /// Check if this error only drops the offending datagram or envelope.
    pub fn is_silent_drop(&self) -> bool {
        matches!(self, TransportError::Frame(_) | TransportError::NoRemote)
    }

    /// Check if this error is fatal to the connection.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            TransportError::Io(_) | TransportError::ConnectionTimeout
        )
    }
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silent_drop_errors() {
        assert!(TransportError::Frame(FrameError::UnknownPacketId(9)).is_silent_drop());
        assert!(TransportError::NoRemote.is_silent_drop());

        assert!(!TransportError::ConnectionTimeout.is_silent_drop());
        assert!(!TransportError::Io(io::Error::other("test")).is_silent_drop());
    }

    #[test]
    fn test_fatal_errors() {
        assert!(TransportError::ConnectionTimeout.is_fatal());
        assert!(TransportError::Io(io::Error::other("test")).is_fatal());

        assert!(!TransportError::Frame(FrameError::Empty).is_fatal());
        assert!(
            !TransportError::DeliveryFailed {
                sequence: 1,
                retries: 20
            }
            .is_fatal()
        );
    }
}
