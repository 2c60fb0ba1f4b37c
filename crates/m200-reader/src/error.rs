//! Error types for reader sessions.

use m200_protocol::Status;
use thiserror::Error;

/// Result type alias for reader operations.
pub type Result<T> = std::result::Result<T, ReaderError>;

/// Errors that can occur while talking to a reader.
#[derive(Debug, Error)]
pub enum ReaderError {
    /// Session has no open socket
    #[error("Not connected to reader")]
    NotConnected,

    /// Connection attempt timed out
    #[error("Connection timeout after {0}ms")]
    ConnectionTimeout(u64),

    /// No byte arrived within the socket timeout
    #[error("Read timeout after {0}ms")]
    ReadTimeout(u64),

    /// Write operation timed out
    #[error("Write timeout after {0}ms")]
    WriteTimeout(u64),

    /// Only unsolicited frames arrived for every attempt
    #[error("No response to {command} after {attempts} attempts")]
    ResponseTimeout { command: String, attempts: u32 },

    /// Peer closed the socket
    #[error("Connection lost")]
    ConnectionLost,

    /// Framing or builder error
    #[error("Protocol error: {0}")]
    Protocol(#[from] m200_core::Error),

    /// Low-level I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Reader answered with a non-success status
    #[error("{command} rejected by device: {status}")]
    Device { command: String, status: Status },
}

impl ReaderError {
    /// `true` for the errors caused by a silent or unresponsive device.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::ConnectionTimeout(_)
                | Self::ReadTimeout(_)
                | Self::WriteTimeout(_)
                | Self::ResponseTimeout { .. }
        )
    }

    /// `true` when the socket is unusable and the session should reconnect.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::NotConnected | Self::ConnectionLost | Self::Io(_)
        ) || self.is_timeout()
    }
}
