//! Error types for transport operations.

use std::io;

use thiserror::Error;

/// Errors surfaced by a [`Transport`](super::Transport) implementation.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The transport refused to accept a send.
    #[error("send rejected: {reason}")]
    Rejected {
        /// Transport-specific explanation.
        reason: String,
    },
    /// The server answered a request with a negative acknowledgement.
    #[error("{operation} refused by server")]
    ServerNak {
        /// Operation that was refused.
        operation: &'static str,
    },
    /// The session has been closed.
    #[error("transport session is closed")]
    SessionClosed,
    /// `receive` was called with nothing queued.
    #[error("no notice is pending")]
    NothingPending,
    /// Operating system failure while talking to the network.
    #[error("{operation} failed: {source}")]
    Io {
        /// Operation that failed.
        operation: &'static str,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Any other failure reported by the transport.
    #[error("{operation} failed: {message}")]
    Failed {
        /// Operation that failed.
        operation: &'static str,
        /// Transport-specific explanation.
        message: String,
    },
}

impl TransportError {
    /// Creates a rejection error.
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected {
            reason: reason.into(),
        }
    }

    /// Creates an IO error for the given operation.
    pub fn io(operation: &'static str, source: io::Error) -> Self {
        Self::Io { operation, source }
    }

    /// Creates a generic failure for the given operation.
    pub fn failed(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Failed {
            operation,
            message: message.into(),
        }
    }

    /// Whether the failure was a server NAK, which is worth retrying.
    #[must_use]
    pub fn is_server_nak(&self) -> bool {
        matches!(self, Self::ServerNak { .. })
    }
}
