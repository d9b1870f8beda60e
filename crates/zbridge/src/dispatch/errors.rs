//! Error types for command reading and dispatch.
//!
//! The display strings of these errors are the messages reported to the
//! client, so they are part of the protocol.

use std::io;

use thiserror::Error;

use crate::transport::TransportError;

/// Errors raised while reading the command stream.
#[derive(Debug, Error)]
pub enum ReaderError {
    /// The buffer filled up without a complete line.
    #[error("Command too long")]
    CommandTooLong {
        /// Buffer size in bytes.
        limit: usize,
    },
    /// Reading the command stream failed.
    #[error("failed to read commands: {source}")]
    Read {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

/// Errors raised while decoding or applying a command.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The record is not a JSON document.
    #[error("Parse error")]
    Parse {
        /// JSON error, when one was produced.
        #[source]
        source: Option<serde_json::Error>,
    },
    /// The document lacks a string `type` attribute.
    #[error("Command must have a 'type' attribute and it must be a string")]
    MissingType,
    /// A `send` field is absent or has the wrong type.
    #[error("Required parameter missing (or of wrong type)")]
    InvalidSend {
        /// Deserialisation error naming the field.
        #[source]
        source: serde_json::Error,
    },
    /// The class list of a subscription command is absent or malformed.
    #[error("Missing field or bad types")]
    InvalidSubscription {
        /// Deserialisation error naming the field.
        #[source]
        source: serde_json::Error,
    },
    /// The `type` attribute names no known command.
    #[error("Unrecognized command type")]
    UnknownType {
        /// Type given by the client.
        command_type: String,
    },
    /// The transport refused a subscription change.
    ///
    /// The transport error already names the operation it failed.
    #[error("{source}")]
    Subscription {
        /// `subscribe` or `unsubscribe`.
        operation: &'static str,
        /// Transport failure.
        #[source]
        source: TransportError,
    },
}

impl DispatchError {
    /// Creates a parse error from a JSON error.
    pub fn parse(source: serde_json::Error) -> Self {
        Self::Parse {
            source: Some(source),
        }
    }

    /// Creates an invalid send error.
    pub fn invalid_send(source: serde_json::Error) -> Self {
        Self::InvalidSend { source }
    }

    /// Creates an invalid subscription error.
    pub fn invalid_subscription(source: serde_json::Error) -> Self {
        Self::InvalidSubscription { source }
    }

    /// Creates an unknown type error.
    pub fn unknown_type(command_type: impl Into<String>) -> Self {
        Self::UnknownType {
            command_type: command_type.into(),
        }
    }

    /// Whether the bridge must stop after reporting this error.
    ///
    /// Malformed commands are reported and skipped. A refused subscription
    /// change leaves the client's view of the session unknown, so it ends
    /// the bridge.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Subscription { .. })
    }
}
