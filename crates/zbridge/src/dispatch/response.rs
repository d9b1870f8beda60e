//! Events written to the client.

use std::io::{self, Write};

use serde::Serialize;

use crate::notice::{DeliveryOutcome, DeliveryResult, InboundMessage};

/// Event written to the client as one JSON line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BridgeEvent {
    /// A command or the bridge itself failed.
    Error {
        /// Human-readable description.
        message: String,
    },
    /// Outcome of a send.
    Result {
        /// Client tag of the send.
        tag: String,
        /// Delivery outcome.
        result: DeliveryOutcome,
    },
    /// Message received from the network.
    Message(InboundMessage),
}

impl BridgeEvent {
    /// Creates an error event.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Creates a result event.
    pub fn result(tag: impl Into<String>, result: DeliveryOutcome) -> Self {
        Self::Result {
            tag: tag.into(),
            result,
        }
    }
}

impl From<DeliveryResult> for BridgeEvent {
    fn from(result: DeliveryResult) -> Self {
        Self::result(result.tag, result.outcome)
    }
}

impl From<InboundMessage> for BridgeEvent {
    fn from(message: InboundMessage) -> Self {
        Self::Message(message)
    }
}

/// Writes [`BridgeEvent`]s as JSON lines.
///
/// Each event is flushed as soon as it is written so the client sees it
/// without waiting for further output.
#[derive(Debug)]
pub struct EventWriter<W> {
    writer: W,
}

impl<W: Write> EventWriter<W> {
    /// Wraps an output stream.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Writes one event and flushes.
    ///
    /// # Errors
    ///
    /// Returns an error when serialisation or writing fails.
    pub fn emit(&mut self, event: &BridgeEvent) -> io::Result<()> {
        serde_json::to_writer(&mut self.writer, event)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()
    }

    /// The wrapped stream.
    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    /// Unwraps the stream.
    pub fn into_inner(self) -> W {
        self.writer
    }
}
