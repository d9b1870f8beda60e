//! Command decoding.
//!
//! A record is first parsed as an untyped JSON document so that the three
//! failure classes (not JSON, no `type`, bad fields) can be told apart and
//! reported with their own messages.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::notice::encode_body;
use crate::transport::OutboundNotice;

use super::errors::DispatchError;

/// Decoded client command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Send a message.
    Send(SendCommand),
    /// Subscribe to every instance of each class.
    Subscribe(Vec<String>),
    /// Drop the subscriptions to each class.
    Unsubscribe(Vec<String>),
    /// Shut the bridge down.
    Quit,
}

/// Fields of a `send` command.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SendCommand {
    /// Client tag echoed in the delivery result.
    pub tag: String,
    /// Message class.
    pub class: String,
    /// Message instance.
    pub instance: String,
    /// Recipient; empty for the whole class.
    pub recipient: String,
    /// Body parts in order.
    pub body: Vec<String>,
    /// Opcode; anything but a string is treated as absent.
    #[serde(default, deserialize_with = "string_or_empty")]
    pub opcode: String,
}

impl SendCommand {
    /// Payload carrying the body parts, each NUL-terminated.
    #[must_use]
    pub fn payload(&self) -> Vec<u8> {
        encode_body(&self.body)
    }

    /// Notice to hand to the transport.
    #[must_use]
    pub fn to_outbound(&self) -> OutboundNotice {
        OutboundNotice {
            class: self.class.clone(),
            instance: self.instance.clone(),
            recipient: self.recipient.clone(),
            opcode: self.opcode.clone(),
            payload: self.payload(),
        }
    }
}

#[derive(Deserialize)]
struct ClassList {
    classes: Vec<String>,
}

impl Command {
    /// Decodes one record.
    ///
    /// Trailing whitespace, including a carriage return, is ignored.
    ///
    /// # Errors
    ///
    /// Returns the [`DispatchError`] to report to the client.
    pub fn parse(record: &[u8]) -> Result<Self, DispatchError> {
        let document: Value =
            serde_json::from_slice(record.trim_ascii_end()).map_err(DispatchError::parse)?;
        let command_type = document
            .get("type")
            .and_then(Value::as_str)
            .ok_or(DispatchError::MissingType)?;

        match command_type {
            "send" => SendCommand::deserialize(&document)
                .map(Self::Send)
                .map_err(DispatchError::invalid_send),
            "subscribe" => class_list(&document).map(Self::Subscribe),
            "unsubscribe" => class_list(&document).map(Self::Unsubscribe),
            "quit" => Ok(Self::Quit),
            other => Err(DispatchError::unknown_type(other)),
        }
    }
}

fn class_list(document: &Value) -> Result<Vec<String>, DispatchError> {
    ClassList::deserialize(document)
        .map(|list| list.classes)
        .map_err(DispatchError::invalid_subscription)
}

fn string_or_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(text) => text,
        _ => String::new(),
    })
}
