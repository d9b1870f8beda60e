//! Conversion of received notices into client messages.

use serde::Serialize;

use crate::transport::{AuthStatus, Notice};

use super::body::decode_body;
use super::resolver::{HostResolver, resolve_host};

/// Message event handed to the client.
///
/// Field order matches the order written on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InboundMessage {
    /// Identity of the sender.
    pub sender: String,
    /// Message class.
    pub class: String,
    /// Message instance.
    pub instance: String,
    /// Recipient.
    pub recipient: String,
    /// Opcode.
    pub opcode: String,
    /// Host the message came from, numeric when it has no name.
    pub fromhost: String,
    /// Delivery time in seconds since the Unix epoch.
    pub time: u64,
    /// Authentication verdict.
    pub auth: AuthStatus,
    /// Body parts; never empty.
    pub body: Vec<String>,
}

/// Builds [`InboundMessage`]s from received notices.
pub struct NoticeTranslator {
    resolver: Box<dyn HostResolver + Send>,
}

impl NoticeTranslator {
    /// Creates a translator resolving origins with `resolver`.
    pub fn new(resolver: impl HostResolver + Send + 'static) -> Self {
        Self {
            resolver: Box::new(resolver),
        }
    }

    /// Translates `notice`, whose authentication was judged `auth`.
    #[must_use]
    pub fn translate(&self, notice: &Notice, auth: AuthStatus) -> InboundMessage {
        InboundMessage {
            sender: notice.sender.clone(),
            class: notice.class.clone(),
            instance: notice.instance.clone(),
            recipient: notice.recipient.clone(),
            opcode: notice.opcode.clone(),
            fromhost: resolve_host(self.resolver.as_ref(), notice.origin.ip()),
            time: notice.time,
            auth,
            body: decode_body(&notice.payload),
        }
    }
}

impl std::fmt::Debug for NoticeTranslator {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.debug_struct("NoticeTranslator").finish_non_exhaustive()
    }
}
