//! Messaging transport collaborator.
//!
//! The bridge never speaks the network's wire format itself. Everything it
//! needs from the publish/subscribe network is captured by the [`Transport`]
//! trait: acknowledged sends that hand back a correlation id, a non-blocking
//! view of queued inbound notices, subscription management and the
//! authentication verdict for a received notice.
//!
//! [`LoopbackTransport`] implements the trait as an in-process, single-host
//! network. The binary uses it by default and the test suites drive the
//! bridge through it.

mod errors;
mod loopback;

use std::fmt;
use std::net::SocketAddr;
use std::os::fd::BorrowedFd;

use serde::Serialize;

pub use self::errors::TransportError;
pub use self::loopback::{
    AckMode, LOOPBACK_PORT, LOST_ACK, LocationRecord, LoopbackTransport, SENT_ACK, SubscribeFault,
};

pub(crate) const TRANSPORT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::transport");

/// Instance or recipient value matching anything.
pub const WILDCARD: &str = "*";

/// Opaque identifier the transport assigns to an accepted send.
///
/// Delivery reports carry the id of the send they describe. Ids are unique
/// among the sends still awaiting a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CorrelationId(u128);

impl CorrelationId {
    /// Wraps a raw identifier produced by a transport implementation.
    #[must_use]
    pub const fn from_raw(raw: u128) -> Self {
        Self(raw)
    }

    /// Returns the raw identifier.
    #[must_use]
    pub const fn as_raw(self) -> u128 {
        self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{:032x}", self.0)
    }
}

/// Kind of an inbound notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    /// Ordinary message sent without acknowledgement.
    Unacked,
    /// Ordinary message whose sender asked for acknowledgement.
    Acked,
    /// Server report on the delivery of one of our sends.
    ServerAck,
    /// Server refusal of one of our sends, usually an authentication failure.
    ServerNak,
    /// Host manager acknowledgement.
    HostManagerAck,
    /// Client acknowledgement.
    ClientAck,
}

impl NoticeKind {
    /// Whether the notice reports on a send rather than carrying a message.
    ///
    /// Ordinary messages can share a correlation id with one of our own sends
    /// when the network loops that send back to us, so they are never matched
    /// against outstanding requests.
    #[must_use]
    pub const fn is_delivery_report(self) -> bool {
        !matches!(self, Self::Unacked | Self::Acked)
    }
}

/// Authentication verdict for a received notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuthStatus {
    /// The sender's identity was verified.
    Yes,
    /// The notice carried no authentication.
    No,
    /// Authentication was present but did not verify.
    Failed,
}

/// Subscription scope: a class with instance and recipient filters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Subscription {
    /// Message class.
    pub class: String,
    /// Instance filter, [`WILDCARD`] for any.
    pub instance: String,
    /// Recipient filter, [`WILDCARD`] for any.
    pub recipient: String,
}

impl Subscription {
    /// Builds a subscription with explicit filters.
    #[must_use]
    pub fn new(
        class: impl Into<String>,
        instance: impl Into<String>,
        recipient: impl Into<String>,
    ) -> Self {
        Self {
            class: class.into(),
            instance: instance.into(),
            recipient: recipient.into(),
        }
    }

    /// Builds a subscription covering every instance and recipient of a class.
    #[must_use]
    pub fn class_wide(class: impl Into<String>) -> Self {
        Self::new(class, WILDCARD, WILDCARD)
    }

    /// Whether a message addressed to `class`/`instance`/`recipient` falls
    /// inside this scope. Classes compare case-insensitively.
    #[must_use]
    pub fn covers(&self, class: &str, instance: &str, recipient: &str) -> bool {
        self.class.eq_ignore_ascii_case(class)
            && filter_matches(&self.instance, instance)
            && filter_matches(&self.recipient, recipient)
    }
}

fn filter_matches(filter: &str, value: &str) -> bool {
    filter == WILDCARD || filter == value
}

/// Message handed to the transport for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundNotice {
    /// Message class.
    pub class: String,
    /// Message instance.
    pub instance: String,
    /// Recipient; empty for broadcast to the class.
    pub recipient: String,
    /// Opcode, empty when unused.
    pub opcode: String,
    /// Encoded body.
    pub payload: Vec<u8>,
}

/// Notice received from the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// Notice kind.
    pub kind: NoticeKind,
    /// Correlation id; for delivery reports, the id of the reported send.
    pub id: CorrelationId,
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
    /// Address the notice originated from.
    pub origin: SocketAddr,
    /// Delivery time in whole seconds since the Unix epoch.
    pub time: u64,
    /// Raw body bytes.
    pub payload: Vec<u8>,
}

/// Location record announced for the session's identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location<'a> {
    /// Host name.
    pub host: &'a str,
    /// Terminal name.
    pub tty: &'a str,
    /// Exposure level.
    pub exposure: &'a str,
}

impl<'a> From<zbridge_config::LocationSettings<'a>> for Location<'a> {
    fn from(settings: zbridge_config::LocationSettings<'a>) -> Self {
        Self {
            host: settings.host,
            tty: settings.tty,
            exposure: settings.exposure,
        }
    }
}

/// Operations the bridge needs from the messaging network.
///
/// Implementations own an open session. All methods are called from the
/// bridge's single thread.
pub trait Transport {
    /// Identity the session is authenticated as.
    fn sender(&self) -> &str;

    /// Descriptor that becomes readable when inbound notices may be queued.
    fn readiness_fd(&self) -> BorrowedFd<'_>;

    /// Sends an authenticated notice requesting a delivery acknowledgement.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Rejected`] when the transport refuses the
    /// send; no delivery report will follow.
    fn send_acked(&mut self, notice: &OutboundNotice) -> Result<CorrelationId, TransportError>;

    /// Number of notices that can be received without blocking.
    ///
    /// # Errors
    ///
    /// Returns an error when the session can no longer be polled.
    fn pending(&mut self) -> Result<usize, TransportError>;

    /// Receives the next inbound notice.
    ///
    /// # Errors
    ///
    /// Returns an error when no notice can be read from the session.
    fn receive(&mut self) -> Result<Notice, TransportError>;

    /// Adds subscriptions, all or nothing.
    ///
    /// # Errors
    ///
    /// Returns an error when the network refuses the request.
    fn subscribe(&mut self, subscriptions: &[Subscription]) -> Result<(), TransportError>;

    /// Removes subscriptions, all or nothing.
    ///
    /// # Errors
    ///
    /// Returns an error when the network refuses the request.
    fn unsubscribe(&mut self, subscriptions: &[Subscription]) -> Result<(), TransportError>;

    /// Drops every subscription held by the session.
    ///
    /// # Errors
    ///
    /// Returns an error when the network refuses the request.
    fn cancel_subscriptions(&mut self) -> Result<(), TransportError>;

    /// Authentication verdict for a received notice.
    fn check_authentication(&self, notice: &Notice) -> AuthStatus;

    /// Announces where the session's identity is logged in.
    ///
    /// # Errors
    ///
    /// Returns an error when the location cannot be published.
    fn set_location(&mut self, location: &Location<'_>) -> Result<(), TransportError>;

    /// Withdraws the announced location.
    ///
    /// # Errors
    ///
    /// Returns an error when the location cannot be withdrawn.
    fn unset_location(&mut self) -> Result<(), TransportError>;

    /// Closes the session.
    ///
    /// # Errors
    ///
    /// Returns an error when the session was already closed.
    fn close(&mut self) -> Result<(), TransportError>;
}
