//! In-process single-host network.
//!
//! The loopback network knows exactly one participant: this session. A send
//! is delivered back to the session when one of its subscriptions covers the
//! message, and the server acknowledgement reports `SENT` or `LOST`
//! accordingly. Queued notices are mirrored by bytes on a socket pair so the
//! event loop can `poll` for them like it would for a network socket.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::net::{Ipv4Addr, SocketAddr};
use std::os::fd::{AsFd, BorrowedFd};
use std::os::unix::net::UnixStream;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::debug;

use super::{
    AuthStatus, CorrelationId, Location, Notice, NoticeKind, OutboundNotice, Subscription,
    TRANSPORT_TARGET, Transport, TransportError,
};

/// Acknowledgement body reporting delivery to at least one subscriber.
pub const SENT_ACK: &[u8] = b"SENT\0";

/// Acknowledgement body reporting that nobody was subscribed.
pub const LOST_ACK: &[u8] = b"LOST\0";

/// Port reported as the origin of loopback notices.
pub const LOOPBACK_PORT: u16 = 2104;

/// How the loopback server answers an accepted send.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AckMode {
    /// Deliver to matching subscriptions and report `SENT` or `LOST`.
    #[default]
    Deliver,
    /// Refuse delivery with a server NAK.
    Nak,
    /// Queue a report of the given kind and body instead.
    Custom {
        /// Kind of the queued report.
        kind: NoticeKind,
        /// Body of the queued report.
        payload: Vec<u8>,
    },
    /// Queue nothing; reports must be injected by hand.
    Silent,
}

/// Fault applied to subscribe and unsubscribe requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscribeFault {
    /// Answer the next `remaining` requests with a server NAK.
    Nak {
        /// Requests still to be refused.
        remaining: u32,
    },
    /// Fail every request.
    Fail,
}

/// Location currently announced by the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationRecord {
    /// Host name.
    pub host: String,
    /// Terminal name.
    pub tty: String,
    /// Exposure level.
    pub exposure: String,
}

/// Loopback implementation of [`Transport`].
#[derive(Debug)]
pub struct LoopbackTransport {
    identity: String,
    origin: SocketAddr,
    open: bool,
    subscriptions: Vec<Subscription>,
    location: Option<LocationRecord>,
    queue: VecDeque<Notice>,
    wake_reader: UnixStream,
    wake_writer: UnixStream,
    session_nonce: u64,
    next_sequence: u64,
    last_id: Option<CorrelationId>,
    ack_mode: AckMode,
    send_rejection: Option<String>,
    subscribe_fault: Option<SubscribeFault>,
    auth: AuthStatus,
}

impl LoopbackTransport {
    /// Opens a loopback session for `identity`.
    ///
    /// # Errors
    ///
    /// Returns an error when the wake-up socket pair cannot be created.
    pub fn open(identity: impl Into<String>) -> Result<Self, TransportError> {
        let (wake_reader, wake_writer) =
            UnixStream::pair().map_err(|source| TransportError::io("open", source))?;
        wake_reader
            .set_nonblocking(true)
            .map_err(|source| TransportError::io("open", source))?;
        wake_writer
            .set_nonblocking(true)
            .map_err(|source| TransportError::io("open", source))?;

        let identity = identity.into();
        debug!(target: TRANSPORT_TARGET, %identity, "loopback session opened");
        Ok(Self {
            identity,
            origin: SocketAddr::from((Ipv4Addr::LOCALHOST, LOOPBACK_PORT)),
            open: true,
            subscriptions: Vec::new(),
            location: None,
            queue: VecDeque::new(),
            wake_reader,
            wake_writer,
            session_nonce: now_secs(),
            next_sequence: 0,
            last_id: None,
            ack_mode: AckMode::default(),
            send_rejection: None,
            subscribe_fault: None,
            auth: AuthStatus::Yes,
        })
    }

    /// Subscriptions currently held.
    #[must_use]
    pub fn subscriptions(&self) -> &[Subscription] {
        &self.subscriptions
    }

    /// Location currently announced, if any.
    #[must_use]
    pub fn location(&self) -> Option<&LocationRecord> {
        self.location.as_ref()
    }

    /// Whether the session is still open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Correlation id assigned to the most recent accepted send.
    #[must_use]
    pub fn last_correlation_id(&self) -> Option<CorrelationId> {
        self.last_id
    }

    /// Number of notices queued for the session.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Selects how subsequent sends are acknowledged.
    pub fn set_ack_mode(&mut self, mode: AckMode) {
        self.ack_mode = mode;
    }

    /// Makes subsequent sends fail with `reason`, or accepts them again.
    pub fn set_send_rejection(&mut self, reason: Option<String>) {
        self.send_rejection = reason;
    }

    /// Applies a fault to subsequent subscription requests.
    pub fn set_subscribe_fault(&mut self, fault: Option<SubscribeFault>) {
        self.subscribe_fault = fault;
    }

    /// Sets the authentication verdict reported for received notices.
    pub fn set_authentication(&mut self, status: AuthStatus) {
        self.auth = status;
    }

    /// Queues a notice as if it had arrived from the network.
    ///
    /// # Errors
    ///
    /// Returns an error when the session is closed or the wake-up socket
    /// fails.
    pub fn inject(&mut self, notice: Notice) -> Result<(), TransportError> {
        self.ensure_open()?;
        self.enqueue(notice)
    }

    /// Builds an ordinary inbound message as another user would send it.
    #[must_use]
    pub fn message_from(&self, sender: &str, class: &str, instance: &str, body: &[u8]) -> Notice {
        Notice {
            kind: NoticeKind::Acked,
            id: CorrelationId::from_raw(0),
            sender: sender.to_owned(),
            class: class.to_owned(),
            instance: instance.to_owned(),
            recipient: self.identity.clone(),
            opcode: String::new(),
            origin: self.origin,
            time: now_secs(),
            payload: body.to_vec(),
        }
    }

    fn ensure_open(&self) -> Result<(), TransportError> {
        if self.open {
            Ok(())
        } else {
            Err(TransportError::SessionClosed)
        }
    }

    fn allocate_id(&mut self) -> CorrelationId {
        self.next_sequence = self.next_sequence.wrapping_add(1);
        let id = CorrelationId::from_raw(
            (u128::from(self.session_nonce) << 64) | u128::from(self.next_sequence),
        );
        self.last_id = Some(id);
        id
    }

    fn enqueue(&mut self, notice: Notice) -> Result<(), TransportError> {
        self.queue.push_back(notice);
        match self.wake_writer.write(&[1]) {
            Ok(_) => Ok(()),
            // A full socket buffer already holds enough unread bytes to keep
            // the descriptor readable.
            Err(error) if error.kind() == io::ErrorKind::WouldBlock => Ok(()),
            Err(source) => Err(TransportError::io("wake", source)),
        }
    }

    fn drain_wake_bytes(&mut self) -> Result<(), TransportError> {
        let mut scratch = [0_u8; 64];
        loop {
            match self.wake_reader.read(&mut scratch) {
                Ok(0) => return Ok(()),
                Ok(_) => {}
                Err(error) if error.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
                Err(source) => return Err(TransportError::io("wake", source)),
            }
        }
    }

    fn report(&self, kind: NoticeKind, id: CorrelationId, sent: &OutboundNotice) -> Notice {
        Notice {
            kind,
            id,
            sender: self.identity.clone(),
            class: sent.class.clone(),
            instance: sent.instance.clone(),
            recipient: sent.recipient.clone(),
            opcode: sent.opcode.clone(),
            origin: self.origin,
            time: now_secs(),
            payload: Vec::new(),
        }
    }

    fn check_subscribe_fault(&mut self, operation: &'static str) -> Result<(), TransportError> {
        match self.subscribe_fault {
            Some(SubscribeFault::Nak { remaining }) if remaining > 0 => {
                self.subscribe_fault = (remaining > 1).then_some(SubscribeFault::Nak {
                    remaining: remaining - 1,
                });
                Err(TransportError::ServerNak { operation })
            }
            Some(SubscribeFault::Fail) => Err(TransportError::failed(
                operation,
                "subscription service unavailable",
            )),
            _ => Ok(()),
        }
    }
}

impl Transport for LoopbackTransport {
    fn sender(&self) -> &str {
        &self.identity
    }

    fn readiness_fd(&self) -> BorrowedFd<'_> {
        self.wake_reader.as_fd()
    }

    fn send_acked(&mut self, notice: &OutboundNotice) -> Result<CorrelationId, TransportError> {
        self.ensure_open()?;
        if let Some(reason) = &self.send_rejection {
            return Err(TransportError::rejected(reason.clone()));
        }

        let id = self.allocate_id();
        match self.ack_mode.clone() {
            AckMode::Deliver => {
                let delivered = self.subscriptions.iter().any(|subscription| {
                    subscription.covers(&notice.class, &notice.instance, &notice.recipient)
                });
                if delivered {
                    let mut copy = self.report(NoticeKind::Acked, id, notice);
                    copy.payload.clone_from(&notice.payload);
                    self.enqueue(copy)?;
                }
                let mut ack = self.report(NoticeKind::ServerAck, id, notice);
                ack.payload = if delivered { SENT_ACK } else { LOST_ACK }.to_vec();
                self.enqueue(ack)?;
            }
            AckMode::Nak => {
                let nak = self.report(NoticeKind::ServerNak, id, notice);
                self.enqueue(nak)?;
            }
            AckMode::Custom { kind, payload } => {
                let mut report = self.report(kind, id, notice);
                report.payload = payload;
                self.enqueue(report)?;
            }
            AckMode::Silent => {}
        }

        debug!(
            target: TRANSPORT_TARGET,
            %id,
            class = %notice.class,
            instance = %notice.instance,
            recipient = %notice.recipient,
            "loopback send accepted"
        );
        Ok(id)
    }

    fn pending(&mut self) -> Result<usize, TransportError> {
        self.ensure_open()?;
        if self.queue.is_empty() {
            self.drain_wake_bytes()?;
        }
        Ok(self.queue.len())
    }

    fn receive(&mut self) -> Result<Notice, TransportError> {
        self.ensure_open()?;
        if self.queue.is_empty() {
            return Err(TransportError::NothingPending);
        }
        let mut byte = [0_u8; 1];
        match self.wake_reader.read(&mut byte) {
            Ok(_) => {}
            Err(error) if error.kind() == io::ErrorKind::WouldBlock => {}
            Err(source) => return Err(TransportError::io("receive", source)),
        }
        self.queue.pop_front().ok_or(TransportError::NothingPending)
    }

    fn subscribe(&mut self, subscriptions: &[Subscription]) -> Result<(), TransportError> {
        self.ensure_open()?;
        self.check_subscribe_fault("subscribe")?;
        for subscription in subscriptions {
            if !self.subscriptions.contains(subscription) {
                self.subscriptions.push(subscription.clone());
            }
        }
        Ok(())
    }

    fn unsubscribe(&mut self, subscriptions: &[Subscription]) -> Result<(), TransportError> {
        self.ensure_open()?;
        self.check_subscribe_fault("unsubscribe")?;
        self.subscriptions.retain(|held| {
            !subscriptions.iter().any(|removed| {
                held.class.eq_ignore_ascii_case(&removed.class)
                    && held.instance == removed.instance
                    && held.recipient == removed.recipient
            })
        });
        Ok(())
    }

    fn cancel_subscriptions(&mut self) -> Result<(), TransportError> {
        self.ensure_open()?;
        self.subscriptions.clear();
        Ok(())
    }

    fn check_authentication(&self, _notice: &Notice) -> AuthStatus {
        self.auth
    }

    fn set_location(&mut self, location: &Location<'_>) -> Result<(), TransportError> {
        self.ensure_open()?;
        self.location = Some(LocationRecord {
            host: location.host.to_owned(),
            tty: location.tty.to_owned(),
            exposure: location.exposure.to_owned(),
        });
        Ok(())
    }

    fn unset_location(&mut self) -> Result<(), TransportError> {
        self.ensure_open()?;
        self.location = None;
        Ok(())
    }

    fn close(&mut self) -> Result<(), TransportError> {
        self.ensure_open()?;
        self.open = false;
        self.queue.clear();
        self.subscriptions.clear();
        self.location = None;
        debug!(target: TRANSPORT_TARGET, identity = %self.identity, "loopback session closed");
        Ok(())
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default()
}
