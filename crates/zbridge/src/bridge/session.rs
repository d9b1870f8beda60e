//! State shared by every step of the bridge.

use std::io::Write;
use std::slice;
use std::thread;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::dispatch::{BridgeEvent, Command, CommandDispatcher, Dispatched, EventWriter};
use crate::notice::{DeliveryOutcome, NoticeTranslator, PendingRequests, match_result};
use crate::transport::{Location, Notice, Subscription, Transport, WILDCARD};

use super::BRIDGE_TARGET;
use super::errors::BridgeError;

/// Class carrying personal messages.
pub const PERSONAL_CLASS: &str = "MESSAGE";

/// Whether the bridge should keep going after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Keep processing.
    Continue,
    /// The client asked to quit.
    Quit,
}

/// An open bridge session.
#[derive(Debug)]
pub struct Session<T, W> {
    transport: T,
    pending: PendingRequests,
    translator: NoticeTranslator,
    output: EventWriter<W>,
}

impl<T: Transport, W: Write> Session<T, W> {
    /// Creates a session writing client events to `output`.
    pub fn new(transport: T, translator: NoticeTranslator, output: W) -> Self {
        Self {
            transport,
            pending: PendingRequests::new(),
            translator,
            output: EventWriter::new(output),
        }
    }

    /// Subscribes to personal messages for the session's own identity.
    ///
    /// Server NAKs are retried up to `attempts` times in total, sleeping
    /// `delay` between attempts. Any other failure ends the attempt at once.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::PersonalSubscription`] once the subscription
    /// has definitely failed.
    pub fn subscribe_personal(&mut self, attempts: u32, delay: Duration) -> Result<(), BridgeError> {
        let personal = Subscription::new(PERSONAL_CLASS, WILDCARD, self.transport.sender());
        let attempts = attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.transport.subscribe(slice::from_ref(&personal)) {
                Ok(()) => {
                    info!(
                        target: BRIDGE_TARGET,
                        recipient = %personal.recipient,
                        attempt,
                        "subscribed to personal messages"
                    );
                    return Ok(());
                }
                Err(source) if source.is_server_nak() && attempt < attempts => {
                    warn!(
                        target: BRIDGE_TARGET,
                        attempt,
                        attempts,
                        delay_ms = delay.as_millis(),
                        "personal subscription refused; retrying"
                    );
                    thread::sleep(delay);
                    attempt += 1;
                }
                Err(source) => return Err(self.fail(BridgeError::PersonalSubscription { source })),
            }
        }
    }

    /// Announces where the session's identity is logged in.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Location`] when the transport refuses.
    pub fn announce_location(&mut self, location: &Location<'_>) -> Result<(), BridgeError> {
        match self.transport.set_location(location) {
            Ok(()) => {
                debug!(
                    target: BRIDGE_TARGET,
                    host = location.host,
                    tty = location.tty,
                    exposure = location.exposure,
                    "location announced"
                );
                Ok(())
            }
            Err(source) => Err(self.fail(BridgeError::Location { source })),
        }
    }

    /// Decodes and applies one command record.
    ///
    /// Malformed commands are reported to the client and skipped.
    ///
    /// # Errors
    ///
    /// Returns an error when the command cannot be applied and the bridge
    /// must stop, or when writing to the client fails.
    pub fn handle_record(&mut self, record: &[u8]) -> Result<Flow, BridgeError> {
        let command = match Command::parse(record) {
            Ok(command) => command,
            Err(error) => {
                warn!(target: BRIDGE_TARGET, %error, "rejected command");
                self.emit(&BridgeEvent::error(error.to_string()))?;
                return Ok(Flow::Continue);
            }
        };

        match CommandDispatcher::new(&mut self.transport, &mut self.pending).dispatch(command) {
            Ok(Dispatched::Rejected { tag }) => {
                self.emit(&BridgeEvent::result(tag, DeliveryOutcome::TransportRejected))?;
                Ok(Flow::Continue)
            }
            Ok(Dispatched::Quit) => Ok(Flow::Quit),
            Ok(Dispatched::Accepted(_) | Dispatched::Applied) => Ok(Flow::Continue),
            Err(error) if error.is_fatal() => Err(self.fail(BridgeError::Dispatch(error))),
            Err(error) => {
                warn!(target: BRIDGE_TARGET, %error, "command failed");
                self.emit(&BridgeEvent::error(error.to_string()))?;
                Ok(Flow::Continue)
            }
        }
    }

    /// Handles every notice the transport can deliver without blocking.
    ///
    /// Returns the number of notices handled.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Receive`] when the transport fails, or
    /// [`BridgeError::Output`] when writing to the client fails.
    pub fn drain_notices(&mut self) -> Result<usize, BridgeError> {
        let mut handled = 0;
        loop {
            let ready = match self.transport.pending() {
                Ok(ready) => ready,
                Err(source) => return Err(self.fail(BridgeError::Receive { source })),
            };
            if ready == 0 {
                return Ok(handled);
            }
            let notice = match self.transport.receive() {
                Ok(notice) => notice,
                Err(source) => return Err(self.fail(BridgeError::Receive { source })),
            };
            self.handle_notice(&notice)?;
            handled += 1;
        }
    }

    fn handle_notice(&mut self, notice: &Notice) -> Result<(), BridgeError> {
        if let Some(result) = match_result(&mut self.pending, notice) {
            return self.emit(&result.into());
        }

        let auth = self.transport.check_authentication(notice);
        let message = self.translator.translate(notice, auth);
        debug!(
            target: BRIDGE_TARGET,
            sender = %message.sender,
            class = %message.class,
            instance = %message.instance,
            "message received"
        );
        self.emit(&message.into())
    }

    /// Reports a recoverable failure to the client.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Output`] when writing to the client fails.
    pub fn report_error(&mut self, message: impl Into<String>) -> Result<(), BridgeError> {
        let message = message.into();
        warn!(target: BRIDGE_TARGET, %message, "reporting error");
        self.emit(&BridgeEvent::error(message))
    }

    /// Releases the session: subscriptions, location, then the transport.
    ///
    /// Failures are logged and otherwise ignored. Sends still awaiting a
    /// report are abandoned.
    pub fn shutdown(&mut self) {
        if !self.pending.is_empty() {
            debug!(
                target: BRIDGE_TARGET,
                abandoned = self.pending.len(),
                "shutting down with sends awaiting reports"
            );
        }
        if let Err(error) = self.transport.cancel_subscriptions() {
            warn!(target: BRIDGE_TARGET, %error, "failed to cancel subscriptions");
        }
        if let Err(error) = self.transport.unset_location() {
            warn!(target: BRIDGE_TARGET, %error, "failed to withdraw location");
        }
        if let Err(error) = self.transport.close() {
            warn!(target: BRIDGE_TARGET, %error, "failed to close transport session");
        }
        info!(target: BRIDGE_TARGET, "session released");
    }

    /// The transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// The transport, mutably.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Sends awaiting a delivery report.
    pub fn pending(&self) -> &PendingRequests {
        &self.pending
    }

    /// The client's output stream.
    pub fn output(&self) -> &W {
        self.output.get_ref()
    }

    fn emit(&mut self, event: &BridgeEvent) -> Result<(), BridgeError> {
        self.output
            .emit(event)
            .map_err(|source| BridgeError::Output { source })
    }

    /// Logs a fatal error and reports it to the client.
    pub(crate) fn fail(&mut self, failure: BridgeError) -> BridgeError {
        error!(target: BRIDGE_TARGET, error = %failure, "fatal bridge error");
        if let Err(source) = self.output.emit(&BridgeEvent::error(failure.to_string())) {
            error!(target: BRIDGE_TARGET, %source, "failed to report fatal error");
        }
        failure
    }
}
