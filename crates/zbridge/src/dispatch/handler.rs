//! Application of decoded commands to the transport.

use tracing::{debug, warn};

use crate::notice::PendingRequests;
use crate::transport::{CorrelationId, Subscription, Transport};

use super::DISPATCH_TARGET;
use super::errors::DispatchError;
use super::request::{Command, SendCommand};

/// What became of a dispatched command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatched {
    /// The send was accepted and awaits its delivery report.
    Accepted(CorrelationId),
    /// The transport refused the send; no report will follow.
    Rejected {
        /// Client tag of the send.
        tag: String,
    },
    /// A subscription change was applied.
    Applied,
    /// The client asked the bridge to stop.
    Quit,
}

/// Applies commands to a transport, recording accepted sends.
pub struct CommandDispatcher<'a, T: ?Sized> {
    transport: &'a mut T,
    pending: &'a mut PendingRequests,
}

impl<'a, T: Transport + ?Sized> CommandDispatcher<'a, T> {
    /// Creates a dispatcher over the session's transport and pending table.
    pub fn new(transport: &'a mut T, pending: &'a mut PendingRequests) -> Self {
        Self { transport, pending }
    }

    /// Applies one command.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Subscription`] when the transport refuses a
    /// subscription change. Send failures are not errors; they surface as
    /// [`Dispatched::Rejected`].
    pub fn dispatch(&mut self, command: Command) -> Result<Dispatched, DispatchError> {
        match command {
            Command::Send(send) => Ok(self.send(send)),
            Command::Subscribe(classes) => self.change_subscriptions(&classes, true),
            Command::Unsubscribe(classes) => self.change_subscriptions(&classes, false),
            Command::Quit => Ok(Dispatched::Quit),
        }
    }

    fn send(&mut self, send: SendCommand) -> Dispatched {
        match self.transport.send_acked(&send.to_outbound()) {
            Ok(id) => {
                debug!(target: DISPATCH_TARGET, tag = %send.tag, %id, "send accepted");
                self.pending.insert(send.tag, id);
                Dispatched::Accepted(id)
            }
            Err(error) => {
                warn!(target: DISPATCH_TARGET, tag = %send.tag, %error, "send rejected");
                Dispatched::Rejected { tag: send.tag }
            }
        }
    }

    fn change_subscriptions(
        &mut self,
        classes: &[String],
        subscribe: bool,
    ) -> Result<Dispatched, DispatchError> {
        let subscriptions: Vec<Subscription> =
            classes.iter().map(Subscription::class_wide).collect();
        let (operation, result) = if subscribe {
            ("subscribe", self.transport.subscribe(&subscriptions))
        } else {
            ("unsubscribe", self.transport.unsubscribe(&subscriptions))
        };
        result.map_err(|source| DispatchError::Subscription { operation, source })?;
        debug!(target: DISPATCH_TARGET, operation, count = subscriptions.len(), "subscriptions changed");
        Ok(Dispatched::Applied)
    }
}
