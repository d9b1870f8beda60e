//! Classification of delivery reports.

use serde::Serialize;
use tracing::debug;

use crate::transport::{Notice, NoticeKind};

use super::NOTICE_TARGET;
use super::correlation::PendingRequests;

/// Server acknowledgement body reporting delivery.
pub const SENT_MARKER: &[u8] = b"SENT";

/// Server acknowledgement body reporting that nobody received the message.
pub const NOT_SENT_MARKER: &[u8] = b"LOST";

/// Outcome reported to the client for one send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DeliveryOutcome {
    /// Delivered to at least one subscriber.
    #[serde(rename = "SENT")]
    Sent,
    /// Accepted by the server but nobody was subscribed.
    #[serde(rename = "NOTSENT")]
    NotSent,
    /// Refused by the server, usually for failed authentication.
    #[serde(rename = "NAK")]
    Nak,
    /// A report arrived that could not be interpreted.
    #[serde(rename = "ERROR")]
    Error,
    /// The transport refused the send outright.
    #[serde(rename = "TRANSPORT_REJECTED")]
    TransportRejected,
}

/// Result of one send, ready to be reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryResult {
    /// Client tag of the send.
    pub tag: String,
    /// Delivery outcome.
    pub outcome: DeliveryOutcome,
}

/// Classifies a delivery report.
#[must_use]
pub fn classify(notice: &Notice) -> DeliveryOutcome {
    match notice.kind {
        NoticeKind::ServerAck => {
            let marker = marker(&notice.payload);
            if marker == SENT_MARKER {
                DeliveryOutcome::Sent
            } else if marker == NOT_SENT_MARKER {
                DeliveryOutcome::NotSent
            } else {
                DeliveryOutcome::Error
            }
        }
        NoticeKind::ServerNak => DeliveryOutcome::Nak,
        _ => DeliveryOutcome::Error,
    }
}

/// Resolves `notice` against the outstanding sends.
///
/// Returns `None` when the notice is not a report on one of our sends and
/// should be handed to the client as a message instead.
pub fn match_result(pending: &mut PendingRequests, notice: &Notice) -> Option<DeliveryResult> {
    let tag = pending.take_match(notice)?;
    let outcome = classify(notice);
    debug!(target: NOTICE_TARGET, id = %notice.id, %tag, ?outcome, "delivery report matched");
    Some(DeliveryResult { tag, outcome })
}

/// Report body up to the first NUL byte.
fn marker(payload: &[u8]) -> &[u8] {
    payload
        .split(|byte| *byte == 0)
        .next()
        .unwrap_or_default()
}
