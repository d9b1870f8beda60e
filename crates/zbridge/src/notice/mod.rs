//! Inbound notice handling.
//!
//! Every notice drained from the transport is first offered to the
//! [`PendingRequests`] table. Delivery reports for one of our sends become a
//! [`DeliveryResult`]; everything else is translated into an
//! [`InboundMessage`] for the client.

mod body;
mod correlation;
mod matcher;
mod resolver;
mod translate;

pub use self::body::{decode_body, encode_body};
pub use self::correlation::PendingRequests;
pub use self::matcher::{
    DeliveryOutcome, DeliveryResult, NOT_SENT_MARKER, SENT_MARKER, classify, match_result,
};
pub use self::resolver::{HostResolver, NumericResolver, SystemResolver, resolve_host};
pub use self::translate::{InboundMessage, NoticeTranslator};

pub(crate) const NOTICE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::notice");
