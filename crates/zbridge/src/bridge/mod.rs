//! The bridging engine.
//!
//! A [`Session`] owns the transport, the table of sends awaiting a delivery
//! report and the client's output stream. [`EventLoop`] multiplexes the
//! command stream and the transport onto that session from a single thread.

mod errors;
mod event_loop;
mod session;

pub use self::errors::BridgeError;
pub use self::event_loop::{EventLoop, LoopSettings, Poller, SystemPoller, Termination};
pub use self::session::{Flow, PERSONAL_CLASS, Session};

pub(crate) const BRIDGE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::bridge");
