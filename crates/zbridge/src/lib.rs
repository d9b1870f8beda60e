//! A line-oriented JSON bridge to a publish/subscribe messaging network.
//!
//! `zbridge` reads one JSON command per line on standard input and writes one
//! JSON event per line on standard output. Clients send messages, manage
//! class subscriptions and receive both inbound messages and the delivery
//! outcome of every message they sent, without speaking the network's wire
//! format themselves.
//!
//! The engine is split along the path a byte takes through the bridge:
//!
//! - [`dispatch`] frames the command stream, decodes commands and applies
//!   them to the transport.
//! - [`notice`] matches delivery reports against outstanding sends and
//!   translates every other notice into a message event.
//! - [`bridge`] owns the session state and runs the single-threaded event
//!   loop that multiplexes the two directions.
//! - [`transport`] describes what the bridge needs from the network and
//!   provides an in-process loopback implementation.
//!
//! Every way out of the bridge, including `quit`, ends the process with a
//! failure status.

mod bootstrap;
pub mod bridge;
pub mod dispatch;
pub mod notice;
mod process;
mod telemetry;
pub mod transport;

pub use bootstrap::{
    BootstrapError, Bootstrapped, ConfigLoader, StaticConfigLoader, SystemConfigLoader,
    bootstrap_with,
};
pub use bridge::Termination;
pub use process::{
    LaunchError, ShutdownError, ShutdownSignal, SystemShutdownSignal, TERMINATION_SIGNALS,
    command_input, run_bridge, run_bridge_with,
};
pub use telemetry::{TelemetryError, TelemetryHandle};

#[cfg(test)]
mod tests;
