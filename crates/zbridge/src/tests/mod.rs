//! Test suites for the bridge.

mod bridge_behaviour;
mod session;
mod support;
