//! Process lifecycle: termination signals and launch sequencing.

mod errors;
mod launch;
mod shutdown;

pub use self::errors::LaunchError;
pub use self::launch::{command_input, run_bridge, run_bridge_with};
pub use self::shutdown::{
    ShutdownError, ShutdownSignal, SystemShutdownSignal, TERMINATION_SIGNALS,
};

pub(crate) const PROCESS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::process");
