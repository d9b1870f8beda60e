//! Defines the error surface for launching the bridge.

use std::io;

use thiserror::Error;

use crate::bootstrap::BootstrapError;
use crate::bridge::BridgeError;
use crate::transport::TransportError;

use super::shutdown::ShutdownError;

/// Errors that stop the bridge process.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// Configuration or telemetry could not be set up.
    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),
    /// Termination signals could not be watched.
    #[error(transparent)]
    Shutdown(#[from] ShutdownError),
    /// The command stream could not be opened.
    #[error("failed to open command input: {source}")]
    Input {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The transport session could not be opened.
    #[error("failed to open transport session: {source}")]
    Transport {
        /// Transport failure.
        #[source]
        source: TransportError,
    },
    /// The bridge failed while running.
    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

impl LaunchError {
    /// Whether the client has already been told about this error.
    #[must_use]
    pub fn is_reported(&self) -> bool {
        matches!(self, Self::Bridge(error) if !matches!(error, BridgeError::Output { .. }))
    }

    /// Whether telling the client is still possible.
    #[must_use]
    pub fn output_failed(&self) -> bool {
        matches!(self, Self::Bridge(BridgeError::Output { .. }))
    }
}
