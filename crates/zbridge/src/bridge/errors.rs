//! Fatal bridge errors.

use std::io;

use thiserror::Error;

use crate::dispatch::{DispatchError, ReaderError};
use crate::transport::TransportError;

/// Errors that end the bridge.
///
/// Apart from [`BridgeError::Output`], each error has already been reported
/// to the client by the time it is returned.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The command stream overflowed or could not be read.
    #[error(transparent)]
    Reader(#[from] ReaderError),
    /// A command could not be applied.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    /// Inbound notices could not be polled or received.
    #[error("receive failed: {source}")]
    Receive {
        /// Transport failure.
        #[source]
        source: TransportError,
    },
    /// The personal subscription could not be established.
    #[error("personal subscription failed: {source}")]
    PersonalSubscription {
        /// Transport failure.
        #[source]
        source: TransportError,
    },
    /// The location could not be announced.
    #[error("location announcement failed: {source}")]
    Location {
        /// Transport failure.
        #[source]
        source: TransportError,
    },
    /// Writing to the client failed.
    #[error("failed to write event: {source}")]
    Output {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}
