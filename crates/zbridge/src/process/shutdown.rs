//! Termination signal handling.
//!
//! Signal handlers only record which signal arrived and write a byte to a
//! self-pipe. The event loop polls the pipe alongside its other inputs and
//! checks the recorded signal once per iteration, so no transport call ever
//! runs in signal context.

use std::io::{self, Write};
use std::os::fd::{AsFd, BorrowedFd};
use std::os::unix::net::UnixStream;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGQUIT, SIGTERM};
use signal_hook::{SigId, flag, low_level};
use thiserror::Error;
use tracing::{debug, info};

use super::PROCESS_TARGET;

/// Signals that shut the bridge down.
pub const TERMINATION_SIGNALS: [i32; 4] = [SIGHUP, SIGINT, SIGQUIT, SIGTERM];

const NO_SIGNAL: usize = 0;

/// Abstraction over shutdown notification mechanisms.
pub trait ShutdownSignal {
    /// Starts listening for termination requests.
    ///
    /// # Errors
    ///
    /// Returns an error when the listener cannot be installed.
    fn install(&mut self) -> Result<(), ShutdownError>;

    /// The signal received so far, if any.
    fn received(&self) -> Option<i32>;

    /// Descriptor that becomes readable once a signal has been received.
    fn wake_fd(&self) -> BorrowedFd<'_>;
}

/// Errors reported by shutdown signal listeners.
#[derive(Debug, Error)]
pub enum ShutdownError {
    /// Creating the wake-up pipe failed.
    #[error("failed to create shutdown pipe: {source}")]
    Pipe {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Installing a signal handler failed.
    #[error("failed to install handler for signal {signal}: {source}")]
    Install {
        /// Signal number.
        signal: i32,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

/// Shutdown listener for [`TERMINATION_SIGNALS`].
///
/// Handlers are removed again when the listener is dropped.
#[derive(Debug)]
pub struct SystemShutdownSignal {
    received: Arc<AtomicUsize>,
    wake_reader: UnixStream,
    wake_writer: UnixStream,
    handlers: Vec<SigId>,
}

impl SystemShutdownSignal {
    /// Creates a listener; no handler is installed until [`install`].
    ///
    /// [`install`]: ShutdownSignal::install
    ///
    /// # Errors
    ///
    /// Returns an error when the wake-up pipe cannot be created.
    pub fn new() -> Result<Self, ShutdownError> {
        let (wake_reader, wake_writer) =
            UnixStream::pair().map_err(|source| ShutdownError::Pipe { source })?;
        for end in [&wake_reader, &wake_writer] {
            end.set_nonblocking(true)
                .map_err(|source| ShutdownError::Pipe { source })?;
        }
        Ok(Self {
            received: Arc::new(AtomicUsize::new(NO_SIGNAL)),
            wake_reader,
            wake_writer,
            handlers: Vec::new(),
        })
    }

    /// Records `signal` as if its handler had run.
    pub fn trigger(&self, signal: i32) {
        self.received
            .store(signal.unsigned_abs() as usize, Ordering::SeqCst);
        if let Err(error) = (&self.wake_writer).write(&[1]) {
            debug!(target: PROCESS_TARGET, %error, "shutdown pipe not written");
        }
    }
}

impl ShutdownSignal for SystemShutdownSignal {
    fn install(&mut self) -> Result<(), ShutdownError> {
        for signal in TERMINATION_SIGNALS {
            let install_error = |source| ShutdownError::Install { signal, source };
            let recorded = flag::register_usize(
                signal,
                Arc::clone(&self.received),
                signal.unsigned_abs() as usize,
            )
            .map_err(install_error)?;
            self.handlers.push(recorded);

            let pipe = self.wake_writer.try_clone().map_err(install_error)?;
            let woken = low_level::pipe::register(signal, pipe).map_err(install_error)?;
            self.handlers.push(woken);
        }
        info!(target: PROCESS_TARGET, signals = ?TERMINATION_SIGNALS, "signal handlers installed");
        Ok(())
    }

    fn received(&self) -> Option<i32> {
        match self.received.load(Ordering::SeqCst) {
            NO_SIGNAL => None,
            signal => i32::try_from(signal).ok(),
        }
    }

    fn wake_fd(&self) -> BorrowedFd<'_> {
        self.wake_reader.as_fd()
    }
}

impl Drop for SystemShutdownSignal {
    fn drop(&mut self) {
        for handler in self.handlers.drain(..) {
            low_level::unregister(handler);
        }
    }
}
