//! Single-threaded multiplexing of the command stream and the transport.

use std::io::{Read, Write};
use std::os::fd::AsFd;
use std::process::ExitCode;
use std::thread;
use std::time::Duration;

use nix::errno::Errno;
use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
use tracing::{debug, info};

use crate::dispatch::{CommandReader, ReadStatus};
use crate::process::ShutdownSignal;
use crate::transport::Transport;

use super::BRIDGE_TARGET;
use super::errors::BridgeError;
use super::session::{Flow, Session};

/// Tunables for [`EventLoop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopSettings {
    /// Bound on a single command line.
    pub max_command_bytes: usize,
    /// Pause after a failed wait.
    pub wait_retry_delay: Duration,
}

impl From<&zbridge_config::Config> for LoopSettings {
    fn from(config: &zbridge_config::Config) -> Self {
        Self {
            max_command_bytes: config.max_command_bytes(),
            wait_retry_delay: config.wait_retry_delay(),
        }
    }
}

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The client sent `quit`.
    Quit,
    /// A termination signal arrived.
    Signal(i32),
}

impl Termination {
    /// Process exit status for this termination.
    ///
    /// The bridge has no successful exit: quitting and signals report
    /// failure just like fatal errors.
    #[must_use]
    pub fn exit_code(self) -> ExitCode {
        ExitCode::FAILURE
    }
}

/// Blocking readiness wait over a set of descriptors.
pub trait Poller {
    /// Waits until one of `fds` is ready, without a timeout.
    ///
    /// # Errors
    ///
    /// Returns the errno reported by the wait.
    fn wait(&mut self, fds: &mut [PollFd<'_>]) -> Result<usize, Errno>;
}

/// [`Poller`] backed by `poll(2)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemPoller;

impl Poller for SystemPoller {
    fn wait(&mut self, fds: &mut [PollFd<'_>]) -> Result<usize, Errno> {
        let ready = poll(fds, PollTimeout::NONE)?;
        Ok(usize::try_from(ready).unwrap_or_default())
    }
}

/// Event loop driving a [`Session`].
///
/// Each iteration handles every notice the transport has ready, then blocks
/// until the command stream, the transport or the shutdown signal becomes
/// readable, and finally reads whatever commands have arrived.
pub struct EventLoop<'s, T, W, I, S: ?Sized> {
    session: Session<T, W>,
    reader: CommandReader<I>,
    shutdown: &'s S,
    poller: Box<dyn Poller>,
    input_open: bool,
    wait_retry_delay: Duration,
}

impl<'s, T, W, I, S> EventLoop<'s, T, W, I, S>
where
    T: Transport,
    W: Write,
    I: Read + AsFd,
    S: ShutdownSignal + ?Sized,
{
    /// Creates a loop reading commands from `input`.
    pub fn new(session: Session<T, W>, input: I, settings: LoopSettings, shutdown: &'s S) -> Self {
        Self {
            session,
            reader: CommandReader::new(input, settings.max_command_bytes),
            shutdown,
            poller: Box::new(SystemPoller),
            input_open: true,
            wait_retry_delay: settings.wait_retry_delay,
        }
    }

    /// Replaces the readiness wait used by the loop.
    #[must_use]
    pub fn with_poller(mut self, poller: impl Poller + 'static) -> Self {
        self.poller = Box::new(poller);
        self
    }

    /// Runs until the client quits or a termination signal arrives.
    ///
    /// The session is left open; call [`Session::shutdown`] afterwards.
    ///
    /// # Errors
    ///
    /// Returns the fatal [`BridgeError`] that stopped the loop.
    pub fn run(&mut self) -> Result<Termination, BridgeError> {
        loop {
            if let Some(signal) = self.shutdown.received() {
                info!(target: BRIDGE_TARGET, signal, "termination signal received");
                return Ok(Termination::Signal(signal));
            }

            self.session.drain_notices()?;

            match self.wait() {
                Ok(false) => {}
                Ok(true) => {
                    if self.read_commands()? == Flow::Quit {
                        info!(target: BRIDGE_TARGET, "quit requested");
                        return Ok(Termination::Quit);
                    }
                }
                Err(Errno::EINTR | Errno::EAGAIN) => {}
                Err(errno) => {
                    self.session.report_error(format!("wait failed: {errno}"))?;
                    thread::sleep(self.wait_retry_delay);
                }
            }
        }
    }

    /// Blocks until something is readable; returns whether commands are.
    fn wait(&mut self) -> Result<bool, Errno> {
        let mut fds = Vec::with_capacity(3);
        fds.push(PollFd::new(self.shutdown.wake_fd(), PollFlags::POLLIN));
        fds.push(PollFd::new(
            self.session.transport().readiness_fd(),
            PollFlags::POLLIN,
        ));
        if self.input_open {
            fds.push(PollFd::new(self.reader.source().as_fd(), PollFlags::POLLIN));
        }

        self.poller.wait(&mut fds)?;

        let input_ready = self.input_open
            && fds.get(2).and_then(|fd| fd.revents()).is_some_and(|events| {
                events.intersects(PollFlags::POLLIN | PollFlags::POLLHUP | PollFlags::POLLERR)
            });
        Ok(input_ready)
    }

    /// Reads available input and handles every complete record.
    ///
    /// Records following a `quit` in the same read are not handled.
    fn read_commands(&mut self) -> Result<Flow, BridgeError> {
        let status = match self.reader.fill() {
            Ok(status) => status,
            Err(error) => return Err(self.session.fail(error.into())),
        };

        while let Some(record) = self.reader.next_record() {
            if self.session.handle_record(&record)? == Flow::Quit {
                return Ok(Flow::Quit);
            }
        }

        if status == ReadStatus::Closed {
            self.input_open = false;
            let dropped = self.reader.discard_partial();
            if dropped > 0 {
                debug!(target: BRIDGE_TARGET, dropped, "discarded unterminated command");
            }
            info!(
                target: BRIDGE_TARGET,
                "command stream closed; serving the transport until a termination signal"
            );
            return Ok(Flow::Continue);
        }

        if let Err(error) = self.reader.check_overflow() {
            return Err(self.session.fail(error.into()));
        }
        Ok(Flow::Continue)
    }

    /// The session driven by this loop.
    pub fn session(&self) -> &Session<T, W> {
        &self.session
    }

    /// The session driven by this loop, mutably.
    pub fn session_mut(&mut self) -> &mut Session<T, W> {
        &mut self.session
    }

    /// Whether the command stream is still being read.
    pub fn input_open(&self) -> bool {
        self.input_open
    }

    /// Stops the loop and hands back the session.
    pub fn into_session(self) -> Session<T, W> {
        self.session
    }
}
