//! Supervises the bridge's launch sequencing.

use std::fs::File;
use std::io::{self, Read, Write};
use std::os::fd::AsFd;

use tracing::{error, info};

use crate::bootstrap::{ConfigLoader, SystemConfigLoader, bootstrap_with};
use crate::bridge::{EventLoop, LoopSettings, Session, Termination};
use crate::dispatch::{BridgeEvent, EventWriter};
use crate::notice::{NoticeTranslator, NumericResolver, SystemResolver};
use crate::transport::{Location, LoopbackTransport};

use super::PROCESS_TARGET;
use super::errors::LaunchError;
use super::shutdown::{ShutdownSignal, SystemShutdownSignal};

/// Runs the bridge over standard input and output.
///
/// Launch failures the bridge did not report itself are written to standard
/// output as an error event before returning.
///
/// # Errors
///
/// Returns the error that stopped the bridge.
pub fn run_bridge() -> Result<Termination, LaunchError> {
    let mut output = io::stdout();
    let result = command_input().and_then(|input| {
        let mut shutdown = SystemShutdownSignal::new()?;
        run_bridge_with(&SystemConfigLoader, input, &mut output, &mut shutdown)
    });
    result.map_err(|failure| report_failure(failure, &mut output))
}

/// Opens the command stream without std's input buffering.
///
/// # Errors
///
/// Returns an error when standard input cannot be duplicated.
pub fn command_input() -> Result<File, LaunchError> {
    io::stdin()
        .as_fd()
        .try_clone_to_owned()
        .map(File::from)
        .map_err(|source| LaunchError::Input { source })
}

/// Runs the bridge with injected collaborators.
///
/// Startup follows a fixed order: configuration and telemetry, signal
/// handlers, the transport session, the personal subscription and the
/// location announcement. The session is released only when the loop ends
/// on request; fatal errors leave it as it was.
///
/// # Errors
///
/// Returns the first error that stopped the bridge.
pub fn run_bridge_with<L, I, W, S>(
    loader: &L,
    input: I,
    output: W,
    shutdown: &mut S,
) -> Result<Termination, LaunchError>
where
    L: ConfigLoader + ?Sized,
    I: Read + AsFd,
    W: Write,
    S: ShutdownSignal,
{
    let bootstrapped = bootstrap_with(loader)?;
    let config = bootstrapped.config();
    shutdown.install()?;

    let identity = config.identity();
    let transport =
        LoopbackTransport::open(identity.as_str()).map_err(|source| LaunchError::Transport { source })?;
    info!(target: PROCESS_TARGET, %identity, "transport session opened");

    let translator = if config.resolve_hostnames() {
        NoticeTranslator::new(SystemResolver)
    } else {
        NoticeTranslator::new(NumericResolver)
    };
    let mut session = Session::new(transport, translator, output);
    session.subscribe_personal(config.subscribe_attempts(), config.subscribe_retry_delay())?;
    session.announce_location(&Location::from(config.location()))?;

    let mut event_loop = EventLoop::new(session, input, LoopSettings::from(config), &*shutdown);
    let termination = event_loop.run()?;
    event_loop.session_mut().shutdown();
    info!(target: PROCESS_TARGET, ?termination, "bridge stopped");
    Ok(termination)
}

fn report_failure<W: Write>(failure: LaunchError, output: W) -> LaunchError {
    error!(target: PROCESS_TARGET, error = %failure, "bridge failed");
    if failure.is_reported() || failure.output_failed() {
        return failure;
    }
    if let Err(source) = EventWriter::new(output).emit(&BridgeEvent::error(failure.to_string())) {
        error!(target: PROCESS_TARGET, %source, "failed to report launch failure");
    }
    failure
}
