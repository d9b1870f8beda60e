//! Shared fixtures for the bridge test suites.

use std::ffi::OsString;
use std::os::fd::BorrowedFd;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use ortho_config::{OrthoConfig, OrthoError};
use serde_json::Value;
use zbridge_config::Config;

use crate::bootstrap::ConfigLoader;
use crate::bridge::Session;
use crate::notice::{NoticeTranslator, NumericResolver};
use crate::process::{ShutdownError, ShutdownSignal, SystemShutdownSignal};
use crate::transport::LoopbackTransport;

pub const IDENTITY: &str = "alice@LOCAL";

pub type TestSession = Session<LoopbackTransport, Vec<u8>>;

pub fn loopback() -> LoopbackTransport {
    LoopbackTransport::open(IDENTITY).expect("open loopback transport")
}

pub fn session_over(transport: LoopbackTransport) -> TestSession {
    Session::new(transport, NoticeTranslator::new(NumericResolver), Vec::new())
}

pub fn session() -> TestSession {
    session_over(loopback())
}

/// Parses every JSON line written to the client.
pub fn events(output: &[u8]) -> Vec<Value> {
    output
        .split(|byte| *byte == b'\n')
        .filter(|line| !line.is_empty())
        .map(|line| serde_json::from_slice(line).expect("event is valid JSON"))
        .collect()
}

/// Builds a `send` command line.
pub fn send_line(tag: &str, class: &str, recipient: &str, body: &[&str]) -> String {
    serde_json::json!({
        "type": "send",
        "tag": tag,
        "class": class,
        "instance": "PERSONAL",
        "recipient": recipient,
        "body": body,
    })
    .to_string()
}

/// Configuration suited to fast, offline tests.
pub fn test_config() -> Config {
    Config {
        identity: Some(String::from(IDENTITY)),
        numeric_hosts: true,
        subscribe_retry_delay_ms: 0,
        wait_retry_delay_ms: 10,
        ..Config::default()
    }
}

/// Shutdown listener whose signals are raised by the test itself.
#[derive(Debug)]
pub struct TestShutdownSignal {
    inner: SystemShutdownSignal,
    installs: AtomicUsize,
}

impl TestShutdownSignal {
    pub fn new() -> Self {
        Self {
            inner: SystemShutdownSignal::new().expect("create shutdown pipe"),
            installs: AtomicUsize::new(0),
        }
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn trigger(&self, signal: i32) {
        self.inner.trigger(signal);
    }

    pub fn installs(&self) -> usize {
        self.installs.load(Ordering::SeqCst)
    }
}

impl ShutdownSignal for TestShutdownSignal {
    fn install(&mut self) -> Result<(), ShutdownError> {
        self.installs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn received(&self) -> Option<i32> {
        self.inner.received()
    }

    fn wake_fd(&self) -> BorrowedFd<'_> {
        self.inner.wake_fd()
    }
}

/// Lets a test keep a handle on the listener it lends to the bridge.
impl ShutdownSignal for Arc<TestShutdownSignal> {
    fn install(&mut self) -> Result<(), ShutdownError> {
        self.installs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn received(&self) -> Option<i32> {
        self.as_ref().received()
    }

    fn wake_fd(&self) -> BorrowedFd<'_> {
        self.as_ref().wake_fd()
    }
}

/// Loader that intentionally fails by passing invalid CLI arguments.
pub struct FailingConfigLoader;

impl ConfigLoader for FailingConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        let args = vec![
            OsString::from("zbridge"),
            OsString::from("--max-command-bytes"),
            OsString::from("plenty"),
        ];
        Config::load_from_iter(args)
    }
}
