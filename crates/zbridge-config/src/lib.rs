//! Shared configuration for the `zbridge` protocol bridge.
//!
//! Configuration is layered by [`ortho_config`]: built-in defaults, then an
//! optional configuration file, then `ZBRIDGE_*` environment variables, then
//! command-line flags. Every field carries a serde default so a bare
//! invocation resolves to a usable configuration.

mod defaults;
mod logging;

use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use defaults::{
    DEFAULT_LOCATION_EXPOSURE, DEFAULT_LOCATION_HOST, DEFAULT_LOCATION_TTY, DEFAULT_LOG_FILTER,
    DEFAULT_MAX_COMMAND_BYTES, DEFAULT_REALM, DEFAULT_SUBSCRIBE_ATTEMPTS,
    DEFAULT_SUBSCRIBE_RETRY_DELAY_MS, DEFAULT_WAIT_RETRY_DELAY_MS, default_identity,
    default_log_filter_string, default_log_format,
};
pub use logging::{LogFormat, LogFormatParseError};

/// Smallest command buffer accepted; a single `{"type":"quit"}` line must fit.
pub const MIN_COMMAND_BYTES: usize = 64;

/// Resolved bridge configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "ZBRIDGE")]
pub struct Config {
    /// `tracing` filter expression for the diagnostic log.
    #[serde(default = "defaults::default_log_filter_string")]
    pub log_filter: String,
    /// Diagnostic log format.
    #[serde(default = "defaults::default_log_format")]
    pub log_format: LogFormat,
    /// Capacity of the command reader buffer in bytes.
    #[serde(default = "defaults::default_max_command_bytes")]
    pub max_command_bytes: usize,
    /// Backoff after a failed multiplexed wait, in milliseconds.
    #[serde(default = "defaults::default_wait_retry_delay_ms")]
    pub wait_retry_delay_ms: u64,
    /// Attempts made for the initial personal subscription.
    #[serde(default = "defaults::default_subscribe_attempts")]
    pub subscribe_attempts: u32,
    /// Delay between personal subscription attempts, in milliseconds.
    #[serde(default = "defaults::default_subscribe_retry_delay_ms")]
    pub subscribe_retry_delay_ms: u64,
    /// Report origin hosts numerically instead of reverse-resolving them.
    #[serde(default)]
    pub numeric_hosts: bool,
    /// Identity used by the loopback transport; derived from the login name
    /// when absent.
    #[serde(default)]
    pub identity: Option<String>,
    /// Host announced in the location record.
    #[serde(default = "defaults::default_location_host")]
    pub location_host: String,
    /// Terminal announced in the location record.
    #[serde(default = "defaults::default_location_tty")]
    pub location_tty: String,
    /// Exposure level announced in the location record.
    #[serde(default = "defaults::default_location_exposure")]
    pub location_exposure: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_filter: defaults::default_log_filter_string(),
            log_format: defaults::default_log_format(),
            max_command_bytes: defaults::default_max_command_bytes(),
            wait_retry_delay_ms: defaults::default_wait_retry_delay_ms(),
            subscribe_attempts: defaults::default_subscribe_attempts(),
            subscribe_retry_delay_ms: defaults::default_subscribe_retry_delay_ms(),
            numeric_hosts: false,
            identity: None,
            location_host: defaults::default_location_host(),
            location_tty: defaults::default_location_tty(),
            location_exposure: defaults::default_location_exposure(),
        }
    }
}

impl Config {
    /// Filter expression for the diagnostic log.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_str()
    }

    /// Diagnostic log format.
    #[must_use]
    pub fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Capacity of the command reader buffer in bytes.
    #[must_use]
    pub fn max_command_bytes(&self) -> usize {
        self.max_command_bytes
    }

    /// Backoff after a failed multiplexed wait.
    #[must_use]
    pub fn wait_retry_delay(&self) -> Duration {
        Duration::from_millis(self.wait_retry_delay_ms)
    }

    /// Attempts made for the initial personal subscription (at least one).
    #[must_use]
    pub fn subscribe_attempts(&self) -> u32 {
        self.subscribe_attempts.max(1)
    }

    /// Delay between personal subscription attempts.
    #[must_use]
    pub fn subscribe_retry_delay(&self) -> Duration {
        Duration::from_millis(self.subscribe_retry_delay_ms)
    }

    /// Whether origin addresses should be reverse-resolved.
    #[must_use]
    pub fn resolve_hostnames(&self) -> bool {
        !self.numeric_hosts
    }

    /// Identity presented to the transport.
    #[must_use]
    pub fn identity(&self) -> String {
        self.identity
            .clone()
            .filter(|identity| !identity.trim().is_empty())
            .unwrap_or_else(default_identity)
    }

    /// Location record announced once the session is open.
    #[must_use]
    pub fn location(&self) -> LocationSettings<'_> {
        LocationSettings {
            host: self.location_host.as_str(),
            tty: self.location_tty.as_str(),
            exposure: self.location_exposure.as_str(),
        }
    }

    /// Rejects values the bridge cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigValidationError::CommandBufferTooSmall`] when the
    /// command buffer cannot hold a minimal command.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.max_command_bytes < MIN_COMMAND_BYTES {
            return Err(ConfigValidationError::CommandBufferTooSmall {
                configured: self.max_command_bytes,
                minimum: MIN_COMMAND_BYTES,
            });
        }
        Ok(())
    }
}

/// Borrowed view of the configured location record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocationSettings<'a> {
    /// Host name announced to the network.
    pub host: &'a str,
    /// Terminal name announced to the network.
    pub tty: &'a str,
    /// Exposure level controlling who may see the location.
    pub exposure: &'a str,
}

/// Semantic problems found after the layers have been merged.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigValidationError {
    /// The command buffer is too small to hold any useful command.
    #[error("max_command_bytes {configured} is below the minimum of {minimum}")]
    CommandBufferTooSmall {
        /// Configured capacity.
        configured: usize,
        /// Smallest accepted capacity.
        minimum: usize,
    },
}
