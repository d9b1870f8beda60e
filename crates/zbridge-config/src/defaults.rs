use std::env;

use crate::logging::LogFormat;

/// Default log filter expression.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Largest command line the reader buffers before giving up.
pub const DEFAULT_MAX_COMMAND_BYTES: usize = 128 * 1024;

/// Delay after a failed multiplexed wait, in milliseconds.
pub const DEFAULT_WAIT_RETRY_DELAY_MS: u64 = 1000;

/// Attempts made for the initial personal subscription.
pub const DEFAULT_SUBSCRIBE_ATTEMPTS: u32 = 3;

/// Delay between personal subscription attempts, in milliseconds.
pub const DEFAULT_SUBSCRIBE_RETRY_DELAY_MS: u64 = 2000;

/// Host announced in the location record.
pub const DEFAULT_LOCATION_HOST: &str = "cloud";

/// Terminal announced in the location record.
pub const DEFAULT_LOCATION_TTY: &str = "zbridge";

/// Exposure level announced in the location record.
pub const DEFAULT_LOCATION_EXPOSURE: &str = "OPSTAFF";

/// Realm appended to the login name when deriving the default identity.
pub const DEFAULT_REALM: &str = "LOCAL";

/// Owned log filter value used where allocation is required (e.g. serde).
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default diagnostic log format.
pub fn default_log_format() -> LogFormat {
    LogFormat::Json
}

pub(crate) fn default_max_command_bytes() -> usize {
    DEFAULT_MAX_COMMAND_BYTES
}

pub(crate) fn default_wait_retry_delay_ms() -> u64 {
    DEFAULT_WAIT_RETRY_DELAY_MS
}

pub(crate) fn default_subscribe_attempts() -> u32 {
    DEFAULT_SUBSCRIBE_ATTEMPTS
}

pub(crate) fn default_subscribe_retry_delay_ms() -> u64 {
    DEFAULT_SUBSCRIBE_RETRY_DELAY_MS
}

pub(crate) fn default_location_host() -> String {
    DEFAULT_LOCATION_HOST.to_owned()
}

pub(crate) fn default_location_tty() -> String {
    DEFAULT_LOCATION_TTY.to_owned()
}

pub(crate) fn default_location_exposure() -> String {
    DEFAULT_LOCATION_EXPOSURE.to_owned()
}

/// Computes the identity used when none is configured.
///
/// The login name comes from `USER` (or `LOGNAME`), falling back to
/// `nobody`, and is qualified with [`DEFAULT_REALM`].
pub fn default_identity() -> String {
    let user = env::var("USER")
        .or_else(|_| env::var("LOGNAME"))
        .ok()
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| String::from("nobody"));
    format!("{user}@{DEFAULT_REALM}")
}
