//! Diagnostic log format selection.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Output format for the diagnostic log written to stderr.
///
/// Stdout is reserved for protocol events, so neither format ever reaches it.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LogFormat {
    /// One JSON object per log record.
    #[default]
    Json,
    /// Human-readable single line output.
    Compact,
}

/// Errors encountered while parsing a [`LogFormat`] from text.
pub type LogFormatParseError = strum::ParseError;
