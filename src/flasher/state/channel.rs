//! Channel status machine.

use std::{fmt, path::PathBuf};

/// Status of one programmer channel.
///
/// `NotStarted` is initial. `InProgress` is entered only through the state
/// table's guarded transition. Every other variant is terminal for the current
/// attempt and may be restarted.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ChannelStatus {
    /// No attempt since startup.
    #[default]
    NotStarted,
    /// An attempt is running.
    InProgress,
    /// Last attempt was classified as successful.
    Success,
    /// Last attempt failed; `reason` carries the exit code or invocation error.
    Failure {
        /// Human-readable cause
        reason: String,
    },
    /// Attempt could not start because configuration was missing or invalid.
    ConfigError {
        /// Human-readable cause
        reason: String,
    },
    /// Attempt was stopped by the operator.
    Terminated,
}

impl ChannelStatus {
    /// Whether an attempt is in flight.
    pub fn is_in_progress(&self) -> bool {
        matches!(self, ChannelStatus::InProgress)
    }
}

impl fmt::Display for ChannelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelStatus::NotStarted => f.write_str("not started"),
            ChannelStatus::InProgress => f.write_str("flashing"),
            ChannelStatus::Success => f.write_str("success"),
            ChannelStatus::Failure { reason } => write!(f, "failed ({reason})"),
            ChannelStatus::ConfigError { reason } => write!(f, "configuration error: {reason}"),
            ChannelStatus::Terminated => f.write_str("terminated"),
        }
    }
}

/// Handle for one accepted attempt.
///
/// The `id` is the channel's attempt generation at the moment the attempt was
/// accepted. A verdict is only recorded while the channel is still
/// `InProgress` with the same generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempt {
    /// Channel number (1-based).
    pub channel: u8,
    /// Attempt generation.
    pub id: u64,
    /// Configuration artifact registered when the attempt was accepted.
    pub artifact: PathBuf,
}

/// Verdict a worker reports back to the state table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// Flash succeeded.
    Success,
    /// Flash failed; counts towards the fail counter.
    Failure(String),
    /// Configuration problem discovered mid-attempt; no counter is touched.
    ConfigError(String),
}
