//! Error types for channel orchestration.
//!
//! Every failure the engine can report maps onto one [`ErrorCategory`], which
//! is what an outer layer (HTTP, CLI) uses to decide how to present it.

use std::{
    io,
    path::{Path, PathBuf},
};
use thiserror::Error;

/// Result type alias for orchestration operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of [`Error`] values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Missing or malformed template, artifact, credentials or settings.
    Configuration,
    /// External tool missing, failed to spawn, or timed out.
    ToolInvocation,
    /// Start rejected by the success cap or a re-entrancy guard.
    Capacity,
    /// Device enumeration failed.
    Scan,
}

/// Errors raised by the orchestration engine.
#[derive(Error, Debug)]
pub enum Error {
    /// Master configuration template does not exist.
    #[error("master configuration template not found: {}", path.display())]
    TemplateMissing {
        /// Expected template location
        path: PathBuf,
    },

    /// Template has no serial-number field to substitute.
    #[error("serial number field not found in template {}", path.display())]
    SubstitutionNotFound {
        /// Template that was searched
        path: PathBuf,
    },

    /// Template has more than one serial-number field.
    #[error("template {} has {count} serial number fields, expected exactly one", path.display())]
    AmbiguousSubstitution {
        /// Template that was searched
        path: PathBuf,
        /// Number of matching fields
        count: usize,
    },

    /// Rendered artifact could not be written.
    #[error("failed to write configuration artifact {}: {source}", path.display())]
    WriteFailed {
        /// Artifact path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Credential file is missing or does not hold exactly eight entries.
    #[error("invalid credential source {}: {reason}", path.display())]
    CredentialSourceInvalid {
        /// Credential file path
        path: PathBuf,
        /// What was wrong with it
        reason: String,
    },

    /// No configuration artifact is registered (or it vanished) for a channel.
    #[error("channel {channel} has no configuration artifact")]
    ArtifactMissing {
        /// Channel number
        channel: u8,
    },

    /// Channel number outside the configured range.
    #[error("invalid channel: {channel} (valid range 1-{max})")]
    InvalidChannel {
        /// Requested channel
        channel: u8,
        /// Highest valid channel
        max: u8,
    },

    /// Rejected configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Total successes reached the configured cap.
    #[error("maximum flash count ({max}) reached")]
    CapReached {
        /// Configured cap
        max: u32,
    },

    /// Channel already has an attempt in flight.
    #[error("channel {channel} is already flashing")]
    AlreadyInProgress {
        /// Channel number
        channel: u8,
    },

    /// A campaign (or any channel) is still running.
    #[error("a flashing campaign is already in progress")]
    CampaignInProgress,

    /// A device scan is replacing the channel artifacts.
    #[error("a device scan is in progress")]
    ScanInProgress,

    /// Enumeration tool binary not found.
    #[error("device scanner not found: {}", path.display())]
    ScannerToolMissing {
        /// Configured scanner path
        path: PathBuf,
    },

    /// Enumeration tool did not finish in time.
    #[error("device scan timed out after {secs}s")]
    ScanTimeout {
        /// Timeout in seconds
        secs: u64,
    },

    /// Enumeration tool could not be run.
    #[error("device scan failed: {0}")]
    ScanError(String),

    /// Flashing tool binary not found.
    #[error("flashing tool not found: {}", path.display())]
    ToolMissing {
        /// Configured tool path
        path: PathBuf,
    },

    /// External command could not be spawned or awaited.
    #[error("command `{command}` failed: {error}")]
    CommandFailed {
        /// Program that was run
        command: String,
        /// Underlying I/O error
        error: io::Error,
    },

    /// External command exceeded its time budget.
    #[error("command `{command}` timed out after {secs}s")]
    Timeout {
        /// Program that was run
        command: String,
        /// Timeout in seconds
        secs: u64,
    },

    /// I/O error with the file it concerned.
    #[error("{context} {}: {error}", path.display())]
    Fs {
        /// What was being done
        context: &'static str,
        /// File involved
        path: PathBuf,
        /// Underlying I/O error
        error: io::Error,
    },

    /// Bare I/O error.
    #[error("{0}")]
    IoError(#[from] io::Error),

    /// Settings file could not be parsed.
    #[error("failed to parse settings: {0}")]
    Toml(#[from] toml::de::Error),

    /// Anything else.
    #[error("{0}")]
    GenericError(String),
}

impl Error {
    /// Returns the taxonomy bucket for this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::TemplateMissing { .. }
            | Error::SubstitutionNotFound { .. }
            | Error::AmbiguousSubstitution { .. }
            | Error::WriteFailed { .. }
            | Error::CredentialSourceInvalid { .. }
            | Error::ArtifactMissing { .. }
            | Error::InvalidChannel { .. }
            | Error::InvalidConfig(_)
            | Error::Toml(_) => ErrorCategory::Configuration,
            Error::CapReached { .. }
            | Error::AlreadyInProgress { .. }
            | Error::CampaignInProgress
            | Error::ScanInProgress => ErrorCategory::Capacity,
            Error::ScannerToolMissing { .. } | Error::ScanTimeout { .. } | Error::ScanError(_) => {
                ErrorCategory::Scan
            }
            Error::ToolMissing { .. }
            | Error::CommandFailed { .. }
            | Error::Timeout { .. }
            | Error::Fs { .. }
            | Error::IoError(_)
            | Error::GenericError(_) => ErrorCategory::ToolInvocation,
        }
    }
}

/// Attaches a description and a path to I/O errors.
pub trait ErrorExt<T> {
    /// Converts the error into [`Error::Fs`].
    fn fs_context(self, context: &'static str, path: impl AsRef<Path>) -> Result<T>;
}

impl<T> ErrorExt<T> for std::result::Result<T, io::Error> {
    fn fs_context(self, context: &'static str, path: impl AsRef<Path>) -> Result<T> {
        self.map_err(|error| Error::Fs {
            context,
            path: path.as_ref().to_path_buf(),
            error,
        })
    }
}

/// Returns early with an [`Error::GenericError`] built from a format string.
#[macro_export]
macro_rules! bail {
    ($($arg:tt)*) => {
        return Err($crate::flasher::Error::GenericError(format!($($arg)*)))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_errors_are_categorised() {
        assert_eq!(
            Error::CapReached { max: 3 }.category(),
            ErrorCategory::Capacity
        );
        assert_eq!(
            Error::AlreadyInProgress { channel: 2 }.category(),
            ErrorCategory::Capacity
        );
        assert_eq!(Error::CampaignInProgress.category(), ErrorCategory::Capacity);
        assert_eq!(Error::ScanInProgress.category(), ErrorCategory::Capacity);
    }

    #[test]
    fn fs_context_keeps_path() {
        let err = std::fs::read("/definitely/not/here")
            .fs_context("reading", "/definitely/not/here")
            .unwrap_err();
        assert!(err.to_string().starts_with("reading /definitely/not/here"));
        assert_eq!(err.category(), ErrorCategory::ToolInvocation);
    }
}
