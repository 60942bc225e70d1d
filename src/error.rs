//! Top-level error types for the command line front end.
//!
//! This module wraps engine errors together with CLI and I/O failures and
//! attaches operator-facing recovery hints.

use crate::flasher::{self, ErrorCategory};
use thiserror::Error;

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, FlasherError>;

/// Main error type for the command line front end
#[derive(Error, Debug)]
pub enum FlasherError {
    /// CLI argument errors
    #[error("CLI error: {0}")]
    Cli(#[from] CliError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Engine errors
    #[error("{0}")]
    Flasher(#[from] flasher::Error),
}

/// CLI-specific errors
#[derive(Error, Debug)]
pub enum CliError {
    /// Invalid command line arguments
    #[error("Invalid arguments: {reason}")]
    InvalidArguments {
        /// Reason for the error
        reason: String,
    },

    /// Command execution failed
    #[error("Command execution failed: {command} - {reason}")]
    ExecutionFailed {
        /// Command that failed
        command: String,
        /// Reason for the error
        reason: String,
    },
}

impl FlasherError {
    /// Get actionable recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<String> {
        let Self::Flasher(error) = self else {
            return vec!["Check the error message above for specific details".to_string()];
        };

        match error {
            flasher::Error::ScannerToolMissing { .. } => vec![
                "Install UniFlash or pass --scanner-tool with the full path to xdsdfu".to_string(),
            ],
            flasher::Error::ToolMissing { .. } => vec![
                "Install UniFlash or pass --flash-tool with the full path to dslite".to_string(),
            ],
            flasher::Error::TemplateMissing { .. } | flasher::Error::SubstitutionNotFound { .. } => {
                vec![
                    "Pass --template with a ccxml exported from UniFlash for the target device"
                        .to_string(),
                    "The probe must be selected by serial number in that ccxml".to_string(),
                ]
            }
            flasher::Error::CredentialSourceInvalid { .. } => vec![
                "The credential file must hold exactly eight non-empty lines".to_string(),
            ],
            flasher::Error::CapReached { .. } => vec![
                "Raise --max-flash-count or restart to reset the counters".to_string(),
            ],
            _ => match error.category() {
                ErrorCategory::Scan => {
                    vec!["Check that the probes are connected and not claimed by another tool".to_string()]
                }
                ErrorCategory::ToolInvocation => {
                    vec!["Run with RUST_LOG=debug to see the exact command line".to_string()]
                }
                _ => vec!["Check the configuration file and command line options".to_string()],
            },
        }
    }
}
