//! Parallel firmware programming for XDS110 debug probes.
//!
//! This library drives TI's `dslite` flashing tool on up to eight probes at
//! once:
//! - discovers attached probes with `xdsdfu -e`
//! - renders one ccxml target configuration per probe
//! - runs one `dslite` per channel and classifies its output
//!
//! It can be used both as a CLI tool and as a library dependency.

pub mod cli;
pub mod error;
pub mod flasher;

// Re-export commonly used types
pub use error::{CliError, FlasherError, Result};
