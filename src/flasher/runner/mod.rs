//! Single-channel flashing attempts.
//!
//! - [`credentials`] - secure-mode parameter file
//! - [`command`] - `dslite` argument assembly
//! - [`classifier`] - output-based verdict
//! - [`worker`] - one attempt end to end

mod classifier;
mod command;
mod credentials;
mod worker;

pub use classifier::{FAILURE_MARKERS, SUCCESS_MARKER, TAIL_LINES, Verdict, classify, classify_file};
pub use command::{CommandBuilder, FlashCommand, flash_args};
pub use credentials::{CREDENTIAL_COUNT, Credentials};
pub use worker::{ChannelWorker, RunRecord};
