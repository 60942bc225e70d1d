//! Command line interface for multiflash.
//!
//! This module provides argument parsing, logging setup and the `scan`,
//! `flash` and `images` commands.

mod args;
pub mod commands;
mod output;

pub use args::{Args, Command, RuntimeConfig};
pub use output::OutputManager;

use crate::error::{CliError, Result};
use crate::flasher::Orchestrator;

/// Main CLI entry point
pub async fn run() -> Result<i32> {
    let args = Args::parse_args();
    init_logging(args.verbose);

    args.validate()
        .map_err(|reason| CliError::InvalidArguments { reason })?;

    let config = RuntimeConfig::from(&args);
    let orchestrator = Orchestrator::new(args.settings()?)?;

    match &args.command {
        Command::Scan => commands::scan(&orchestrator, &config).await,
        Command::Flash {
            channel,
            secure,
            image,
        } => {
            let request = commands::FlashRequest {
                channel: *channel,
                secure: *secure,
                image: image.clone(),
            };
            commands::flash(&orchestrator, &request, &config).await
        }
        Command::Images => commands::images(&orchestrator, &config),
    }
}

/// Installs the `env_logger` backend.
///
/// `RUST_LOG` wins when set; otherwise warnings are shown, or everything down
/// to `info` with `--verbose`.
fn init_logging(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format_timestamp_millis()
        .try_init();
}
