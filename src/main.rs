//! Multiflash - parallel firmware programming across XDS110 probe channels.
//!
//! Scans attached debug probes, binds each to a channel and flashes them all
//! with `dslite`, reporting a per-channel verdict.

use multiflash::cli;
use std::process;

#[tokio::main]
async fn main() {
    // Run CLI and get exit code
    let exit_code = match cli::run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            for suggestion in e.recovery_suggestions() {
                eprintln!("  hint: {}", suggestion);
            }
            1
        }
    };

    process::exit(exit_code);
}
