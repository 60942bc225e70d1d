//! `multiflash scan`

use crate::cli::RuntimeConfig;
use crate::error::Result;
use crate::flasher::{Orchestrator, ScanReport};

/// Enumerates probes and provisions one channel per probe.
///
/// Exits 0 when at least one channel was provisioned.
pub async fn scan(orchestrator: &Orchestrator, config: &RuntimeConfig) -> Result<i32> {
    config.progress("Scanning for XDS110 probes...")?;
    let report = orchestrator.scan_devices().await?;

    if config.json() {
        config.print_json(&report)?;
    } else {
        print_report(&report, config)?;
    }

    Ok(if report.configured_count > 0 { 0 } else { 1 })
}

/// Prints the channel/probe binding.
pub(super) fn print_report(report: &ScanReport, config: &RuntimeConfig) -> Result<()> {
    if report.serials.is_empty() {
        config.warn(&report.message)?;
        return Ok(());
    }

    config.section(&report.message)?;
    for (channel, (serial, configured)) in (1u8..).zip(report.serials.iter().zip(&report.configured))
    {
        if *configured {
            config.indent(&format!("channel {channel}: {serial}"))?;
        } else {
            config.warn(&format!("channel {channel}: {serial} (no ccxml, see log)"))?;
        }
    }
    Ok(())
}
