//! `multiflash flash`

use super::scan::print_report;
use crate::cli::RuntimeConfig;
use crate::error::{CliError, Result};
use crate::flasher::{ChannelStatus, Orchestrator, StatusSnapshot};
use std::{path::PathBuf, time::Duration};

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Options of one `flash` invocation.
#[derive(Debug, Clone, Default)]
pub struct FlashRequest {
    /// Single channel to flash, or all bound channels.
    pub channel: Option<u8>,
    /// Secure (unlock/password/lock) mode.
    pub secure: bool,
    /// Image overriding the configured one.
    pub image: Option<PathBuf>,
}

/// Scans, starts the campaign and waits for every channel to settle.
///
/// Ctrl-C stops all channels. Exits 0 only if every started channel
/// succeeded; 130 when interrupted.
pub async fn flash(
    orchestrator: &Orchestrator,
    request: &FlashRequest,
    config: &RuntimeConfig,
) -> Result<i32> {
    if let Some(image) = &request.image {
        orchestrator.set_target_image(image)?;
    }

    config.progress("Scanning for XDS110 probes...")?;
    let report = orchestrator.scan_devices().await?;
    if !config.json() {
        print_report(&report, config)?;
    }
    if report.configured_count == 0 {
        return Err(CliError::ExecutionFailed {
            command: "flash".to_string(),
            reason: "no channel could be bound to a probe".to_string(),
        }
        .into());
    }

    let image = orchestrator.target_image();
    config.section(&format!(
        "Flashing {}{}",
        image.display(),
        if request.secure { " (secure)" } else { "" }
    ))?;

    let started = match request.channel {
        Some(channel) => {
            config.progress(&orchestrator.start_channel(channel, request.secure)?)?;
            vec![channel]
        }
        None => {
            let campaign = orchestrator.start_all(request.secure)?;
            if campaign.config_errors.is_empty() {
                config.progress(&campaign.message)?;
            } else {
                config.warn(&campaign.message)?;
            }
            campaign.started
        }
    };

    let interrupted = wait_until_idle(orchestrator, config).await?;
    let status = orchestrator.status();

    if config.json() {
        config.print_json(&status)?;
    } else {
        print_summary(&status, config)?;
    }

    if interrupted {
        return Ok(130);
    }
    let all_succeeded = !started.is_empty()
        && started.iter().all(|channel| {
            status
                .channel(*channel)
                .is_some_and(|c| c.status == ChannelStatus::Success)
        });
    Ok(if all_succeeded { 0 } else { 1 })
}

/// Polls until no channel is in progress. Returns whether Ctrl-C stopped the
/// campaign.
async fn wait_until_idle(orchestrator: &Orchestrator, config: &RuntimeConfig) -> Result<bool> {
    let mut ticker = tokio::time::interval(POLL_INTERVAL);
    let mut last_running = Vec::new();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let status = orchestrator.status();
                if !status.is_running {
                    return Ok(false);
                }
                let running: Vec<u8> = status
                    .channels
                    .iter()
                    .filter(|c| c.status.is_in_progress())
                    .map(|c| c.channel)
                    .collect();
                if running != last_running {
                    config.output().verbose(&format!("in progress: {running:?}"))?;
                    last_running = running;
                }
            }
            signal = &mut ctrl_c => {
                signal?;
                config.warn(&orchestrator.stop_all())?;
                return Ok(true);
            }
        }
    }
}

fn print_summary(status: &StatusSnapshot, config: &RuntimeConfig) -> Result<()> {
    config.section("Result")?;
    for channel in &status.channels {
        let serial = channel.serial.as_deref().unwrap_or("-");
        let line = format!(
            "channel {} [{}]: {} ({} ok / {} failed)",
            channel.channel, serial, channel.status, channel.success_count, channel.fail_count
        );
        match channel.status {
            ChannelStatus::Success => config.success(&line)?,
            ChannelStatus::NotStarted => config.indent(&line)?,
            _ => config.warn(&line)?,
        }
    }
    config.progress(&format!(
        "Total: {} succeeded, {} failed (cap {})",
        status.total_success, status.total_fail, status.max_flash_count
    ))?;
    Ok(())
}
