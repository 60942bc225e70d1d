//! XDS110 probe enumeration.

use super::{ConfigTemplateRenderer, prepare_artifact_dir};
use crate::flasher::{
    Error, Result, settings::MAX_CHANNELS, state::OrchestrationState, tool_detection,
};
use regex::Regex;
use std::{
    path::PathBuf,
    process::Stdio,
    sync::LazyLock,
    time::Duration,
};
use tokio::process::Command;

static SERIAL_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Serial Num:\s+([A-Za-z0-9]+)").expect("serial line pattern is valid")
});

/// Extracts probe serials from enumeration output, in order of appearance.
pub fn extract_serials(output: &str) -> Vec<String> {
    SERIAL_LINE
        .captures_iter(output)
        .map(|caps| caps[1].to_string())
        .collect()
}

/// Outcome of a scan.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ScanReport {
    /// Serials found, at most one per channel.
    pub serials: Vec<String>,
    /// Whether channel `i + 1` got a configuration artifact.
    pub configured: Vec<bool>,
    /// Number of channels provisioned.
    pub configured_count: usize,
    /// Operator-facing summary.
    pub message: String,
}

impl ScanReport {
    /// Number of probes found.
    pub fn count(&self) -> usize {
        self.serials.len()
    }
}

/// Runs the enumeration tool and provisions one channel per probe.
#[derive(Debug, Clone)]
pub struct DeviceScanner {
    tool: PathBuf,
    timeout: Duration,
}

impl DeviceScanner {
    /// Creates a scanner around the `xdsdfu` binary.
    pub fn new(tool: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            tool: tool.into(),
            timeout,
        }
    }

    /// Lists connected probe serials, capped at eight.
    ///
    /// # Errors
    ///
    /// - [`Error::ScannerToolMissing`] if the tool cannot be found
    /// - [`Error::ScanTimeout`] if it does not finish in time
    /// - [`Error::ScanError`] if it cannot be run
    pub async fn enumerate(&self) -> Result<Vec<String>> {
        let tool = tool_detection::resolve_tool(&self.tool).ok_or_else(|| {
            Error::ScannerToolMissing {
                path: self.tool.clone(),
            }
        })?;

        let output = Command::new(&tool)
            .arg("-e")
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();
        let output = match tokio::time::timeout(self.timeout, output).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(Error::ScanError(format!(
                    "failed to run {}: {}",
                    tool.display(),
                    e
                )));
            }
            Err(_elapsed) => {
                return Err(Error::ScanTimeout {
                    secs: self.timeout.as_secs(),
                });
            }
        };

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        log::debug!(
            "{} -e exited with {:?}",
            tool.display(),
            output.status.code()
        );

        let mut serials = extract_serials(&combined);
        if serials.len() > usize::from(MAX_CHANNELS) {
            log::warn!(
                "Found {} probes, only the first {} are used",
                serials.len(),
                MAX_CHANNELS
            );
            serials.truncate(usize::from(MAX_CHANNELS));
        }
        Ok(serials)
    }

    /// Enumerates probes and renders one artifact per probe.
    ///
    /// Probe `i` is assigned to channel `i + 1`. Artifacts and serials from
    /// the previous scan are discarded once enumeration succeeds. A render
    /// failure only leaves that channel unprovisioned. The active channel count
    /// becomes the number of channels provisioned, unless that is zero.
    ///
    /// The table is claimed for the whole scan: it fails with
    /// [`Error::CampaignInProgress`] while any channel is flashing, and no
    /// channel can start until it returns.
    pub async fn scan(
        &self,
        renderer: &ConfigTemplateRenderer,
        artifact_dir: &std::path::Path,
        state: &OrchestrationState,
    ) -> Result<ScanReport> {
        let _claim = state.begin_scan()?;
        let serials = self.enumerate().await?;

        state.clear_provisioning();
        let purged = prepare_artifact_dir(artifact_dir)?;
        if purged > 0 {
            log::debug!("Removed {} superseded ccxml file(s)", purged);
        }
        state.set_serials(serials.clone());

        if serials.is_empty() {
            return Ok(ScanReport {
                serials,
                configured: Vec::new(),
                configured_count: 0,
                message: "No debug probes found".to_string(),
            });
        }

        let mut configured = Vec::with_capacity(serials.len());
        for (channel, serial) in (1u8..).zip(&serials) {
            match renderer.provision(state, channel, serial) {
                Ok(_) => {
                    log::info!("Channel {} bound to probe {}", channel, serial);
                    configured.push(true);
                }
                Err(e) => {
                    log::error!("Channel {} could not bind probe {}: {}", channel, serial, e);
                    configured.push(false);
                }
            }
        }

        let configured_count = configured.iter().filter(|c| **c).count();
        if configured_count > 0 {
            // At most MAX_CHANNELS serials are kept.
            state.set_num_channels(configured_count as u8)?;
        }

        Ok(ScanReport {
            message: format!(
                "Found {} probe(s), {} configured",
                serials.len(),
                configured_count
            ),
            serials,
            configured,
            configured_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_serials_in_order() {
        let output = "\
USB Device Firmware Upgrade Utility
Copyright (c) 2008-2019 Texas Instruments Incorporated.

Scanning USB buses for supported XDS110 devices...

<<<< Device 0 >>>>

VID: 0x0451    PID: 0xbef3
Device Name: XDS110 with CMSIS-DAP
Version: 3.0.0.20
Manufacturer: Texas Instruments
Serial Num: L1100A4B
Mode: Runtime
Configuration: Standard

<<<< Device 1 >>>>

Serial Num:   CL390123
Mode: Runtime

Found 2 devices.
";
        assert_eq!(extract_serials(output), vec!["L1100A4B", "CL390123"]);
    }

    #[test]
    fn no_devices_is_empty() {
        assert!(extract_serials("Found 0 devices.\n").is_empty());
        assert!(extract_serials("Serial Num: \n").is_empty());
    }

    #[tokio::test]
    async fn missing_tool_is_reported() {
        let scanner = DeviceScanner::new(
            "/nonexistent/ti/xdsdfu-for-tests",
            Duration::from_secs(1),
        );
        assert!(matches!(
            scanner.enumerate().await,
            Err(Error::ScannerToolMissing { .. })
        ));
    }
}
