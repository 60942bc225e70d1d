//! Serializable views of the orchestration state.

use super::ChannelStatus;
use std::path::PathBuf;

/// Per-channel view.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ChannelSnapshot {
    /// Channel number (1-based).
    pub channel: u8,
    /// Current status.
    pub status: ChannelStatus,
    /// Successful attempts since startup or the last reset.
    pub success_count: u32,
    /// Failed or terminated attempts since startup or the last reset.
    pub fail_count: u32,
    /// Serial of the probe assigned by the last scan.
    pub serial: Option<String>,
    /// Registered configuration artifact.
    pub config_artifact: Option<PathBuf>,
}

/// Status view handed to an outer control layer.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct StatusSnapshot {
    /// True iff any channel is in progress.
    pub is_running: bool,
    /// Active channel count.
    pub num_channels: u8,
    /// Cap on total successes.
    pub max_flash_count: u32,
    /// Sum of success counters over all channels.
    pub total_success: u32,
    /// Sum of fail counters over all channels.
    pub total_fail: u32,
    /// Active channels, in order.
    pub channels: Vec<ChannelSnapshot>,
    /// Serials found by the last scan.
    pub serials: Vec<String>,
}

impl StatusSnapshot {
    /// Looks up a channel by number.
    pub fn channel(&self, channel: u8) -> Option<&ChannelSnapshot> {
        self.channels.iter().find(|c| c.channel == channel)
    }
}

/// Tunable configuration view.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ConfigSnapshot {
    /// Active channel count.
    pub num_channels: u8,
    /// Cap on total successes.
    pub max_flash_count: u32,
    /// Image programmed by new attempts.
    pub target_image: PathBuf,
    /// Flashing tool path.
    pub flash_tool: PathBuf,
    /// Master template path.
    pub master_template: PathBuf,
    /// Artifacts of the active channels.
    pub config_artifacts: Vec<Option<PathBuf>>,
}
