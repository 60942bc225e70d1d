//! Core Settings struct and implementations.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

/// Main settings for flashing operations.
///
/// Constructed via [`SettingsBuilder`](super::SettingsBuilder). Paths are kept as
/// given; the orchestrator resolves the generated-artifact directory to an
/// absolute path on startup.
///
/// # Examples
///
/// ```no_run
/// use multiflash::flasher::SettingsBuilder;
///
/// # fn example() -> multiflash::flasher::Result<()> {
/// let settings = SettingsBuilder::new()
///     .flash_tool("/opt/ti/uniflash/deskdb/content/TICloudAgent/linux/ccs_base/DebugServer/bin/DSLite")
///     .master_template("TMS320F28P550SJ9_LaunchPad.ccxml")
///     .target_image("image/led_ex1_blinky_green.out")
///     .max_flash_count(10)
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct Settings {
    pub(super) flash_tool: PathBuf,
    pub(super) scanner_tool: PathBuf,
    pub(super) master_template: PathBuf,
    pub(super) generated_dir: PathBuf,
    pub(super) output_dir: PathBuf,
    pub(super) image_dir: PathBuf,
    pub(super) target_image: PathBuf,
    pub(super) credential_file: PathBuf,
    pub(super) num_channels: u8,
    pub(super) max_flash_count: u32,
    pub(super) flash_timeout: Duration,
    pub(super) scan_timeout: Duration,
    pub(super) spawn_stagger: Duration,
}

impl Settings {
    /// Returns the flashing tool (`dslite`) path.
    pub fn flash_tool(&self) -> &Path {
        &self.flash_tool
    }

    /// Returns the enumeration tool (`xdsdfu`) path.
    pub fn scanner_tool(&self) -> &Path {
        &self.scanner_tool
    }

    /// Returns the master ccxml template path.
    pub fn master_template(&self) -> &Path {
        &self.master_template
    }

    /// Returns the directory that receives per-channel artifacts.
    pub fn generated_dir(&self) -> &Path {
        &self.generated_dir
    }

    /// Returns the directory holding per-channel output sinks.
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Returns the directory searched for flashable images.
    pub fn image_dir(&self) -> &Path {
        &self.image_dir
    }

    /// Returns the initial image to program.
    pub fn target_image(&self) -> &Path {
        &self.target_image
    }

    /// Returns the secure-mode credential file path.
    pub fn credential_file(&self) -> &Path {
        &self.credential_file
    }

    /// Returns the initial number of active channels.
    pub fn num_channels(&self) -> u8 {
        self.num_channels
    }

    /// Returns the initial cap on total successful flashes.
    pub fn max_flash_count(&self) -> u32 {
        self.max_flash_count
    }

    /// Returns the per-attempt timeout.
    pub fn flash_timeout(&self) -> Duration {
        self.flash_timeout
    }

    /// Returns the enumeration timeout.
    pub fn scan_timeout(&self) -> Duration {
        self.scan_timeout
    }

    /// Returns the delay between worker spawns in a campaign.
    pub fn spawn_stagger(&self) -> Duration {
        self.spawn_stagger
    }

    /// Output sink path for a channel.
    pub fn output_sink(&self, channel: u8) -> PathBuf {
        self.output_dir.join(format!("flash_channel_{channel}.txt"))
    }
}
