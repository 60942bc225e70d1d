//! TOML settings file.

use crate::flasher::error::{ErrorExt, Result};
use std::path::{Path, PathBuf};

/// On-disk settings, every field optional.
///
/// ```toml
/// flash_tool = "C:/ti/uniflash_9.2.0/deskdb/content/TICloudAgent/win/ccs_base/DebugServer/bin/dslite.exe"
/// scanner_tool = "C:/ti/uniflash_9.2.0/deskdb/content/TICloudAgent/win/ccs_base/common/uscif/xds110/xdsdfu.exe"
/// master_template = "TMS320F28P550SJ9_LaunchPad.ccxml"
/// num_channels = 4
/// max_flash_count = 20
/// flash_timeout_secs = 300
/// ```
#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SettingsFile {
    /// Flashing tool path.
    #[serde(default)]
    pub flash_tool: Option<PathBuf>,
    /// Enumeration tool path.
    #[serde(default)]
    pub scanner_tool: Option<PathBuf>,
    /// Master ccxml template.
    #[serde(default)]
    pub master_template: Option<PathBuf>,
    /// Generated artifact directory.
    #[serde(default)]
    pub generated_dir: Option<PathBuf>,
    /// Output sink directory.
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    /// Image directory.
    #[serde(default)]
    pub image_dir: Option<PathBuf>,
    /// Image to program.
    #[serde(default)]
    pub target_image: Option<PathBuf>,
    /// Secure-mode credential file.
    #[serde(default)]
    pub credential_file: Option<PathBuf>,
    /// Initial channel count.
    #[serde(default)]
    pub num_channels: Option<u8>,
    /// Cap on total successful flashes.
    #[serde(default)]
    pub max_flash_count: Option<u32>,
    /// Per-attempt timeout in seconds.
    #[serde(default)]
    pub flash_timeout_secs: Option<u64>,
    /// Enumeration timeout in seconds.
    #[serde(default)]
    pub scan_timeout_secs: Option<u64>,
    /// Spawn stagger in milliseconds.
    #[serde(default)]
    pub spawn_stagger_ms: Option<u64>,
}

impl SettingsFile {
    /// Reads and parses a settings file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).fs_context("reading settings file", path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// Default location: `<config dir>/multiflash/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("multiflash").join("config.toml"))
    }
}
