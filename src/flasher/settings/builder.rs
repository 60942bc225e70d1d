//! Builder for constructing Settings.

use super::{
    DEFAULT_FLASH_TIMEOUT, DEFAULT_SCAN_TIMEOUT, DEFAULT_SPAWN_STAGGER, Settings, SettingsFile,
    validate_max_flash_count, validate_num_channels,
};
use std::{
    path::{Path, PathBuf},
    time::Duration,
};

const DEFAULT_FLASH_TOOL: &str = "dslite";
const DEFAULT_SCANNER_TOOL: &str = "xdsdfu";
const DEFAULT_MASTER_TEMPLATE: &str = "TMS320F28P550SJ9_LaunchPad.ccxml";
const DEFAULT_GENERATED_DIR: &str = "generated_ccxml";
const DEFAULT_IMAGE_DIR: &str = "image";
const DEFAULT_IMAGE_FILE: &str = "led_ex1_blinky_green.out";
const DEFAULT_CREDENTIAL_FILE: &str = "password.txt";
const DEFAULT_MAX_FLASH_COUNT: u32 = 3;

/// Builder for constructing [`Settings`].
///
/// Every field has a default matching a stock UniFlash layout in the working
/// directory, so only the paths that differ need to be set.
///
/// # Examples
///
/// ```no_run
/// use multiflash::flasher::SettingsBuilder;
/// use std::time::Duration;
///
/// # fn example() -> multiflash::flasher::Result<()> {
/// let settings = SettingsBuilder::new()
///     .scanner_tool("/opt/ti/ccs_base/common/uscif/xds110/xdsdfu")
///     .num_channels(4)
///     .flash_timeout(Duration::from_secs(120))
///     .build()?;
/// assert_eq!(settings.num_channels(), 4);
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct SettingsBuilder {
    flash_tool: Option<PathBuf>,
    scanner_tool: Option<PathBuf>,
    master_template: Option<PathBuf>,
    generated_dir: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    image_dir: Option<PathBuf>,
    target_image: Option<PathBuf>,
    credential_file: Option<PathBuf>,
    num_channels: Option<u8>,
    max_flash_count: Option<u32>,
    flash_timeout: Option<Duration>,
    scan_timeout: Option<Duration>,
    spawn_stagger: Option<Duration>,
}

impl SettingsBuilder {
    /// Creates a new settings builder.
    pub fn new() -> Self {
        Default::default()
    }

    /// Seeds a builder from a parsed settings file.
    ///
    /// Fields absent from the file keep their defaults and can still be
    /// overridden with the setters.
    pub fn from_file(file: SettingsFile) -> Self {
        Self {
            flash_tool: file.flash_tool,
            scanner_tool: file.scanner_tool,
            master_template: file.master_template,
            generated_dir: file.generated_dir,
            output_dir: file.output_dir,
            image_dir: file.image_dir,
            target_image: file.target_image,
            credential_file: file.credential_file,
            num_channels: file.num_channels,
            max_flash_count: file.max_flash_count,
            flash_timeout: file.flash_timeout_secs.map(Duration::from_secs),
            scan_timeout: file.scan_timeout_secs.map(Duration::from_secs),
            spawn_stagger: file.spawn_stagger_ms.map(Duration::from_millis),
        }
    }

    /// Sets the flashing tool path.
    ///
    /// Default: `dslite`, resolved through `PATH`
    pub fn flash_tool<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.flash_tool = Some(path.as_ref().to_path_buf());
        self
    }

    /// Sets the enumeration tool path.
    ///
    /// Default: `xdsdfu`, resolved through `PATH`
    pub fn scanner_tool<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.scanner_tool = Some(path.as_ref().to_path_buf());
        self
    }

    /// Sets the master ccxml template.
    pub fn master_template<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.master_template = Some(path.as_ref().to_path_buf());
        self
    }

    /// Sets the directory for generated per-channel artifacts.
    ///
    /// Default: `generated_ccxml`
    pub fn generated_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.generated_dir = Some(path.as_ref().to_path_buf());
        self
    }

    /// Sets the directory for per-channel output sinks.
    ///
    /// Default: current directory
    pub fn output_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.output_dir = Some(path.as_ref().to_path_buf());
        self
    }

    /// Sets the directory listed for selectable images.
    ///
    /// Default: `image`
    pub fn image_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.image_dir = Some(path.as_ref().to_path_buf());
        self
    }

    /// Sets the image to program.
    ///
    /// Default: `<image_dir>/led_ex1_blinky_green.out`
    pub fn target_image<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.target_image = Some(path.as_ref().to_path_buf());
        self
    }

    /// Sets the secure-mode credential file.
    ///
    /// Default: `password.txt`
    pub fn credential_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.credential_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Sets the initial number of active channels (1-8).
    ///
    /// Default: 1
    pub fn num_channels(mut self, num_channels: u8) -> Self {
        self.num_channels = Some(num_channels);
        self
    }

    /// Sets the cap on total successful flashes (1-100).
    ///
    /// Default: 3
    pub fn max_flash_count(mut self, max_flash_count: u32) -> Self {
        self.max_flash_count = Some(max_flash_count);
        self
    }

    /// Sets the per-attempt timeout.
    pub fn flash_timeout(mut self, timeout: Duration) -> Self {
        self.flash_timeout = Some(timeout);
        self
    }

    /// Sets the enumeration timeout.
    pub fn scan_timeout(mut self, timeout: Duration) -> Self {
        self.scan_timeout = Some(timeout);
        self
    }

    /// Sets the delay between worker spawns in a campaign.
    pub fn spawn_stagger(mut self, stagger: Duration) -> Self {
        self.spawn_stagger = Some(stagger);
        self
    }

    /// Builds the settings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`](crate::flasher::Error::InvalidConfig) if the
    /// channel count or the flash cap is out of range.
    pub fn build(self) -> crate::flasher::Result<Settings> {
        let num_channels = self.num_channels.unwrap_or(1);
        validate_num_channels(num_channels)?;

        let max_flash_count = self.max_flash_count.unwrap_or(DEFAULT_MAX_FLASH_COUNT);
        validate_max_flash_count(max_flash_count)?;

        let image_dir = self
            .image_dir
            .unwrap_or_else(|| PathBuf::from(DEFAULT_IMAGE_DIR));
        let target_image = self
            .target_image
            .unwrap_or_else(|| image_dir.join(DEFAULT_IMAGE_FILE));

        Ok(Settings {
            flash_tool: self
                .flash_tool
                .unwrap_or_else(|| PathBuf::from(DEFAULT_FLASH_TOOL)),
            scanner_tool: self
                .scanner_tool
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SCANNER_TOOL)),
            master_template: self
                .master_template
                .unwrap_or_else(|| PathBuf::from(DEFAULT_MASTER_TEMPLATE)),
            generated_dir: self
                .generated_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_GENERATED_DIR)),
            output_dir: self.output_dir.unwrap_or_else(|| PathBuf::from(".")),
            image_dir,
            target_image,
            credential_file: self
                .credential_file
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CREDENTIAL_FILE)),
            num_channels,
            max_flash_count,
            flash_timeout: self.flash_timeout.unwrap_or(DEFAULT_FLASH_TIMEOUT),
            scan_timeout: self.scan_timeout.unwrap_or(DEFAULT_SCAN_TIMEOUT),
            spawn_stagger: self.spawn_stagger.unwrap_or(DEFAULT_SPAWN_STAGGER),
        })
    }
}
