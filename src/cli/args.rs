//! Command line argument parsing and validation.
//!
//! Settings are layered: built-in defaults, then the TOML settings file, then
//! the options given here.

use crate::error::Result;
use crate::flasher::{MAX_CHANNELS, Settings, SettingsBuilder, SettingsFile};
use clap::{Parser, Subcommand};
use std::{path::PathBuf, time::Duration};

/// Parallel firmware programming across XDS110 probe channels
#[derive(Parser, Debug)]
#[command(
    name = "multiflash",
    version,
    about = "Parallel firmware programming across XDS110 probe channels",
    long_about = "Flashes up to eight boards at once with TI's dslite.

Attached XDS110 probes are enumerated with xdsdfu, each probe is bound to a
channel through its own ccxml target configuration, and one dslite runs per
channel. A channel succeeds only if dslite reports success at the end of its
output.

Usage:
  multiflash scan
  multiflash flash --image image/app.out
  multiflash flash --secure --channel 2
  multiflash --config line3.toml flash --json

Exit code 0 = every started channel reported success."
)]
pub struct Args {
    /// Settings file (default: <config dir>/multiflash/config.toml if present)
    #[arg(short, long, global = true, value_name = "PATH", env = "MULTIFLASH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Path to dslite
    #[arg(long, global = true, value_name = "PATH")]
    pub flash_tool: Option<PathBuf>,

    /// Path to xdsdfu
    #[arg(long, global = true, value_name = "PATH")]
    pub scanner_tool: Option<PathBuf>,

    /// Master ccxml template
    #[arg(long, global = true, value_name = "PATH")]
    pub template: Option<PathBuf>,

    /// Directory for the generated per-channel ccxml files
    #[arg(long, global = true, value_name = "DIR")]
    pub ccxml_dir: Option<PathBuf>,

    /// Directory for the per-channel dslite output files
    #[arg(long, global = true, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Directory holding the .out images
    #[arg(long, global = true, value_name = "DIR")]
    pub image_dir: Option<PathBuf>,

    /// Secure-mode credential file (eight lines)
    #[arg(long, global = true, value_name = "PATH")]
    pub credentials: Option<PathBuf>,

    /// Cap on total successful flashes
    #[arg(long, global = true, value_name = "N")]
    pub max_flash_count: Option<u32>,

    /// Per-channel flashing timeout in seconds
    #[arg(long, global = true, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Show engine progress (equivalent to RUST_LOG=info)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print the final result
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Enumerate probes and generate their ccxml files
    Scan,

    /// Scan, then flash every bound channel (or one)
    Flash {
        /// Flash only this channel
        #[arg(long, value_name = "N")]
        channel: Option<u8>,

        /// Unlock, program the Z1 password and lock the device
        #[arg(long)]
        secure: bool,

        /// Image to program (.out)
        #[arg(long, value_name = "PATH")]
        image: Option<PathBuf>,
    },

    /// List the images in the image directory
    Images,
}

impl Args {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate arguments for consistency
    pub fn validate(&self) -> std::result::Result<(), String> {
        if let Command::Flash {
            channel: Some(channel),
            ..
        } = &self.command
            && !(1..=MAX_CHANNELS).contains(channel)
        {
            return Err(format!(
                "Invalid channel: {channel}. Valid channels: 1-{MAX_CHANNELS}"
            ));
        }

        if self.timeout == Some(0) {
            return Err("Timeout must be at least one second".to_string());
        }

        if let Command::Flash {
            image: Some(image), ..
        } = &self.command
            && image.extension().is_none_or(|ext| ext != "out")
        {
            return Err(format!("Image must be a .out file: {}", image.display()));
        }

        Ok(())
    }

    /// Resolves the engine settings: defaults, then the settings file, then
    /// these options.
    pub fn settings(&self) -> Result<Settings> {
        let file = match &self.config {
            Some(path) => Some(SettingsFile::load(path)?),
            None => match SettingsFile::default_path().filter(|p| p.is_file()) {
                Some(path) => {
                    log::info!("Using settings file {}", path.display());
                    Some(SettingsFile::load(&path)?)
                }
                None => None,
            },
        };

        let mut builder = file.map(SettingsBuilder::from_file).unwrap_or_default();
        if let Some(path) = &self.flash_tool {
            builder = builder.flash_tool(path);
        }
        if let Some(path) = &self.scanner_tool {
            builder = builder.scanner_tool(path);
        }
        if let Some(path) = &self.template {
            builder = builder.master_template(path);
        }
        if let Some(dir) = &self.ccxml_dir {
            builder = builder.generated_dir(dir);
        }
        if let Some(dir) = &self.output_dir {
            builder = builder.output_dir(dir);
        }
        if let Some(dir) = &self.image_dir {
            builder = builder.image_dir(dir);
        }
        if let Some(path) = &self.credentials {
            builder = builder.credential_file(path);
        }
        if let Some(max) = self.max_flash_count {
            builder = builder.max_flash_count(max);
        }
        if let Some(secs) = self.timeout {
            builder = builder.flash_timeout(Duration::from_secs(secs));
        }

        Ok(builder.build()?)
    }
}

/// Configuration derived from command line arguments
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Output manager for terminal output
    output: super::OutputManager,
    json: bool,
}

impl From<&Args> for RuntimeConfig {
    fn from(args: &Args) -> Self {
        Self {
            output: super::OutputManager::new(args.verbose, args.quiet || args.json),
            json: args.json,
        }
    }
}

impl RuntimeConfig {
    /// Get a reference to the output manager
    pub fn output(&self) -> &super::OutputManager {
        &self.output
    }

    /// Whether results are printed as JSON
    pub fn json(&self) -> bool {
        self.json
    }

    /// Print success message if not in quiet mode
    pub fn success(&self, message: &str) -> std::io::Result<()> {
        self.output.success(message)
    }

    /// Print warning message
    pub fn warn(&self, message: &str) -> std::io::Result<()> {
        self.output.warn(message)
    }

    /// Print progress message
    pub fn progress(&self, message: &str) -> std::io::Result<()> {
        self.output.progress(message)
    }

    /// Print section header
    pub fn section(&self, title: &str) -> std::io::Result<()> {
        self.output.section(title)
    }

    /// Print indented text
    pub fn indent(&self, message: &str) -> std::io::Result<()> {
        self.output.indent(message)
    }

    /// Print a value as pretty JSON on stdout
    pub fn print_json<T: serde::Serialize>(&self, value: &T) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flash_with_global_options() {
        let args = Args::try_parse_from([
            "multiflash",
            "flash",
            "--secure",
            "--channel",
            "3",
            "--scanner-tool",
            "/opt/xdsdfu",
            "--json",
        ])
        .unwrap();

        assert!(args.json);
        assert_eq!(args.scanner_tool, Some(PathBuf::from("/opt/xdsdfu")));
        match args.command {
            Command::Flash {
                channel, secure, ..
            } => {
                assert_eq!(channel, Some(3));
                assert!(secure);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn validate_rejects_bad_channel_and_image() {
        let args = Args::try_parse_from(["multiflash", "flash", "--channel", "9"]).unwrap();
        assert!(args.validate().is_err());

        let args = Args::try_parse_from(["multiflash", "flash", "--image", "app.hex"]).unwrap();
        assert!(args.validate().is_err());

        let args = Args::try_parse_from(["multiflash", "scan", "--timeout", "0"]).unwrap();
        assert!(args.validate().is_err());
    }

    #[test]
    fn options_override_settings_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("config.toml");
        std::fs::write(
            &config,
            "flash_tool = \"/from/file/dslite\"\nmax_flash_count = 10\nflash_timeout_secs = 60\n",
        )
        .unwrap();

        let args = Args::try_parse_from([
            "multiflash",
            "--config",
            config.to_str().unwrap(),
            "--max-flash-count",
            "20",
            "scan",
        ])
        .unwrap();
        let settings = args.settings().unwrap();

        assert_eq!(settings.flash_tool(), std::path::Path::new("/from/file/dslite"));
        assert_eq!(settings.max_flash_count(), 20);
        assert_eq!(settings.flash_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn missing_explicit_settings_file_is_an_error() {
        let args =
            Args::try_parse_from(["multiflash", "--config", "/no/such/multiflash.toml", "scan"])
                .unwrap();
        assert!(args.settings().is_err());
    }
}
