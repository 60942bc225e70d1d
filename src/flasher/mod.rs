//! Parallel firmware programming engine.
//!
//! Drives up to [`MAX_CHANNELS`] XDS debug probes at once:
//!
//! - [`provision`] - probe enumeration (`xdsdfu -e`) and per-channel ccxml rendering
//! - [`runner`] - one `dslite` attempt per channel, classified from its output
//! - [`state`] - the shared channel table, counters and success cap
//! - [`Orchestrator`] - the control surface tying them together
//!
//! # Example
//!
//! ```no_run
//! use multiflash::flasher::{Orchestrator, SettingsBuilder};
//!
//! # async fn example() -> multiflash::flasher::Result<()> {
//! let settings = SettingsBuilder::new()
//!     .master_template("TMS320F28P550SJ9_LaunchPad.ccxml")
//!     .target_image("image/app.out")
//!     .build()?;
//!
//! let orchestrator = Orchestrator::new(settings)?;
//! orchestrator.scan_devices().await?;
//! orchestrator.start_all(false)?;
//! # Ok(())
//! # }
//! ```

pub mod error;
mod orchestrator;
pub mod provision;
pub mod runner;
pub mod settings;
pub mod state;
pub mod tool_detection;

pub use error::{Error, ErrorCategory, Result};
pub use orchestrator::{CampaignReport, Orchestrator};
pub use provision::ScanReport;
pub use settings::{MAX_CHANNELS, Settings, SettingsBuilder, SettingsFile};
pub use state::{ChannelSnapshot, ChannelStatus, ConfigSnapshot, StatusSnapshot};
