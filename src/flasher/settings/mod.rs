//! Configuration structures for flashing operations.
//!
//! This module provides the [`Settings`] consumed by the orchestrator, the
//! [`SettingsBuilder`] used to construct them, and [`SettingsFile`] for
//! loading them from TOML.

mod builder;
mod core;
mod file;

use std::time::Duration;

pub use builder::SettingsBuilder;
pub use core::Settings;
pub use file::SettingsFile;

/// Number of programmer channels the engine can drive.
pub const MAX_CHANNELS: u8 = 8;

/// Upper bound accepted for the total-success cap.
pub const MAX_FLASH_COUNT_LIMIT: u32 = 100;

/// Wall-clock budget for one flashing attempt (5 minutes).
pub const DEFAULT_FLASH_TIMEOUT: Duration = Duration::from_secs(300);

/// Wall-clock budget for device enumeration.
pub const DEFAULT_SCAN_TIMEOUT: Duration = Duration::from_secs(10);

/// Delay between worker spawns in a campaign, so probes are not claimed at the same instant.
pub const DEFAULT_SPAWN_STAGGER: Duration = Duration::from_millis(200);

/// Validates a channel count.
pub fn validate_num_channels(num_channels: u8) -> crate::flasher::Result<()> {
    if (1..=MAX_CHANNELS).contains(&num_channels) {
        Ok(())
    } else {
        Err(crate::flasher::Error::InvalidConfig(format!(
            "channel count must be between 1 and {MAX_CHANNELS}, got {num_channels}"
        )))
    }
}

/// Validates a total-success cap.
pub fn validate_max_flash_count(max_flash_count: u32) -> crate::flasher::Result<()> {
    if (1..=MAX_FLASH_COUNT_LIMIT).contains(&max_flash_count) {
        Ok(())
    } else {
        Err(crate::flasher::Error::InvalidConfig(format!(
            "maximum flash count must be between 1 and {MAX_FLASH_COUNT_LIMIT}, got {max_flash_count}"
        )))
    }
}
