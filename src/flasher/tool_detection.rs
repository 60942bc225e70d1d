//! External tool detection and startup checks.
//!
//! The flashing and enumeration tools ship with UniFlash and are usually
//! configured by absolute path. Bare names are looked up in `PATH`.

use super::Settings;
use std::path::{Path, PathBuf};

/// Resolves a configured tool to an executable path.
///
/// Paths with a directory component must point at an existing file. Bare
/// names are resolved through `PATH`.
pub fn resolve_tool(tool: &Path) -> Option<PathBuf> {
    if tool.components().count() > 1 {
        return tool.is_file().then(|| tool.to_path_buf());
    }

    match which::which(tool) {
        Ok(path) => {
            log::debug!("Found {} at: {}", tool.display(), path.display());
            Some(path)
        }
        Err(e) => {
            log::debug!("{} not found in PATH: {}", tool.display(), e);
            None
        }
    }
}

/// Availability of everything a campaign needs.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Preflight {
    /// Resolved flashing tool.
    pub flash_tool: Option<PathBuf>,
    /// Resolved enumeration tool.
    pub scanner_tool: Option<PathBuf>,
    /// Whether the master template exists.
    pub master_template: bool,
    /// Whether the target image exists.
    pub target_image: bool,
}

impl Preflight {
    /// Whether flashing can proceed once probes are provisioned.
    pub fn ready(&self) -> bool {
        self.flash_tool.is_some() && self.master_template && self.target_image
    }
}

/// Checks the configured tools and files, logging what is missing.
///
/// Nothing here is fatal: the tools may be installed later, and each
/// operation reports its own error when it actually needs them.
pub fn preflight(settings: &Settings) -> Preflight {
    let flash_tool = resolve_tool(settings.flash_tool());
    if flash_tool.is_none() {
        log::warn!("dslite not found: {}", settings.flash_tool().display());
    }

    let target_image = settings.target_image().is_file();
    if !target_image {
        log::warn!("Image not found: {}", settings.target_image().display());
    }

    let master_template = settings.master_template().is_file();
    if !master_template {
        log::error!(
            "Master ccxml template not found: {} - check the configuration",
            settings.master_template().display()
        );
    }

    let scanner_tool = resolve_tool(settings.scanner_tool());
    if scanner_tool.is_none() {
        log::warn!("xdsdfu not found: {}", settings.scanner_tool().display());
    }

    Preflight {
        flash_tool,
        scanner_tool,
        master_template,
        target_image,
    }
}
