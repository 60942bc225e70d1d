//! ccxml template rendering.
//!
//! The master template is treated as opaque text with a single substitution
//! point: the `Value` attribute of the property whose id is
//! `-- Enter the serial number`. Everything else is copied byte for byte.

use crate::flasher::{
    Error, Result,
    error::ErrorExt,
    state::OrchestrationState,
};
use path_absolutize::Absolutize;
use regex::{Captures, Regex};
use std::{
    path::{Path, PathBuf},
    sync::LazyLock,
};

static SERIAL_FIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(Value=["'])[^"']*(["']\s+id=["']-- Enter the serial number["'])"#)
        .expect("serial field pattern is valid")
});

/// Renders per-channel artifacts from the master template.
#[derive(Debug, Clone)]
pub struct ConfigTemplateRenderer {
    master: PathBuf,
    output_dir: PathBuf,
}

impl ConfigTemplateRenderer {
    /// Creates a renderer writing into `output_dir`.
    pub fn new(master: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            master: master.into(),
            output_dir: output_dir.into(),
        }
    }

    /// Deterministic artifact path for a `(channel, serial)` pair.
    pub fn artifact_path(&self, channel: u8, serial: &str) -> PathBuf {
        self.output_dir
            .join(format!("channel_{channel}_serial_{serial}.ccxml"))
    }

    /// Renders the artifact for `channel` with `serial` substituted.
    ///
    /// Any earlier artifact for the same channel is removed first. On failure
    /// no artifact for this channel is left behind.
    ///
    /// # Errors
    ///
    /// - [`Error::TemplateMissing`] if the master template does not exist
    /// - [`Error::SubstitutionNotFound`] if it has no serial field
    /// - [`Error::AmbiguousSubstitution`] if it has more than one
    /// - [`Error::WriteFailed`] if the artifact cannot be written
    pub fn render(&self, channel: u8, serial: &str) -> Result<PathBuf> {
        if serial.is_empty() || !serial.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(Error::InvalidConfig(format!(
                "serial number must be alphanumeric, got {serial:?}"
            )));
        }
        if !self.master.is_file() {
            return Err(Error::TemplateMissing {
                path: self.master.clone(),
            });
        }

        let template = std::fs::read_to_string(&self.master)
            .fs_context("reading master template", &self.master)?;
        let rendered = self.substitute(&template, serial)?;

        self.remove_channel_artifacts(channel)?;

        let path = self.artifact_path(channel, serial);
        if let Err(source) = std::fs::write(&path, rendered) {
            if path.exists() {
                let _ = std::fs::remove_file(&path);
            }
            return Err(Error::WriteFailed { path, source });
        }

        log::info!(
            "Generated ccxml for channel {} (serial {}): {}",
            channel,
            serial,
            path.display()
        );
        Ok(path)
    }

    /// Renders the artifact and registers it for `channel`.
    ///
    /// The registered path is absolute so the flashing tool resolves it the
    /// same way regardless of its own working directory.
    pub fn provision(
        &self,
        state: &OrchestrationState,
        channel: u8,
        serial: &str,
    ) -> Result<PathBuf> {
        let path = self.render(channel, serial)?;
        let path = match path.absolutize() {
            Ok(absolute) => absolute.into_owned(),
            Err(e) => {
                let _ = std::fs::remove_file(&path);
                return Err(Error::WriteFailed { path, source: e });
            }
        };
        state.register_artifact(channel, serial, path.clone())?;
        Ok(path)
    }

    fn substitute(&self, template: &str, serial: &str) -> Result<String> {
        match SERIAL_FIELD.find_iter(template).count() {
            0 => Err(Error::SubstitutionNotFound {
                path: self.master.clone(),
            }),
            1 => Ok(SERIAL_FIELD
                .replace(template, |caps: &Captures<'_>| {
                    format!("{}{}{}", &caps[1], serial, &caps[2])
                })
                .into_owned()),
            count => Err(Error::AmbiguousSubstitution {
                path: self.master.clone(),
                count,
            }),
        }
    }

    fn remove_channel_artifacts(&self, channel: u8) -> Result<()> {
        if !self.output_dir.is_dir() {
            std::fs::create_dir_all(&self.output_dir)
                .fs_context("creating ccxml directory", &self.output_dir)?;
            return Ok(());
        }

        let prefix = format!("channel_{channel}_serial_");
        for entry in walkdir::WalkDir::new(&self.output_dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            let name = entry.file_name().to_string_lossy();
            if name.starts_with(&prefix) && name.ends_with(".ccxml") {
                std::fs::remove_file(entry.path())
                    .fs_context("removing superseded ccxml", entry.path())?;
            }
        }
        Ok(())
    }
}

/// Creates the artifact directory, or empties it of stale `.ccxml` files.
///
/// Returns the number of files removed. Removal failures are logged and
/// skipped.
pub fn prepare_artifact_dir(dir: &Path) -> Result<usize> {
    if !dir.exists() {
        std::fs::create_dir_all(dir).fs_context("creating ccxml directory", dir)?;
        log::info!("Created ccxml directory: {}", dir.display());
        return Ok(0);
    }

    let mut removed = 0;
    for entry in walkdir::WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "ccxml"))
    {
        match std::fs::remove_file(entry.path()) {
            Ok(()) => removed += 1,
            Err(e) => log::warn!(
                "Failed to remove stale ccxml {}: {}",
                entry.path().display(),
                e
            ),
        }
    }
    Ok(removed)
}
