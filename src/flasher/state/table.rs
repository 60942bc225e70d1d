//! Lock-guarded channel table.
//!
//! All channel fields and aggregates live in one [`Table`] behind a single
//! mutex. Cross-field rules (cap check plus transition, supersede check plus
//! verdict) always run inside one lock acquisition. Artifacts are stat'ed
//! before the lock is taken, and the lock is never held across an `.await`.

use super::{
    Attempt, AttemptOutcome, ChannelSnapshot, ChannelStatus, ConfigSnapshot, StatusSnapshot,
};
use crate::flasher::{
    Error, Result,
    settings::{MAX_CHANNELS, validate_max_flash_count, validate_num_channels},
};
use std::{
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard, PoisonError},
};

#[derive(Debug, Default)]
struct ChannelSlot {
    status: ChannelStatus,
    success_count: u32,
    fail_count: u32,
    artifact: Option<PathBuf>,
    serial: Option<String>,
    generation: u64,
}

/// Registered artifacts found on disk, indexed by channel minus one.
type PresentArtifacts = [Option<PathBuf>; MAX_CHANNELS as usize];

#[derive(Debug)]
struct Table {
    num_channels: u8,
    scanning: bool,
    max_flash_count: u32,
    target_image: PathBuf,
    serials: Vec<String>,
    channels: [ChannelSlot; MAX_CHANNELS as usize],
}

impl Table {
    fn index(channel: u8) -> Result<usize> {
        if (1..=MAX_CHANNELS).contains(&channel) {
            Ok(usize::from(channel - 1))
        } else {
            Err(Error::InvalidChannel {
                channel,
                max: MAX_CHANNELS,
            })
        }
    }

    fn slot(&self, channel: u8) -> Result<&ChannelSlot> {
        Ok(&self.channels[Self::index(channel)?])
    }

    fn slot_mut(&mut self, channel: u8) -> Result<&mut ChannelSlot> {
        Ok(&mut self.channels[Self::index(channel)?])
    }

    fn total_success(&self) -> u32 {
        self.channels.iter().map(|c| c.success_count).sum()
    }

    fn total_fail(&self) -> u32 {
        self.channels.iter().map(|c| c.fail_count).sum()
    }

    fn is_running(&self) -> bool {
        self.channels.iter().any(|c| c.status.is_in_progress())
    }

    fn check_active(&self, channel: u8) -> Result<()> {
        if channel == 0 || channel > self.num_channels {
            Err(Error::InvalidChannel {
                channel,
                max: self.num_channels,
            })
        } else {
            Ok(())
        }
    }

    fn check_cap(&self) -> Result<()> {
        if self.total_success() >= self.max_flash_count {
            Err(Error::CapReached {
                max: self.max_flash_count,
            })
        } else {
            Ok(())
        }
    }

    /// Moves an idle channel to `InProgress`, or to `ConfigError` when it has
    /// no usable artifact.
    ///
    /// `present` must have been collected before the lock was taken; an
    /// artifact replaced since then counts as missing.
    fn accept(&mut self, channel: u8, present: &PresentArtifacts) -> Result<Attempt> {
        let index = Self::index(channel)?;
        let slot = &mut self.channels[index];
        let usable = slot.artifact.is_some() && slot.artifact == present[index];
        match slot.artifact.clone() {
            Some(artifact) if usable => {
                slot.generation += 1;
                slot.status = ChannelStatus::InProgress;
                Ok(Attempt {
                    channel,
                    id: slot.generation,
                    artifact,
                })
            }
            registered => {
                slot.status = ChannelStatus::ConfigError {
                    reason: match registered {
                        Some(path) => format!("ccxml file not found: {}", path.display()),
                        None => "no ccxml file registered".to_string(),
                    },
                };
                Err(Error::ArtifactMissing { channel })
            }
        }
    }
}

/// Exclusive claim on the table for the duration of a scan.
#[derive(Debug)]
#[must_use = "the scan claim is released as soon as the guard is dropped"]
pub struct ScanGuard<'a> {
    state: &'a OrchestrationState,
}

impl Drop for ScanGuard<'_> {
    fn drop(&mut self) {
        self.state.lock().scanning = false;
    }
}

/// Shared state for every channel.
///
/// Wrap in an [`Arc`](std::sync::Arc) to share between the orchestrator and
/// its workers. Accessors copy data out; no reference into the table escapes
/// the lock.
#[derive(Debug)]
pub struct OrchestrationState {
    inner: Mutex<Table>,
}

impl OrchestrationState {
    /// Creates a table with every channel `NotStarted`.
    pub fn new(num_channels: u8, max_flash_count: u32, target_image: PathBuf) -> Self {
        Self {
            inner: Mutex::new(Table {
                num_channels,
                scanning: false,
                max_flash_count,
                target_image,
                serials: Vec::new(),
                channels: Default::default(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Table> {
        // Every critical section leaves the table consistent, so a panic
        // elsewhere does not invalidate it.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stats every registered artifact without holding the lock.
    fn present_artifacts(&self) -> PresentArtifacts {
        let registered: Vec<Option<PathBuf>> = self
            .lock()
            .channels
            .iter()
            .map(|slot| slot.artifact.clone())
            .collect();

        let mut present = PresentArtifacts::default();
        for (found, artifact) in present.iter_mut().zip(registered) {
            *found = artifact.filter(|path| path.is_file());
        }
        present
    }

    /// Accepts a single-channel attempt.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidChannel`] outside `1..=num_channels`
    /// - [`Error::ScanInProgress`] while a scan is replacing artifacts
    /// - [`Error::CapReached`] if total successes meet the cap
    /// - [`Error::AlreadyInProgress`] if the channel is mid-attempt
    /// - [`Error::ArtifactMissing`] if the channel has no usable artifact; the
    ///   channel is left in `ConfigError`
    pub fn begin_attempt(&self, channel: u8) -> Result<Attempt> {
        let present = self.present_artifacts();
        let mut table = self.lock();
        table.check_active(channel)?;
        if table.scanning {
            return Err(Error::ScanInProgress);
        }
        table.check_cap()?;
        if table.slot(channel)?.status.is_in_progress() {
            return Err(Error::AlreadyInProgress { channel });
        }
        table.accept(channel, &present)
    }

    /// Accepts a campaign over the active channels.
    ///
    /// Returns one entry per active channel: the accepted attempt, or the
    /// reason it went straight to `ConfigError`.
    ///
    /// # Errors
    ///
    /// - [`Error::ScanInProgress`] while a scan is replacing artifacts
    /// - [`Error::CapReached`] if total successes meet the cap
    /// - [`Error::CampaignInProgress`] if any channel is running
    pub fn begin_campaign(&self) -> Result<Vec<(u8, Result<Attempt>)>> {
        let present = self.present_artifacts();
        let mut table = self.lock();
        if table.scanning {
            return Err(Error::ScanInProgress);
        }
        table.check_cap()?;
        if table.is_running() {
            return Err(Error::CampaignInProgress);
        }

        let num_channels = table.num_channels;
        let mut entries = Vec::with_capacity(usize::from(num_channels));
        for channel in 1..=num_channels {
            entries.push((channel, table.accept(channel, &present)));
        }
        Ok(entries)
    }

    /// Claims the table for a scan.
    ///
    /// Starts are rejected until the returned guard is dropped, so no attempt
    /// can pick up an artifact the scan is about to delete.
    ///
    /// # Errors
    ///
    /// - [`Error::CampaignInProgress`] if any channel is running
    /// - [`Error::ScanInProgress`] if another scan holds the table
    pub fn begin_scan(&self) -> Result<ScanGuard<'_>> {
        let mut table = self.lock();
        if table.is_running() {
            return Err(Error::CampaignInProgress);
        }
        if table.scanning {
            return Err(Error::ScanInProgress);
        }
        table.scanning = true;
        Ok(ScanGuard { state: self })
    }

    /// Whether a scan holds the table.
    pub fn is_scanning(&self) -> bool {
        self.lock().scanning
    }

    /// Records the verdict of an attempt.
    ///
    /// Returns `false` (and changes nothing) when the attempt has been
    /// superseded: the channel was stopped, or a newer attempt was accepted.
    pub fn finish_attempt(&self, attempt: &Attempt, outcome: AttemptOutcome) -> bool {
        let mut table = self.lock();
        let Ok(slot) = table.slot_mut(attempt.channel) else {
            return false;
        };
        if slot.generation != attempt.id || !slot.status.is_in_progress() {
            return false;
        }

        match outcome {
            AttemptOutcome::Success => {
                slot.status = ChannelStatus::Success;
                slot.success_count += 1;
            }
            AttemptOutcome::Failure(reason) => {
                slot.status = ChannelStatus::Failure { reason };
                slot.fail_count += 1;
            }
            AttemptOutcome::ConfigError(reason) => {
                slot.status = ChannelStatus::ConfigError { reason };
            }
        }
        true
    }

    /// Whether `attempt` is still the channel's live attempt.
    pub fn is_current(&self, attempt: &Attempt) -> bool {
        let table = self.lock();
        table
            .slot(attempt.channel)
            .is_ok_and(|slot| slot.generation == attempt.id && slot.status.is_in_progress())
    }

    /// Marks every in-progress channel `Terminated` and counts it as a failure.
    ///
    /// Returns the channels that were stopped.
    pub fn stop_all(&self) -> Vec<u8> {
        let mut table = self.lock();
        let mut stopped = Vec::new();
        for (index, slot) in table.channels.iter_mut().enumerate() {
            if slot.status.is_in_progress() {
                slot.status = ChannelStatus::Terminated;
                slot.fail_count += 1;
                // Index is bounded by MAX_CHANNELS.
                stopped.push(index as u8 + 1);
            }
        }
        stopped
    }

    /// Zeroes every success and fail counter.
    pub fn reset_counters(&self) {
        let mut table = self.lock();
        for slot in table.channels.iter_mut() {
            slot.success_count = 0;
            slot.fail_count = 0;
        }
    }

    /// Registers a rendered artifact for a channel.
    pub fn register_artifact(&self, channel: u8, serial: &str, artifact: PathBuf) -> Result<()> {
        let mut table = self.lock();
        let slot = table.slot_mut(channel)?;
        slot.serial = Some(serial.to_string());
        slot.artifact = Some(artifact);
        Ok(())
    }

    /// Forgets every registered artifact and serial ahead of a new scan.
    pub fn clear_provisioning(&self) {
        let mut table = self.lock();
        table.serials.clear();
        for slot in table.channels.iter_mut() {
            slot.artifact = None;
            slot.serial = None;
        }
    }

    /// Records the serials found by a scan.
    pub fn set_serials(&self, serials: Vec<String>) {
        self.lock().serials = serials;
    }

    /// Returns the serials found by the last scan.
    pub fn serials(&self) -> Vec<String> {
        self.lock().serials.clone()
    }

    /// Returns the artifact registered for a channel.
    pub fn artifact(&self, channel: u8) -> Result<Option<PathBuf>> {
        Ok(self.lock().slot(channel)?.artifact.clone())
    }

    /// Returns the status of a channel.
    pub fn channel_status(&self, channel: u8) -> Result<ChannelStatus> {
        Ok(self.lock().slot(channel)?.status.clone())
    }

    /// True iff any channel is in progress.
    pub fn is_running(&self) -> bool {
        self.lock().is_running()
    }

    /// Sum of success counters.
    pub fn total_success(&self) -> u32 {
        self.lock().total_success()
    }

    /// Active channel count.
    pub fn num_channels(&self) -> u8 {
        self.lock().num_channels
    }

    /// Sets the active channel count (1-8).
    pub fn set_num_channels(&self, num_channels: u8) -> Result<()> {
        validate_num_channels(num_channels)?;
        self.lock().num_channels = num_channels;
        Ok(())
    }

    /// Cap on total successes.
    pub fn max_flash_count(&self) -> u32 {
        self.lock().max_flash_count
    }

    /// Sets the cap on total successes (1-100).
    pub fn set_max_flash_count(&self, max_flash_count: u32) -> Result<()> {
        validate_max_flash_count(max_flash_count)?;
        self.lock().max_flash_count = max_flash_count;
        Ok(())
    }

    /// Image programmed by new attempts.
    pub fn target_image(&self) -> PathBuf {
        self.lock().target_image.clone()
    }

    /// Replaces the image programmed by new attempts.
    pub fn set_target_image(&self, image: &Path) {
        self.lock().target_image = image.to_path_buf();
    }

    /// Copies out the status of the active channels.
    pub fn snapshot(&self) -> StatusSnapshot {
        let table = self.lock();
        let channels = table
            .channels
            .iter()
            .take(usize::from(table.num_channels))
            .zip(1u8..)
            .map(|(slot, channel)| ChannelSnapshot {
                channel,
                status: slot.status.clone(),
                success_count: slot.success_count,
                fail_count: slot.fail_count,
                serial: slot.serial.clone(),
                config_artifact: slot.artifact.clone(),
            })
            .collect();

        StatusSnapshot {
            is_running: table.is_running(),
            num_channels: table.num_channels,
            max_flash_count: table.max_flash_count,
            total_success: table.total_success(),
            total_fail: table.total_fail(),
            channels,
            serials: table.serials.clone(),
        }
    }

    /// Copies out the tunable configuration.
    pub fn config_snapshot(&self, flash_tool: &Path, master_template: &Path) -> ConfigSnapshot {
        let table = self.lock();
        ConfigSnapshot {
            num_channels: table.num_channels,
            max_flash_count: table.max_flash_count,
            target_image: table.target_image.clone(),
            flash_tool: flash_tool.to_path_buf(),
            master_template: master_template.to_path_buf(),
            config_artifacts: table
                .channels
                .iter()
                .take(usize::from(table.num_channels))
                .map(|slot| slot.artifact.clone())
                .collect(),
        }
    }
}
