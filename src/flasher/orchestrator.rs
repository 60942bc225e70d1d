//! Channel orchestration and coordination.
//!
//! This module provides the [`Orchestrator`], the control surface an outer
//! layer (CLI, HTTP panel) drives. Every operation returns immediately; start
//! operations only enqueue workers, whose progress is observed through
//! [`Orchestrator::status`].

use super::{
    Error, Result, Settings,
    provision::{ConfigTemplateRenderer, DeviceScanner, ScanReport, prepare_artifact_dir},
    runner::{ChannelWorker, CommandBuilder},
    state::{Attempt, ConfigSnapshot, OrchestrationState, StatusSnapshot},
    tool_detection::{self, Preflight},
};
use path_absolutize::Absolutize;
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::runtime::Handle;
use tokio_util::task::TaskTracker;

/// Outcome of [`Orchestrator::start_all`].
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct CampaignReport {
    /// Channels whose worker was spawned.
    pub started: Vec<u8>,
    /// Channels that went straight to `ConfigError`.
    pub config_errors: Vec<u8>,
    /// Operator-facing summary.
    pub message: String,
}

/// Main flashing orchestrator.
///
/// Owns the shared [`OrchestrationState`] and spawns one
/// [`ChannelWorker`] per accepted attempt on the Tokio runtime it was created
/// in.
///
/// # Examples
///
/// ```no_run
/// use multiflash::flasher::{Orchestrator, SettingsBuilder};
///
/// # async fn example() -> multiflash::flasher::Result<()> {
/// let orchestrator = Orchestrator::new(SettingsBuilder::new().build()?)?;
///
/// let report = orchestrator.scan_devices().await?;
/// println!("{}", report.message);
///
/// orchestrator.start_all(false)?;
/// while orchestrator.status().is_running {
///     tokio::time::sleep(std::time::Duration::from_millis(500)).await;
/// }
/// # Ok(())
/// # }
/// ```
pub struct Orchestrator {
    settings: Settings,
    state: Arc<OrchestrationState>,
    renderer: ConfigTemplateRenderer,
    scanner: DeviceScanner,
    commands: CommandBuilder,
    artifact_dir: PathBuf,
    preflight: Preflight,
    runtime: Handle,
    workers: TaskTracker,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("settings", &self.settings)
            .field("artifact_dir", &self.artifact_dir)
            .field("preflight", &self.preflight)
            .field("workers", &self.workers.len())
            .finish()
    }
}

impl Orchestrator {
    /// Creates an orchestrator.
    ///
    /// Prepares the artifact directory (creating it, or removing artifacts
    /// left by a previous run), checks the configured tools and binds to the
    /// current Tokio runtime. Missing tools are logged, not fatal.
    ///
    /// # Errors
    ///
    /// Fails outside a Tokio runtime or if the artifact directory cannot be
    /// prepared.
    pub fn new(settings: Settings) -> Result<Self> {
        let runtime = match Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => crate::bail!("orchestrator requires a Tokio runtime: {e}"),
        };

        let artifact_dir = settings
            .generated_dir()
            .absolutize()
            .map_err(Error::IoError)?
            .into_owned();
        let purged = prepare_artifact_dir(&artifact_dir)?;
        if purged > 0 {
            log::info!(
                "Removed {} stale ccxml file(s) from {}",
                purged,
                artifact_dir.display()
            );
        }
        let preflight = tool_detection::preflight(&settings);

        let state = Arc::new(OrchestrationState::new(
            settings.num_channels(),
            settings.max_flash_count(),
            settings.target_image().to_path_buf(),
        ));

        Ok(Self {
            renderer: ConfigTemplateRenderer::new(settings.master_template(), &artifact_dir),
            scanner: DeviceScanner::new(settings.scanner_tool(), settings.scan_timeout()),
            commands: CommandBuilder::new(settings.flash_tool(), settings.credential_file()),
            settings,
            state,
            artifact_dir,
            preflight,
            runtime,
            workers: TaskTracker::new(),
        })
    }

    /// Returns the settings this orchestrator was built with.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Returns what the startup check found.
    pub fn preflight(&self) -> &Preflight {
        &self.preflight
    }

    /// Returns the shared state table.
    pub fn state(&self) -> &Arc<OrchestrationState> {
        &self.state
    }

    /// Returns the renderer used for provisioning.
    pub fn renderer(&self) -> &ConfigTemplateRenderer {
        &self.renderer
    }

    /// Enumerates probes and provisions one channel per probe.
    ///
    /// # Errors
    ///
    /// Starts are rejected with [`Error::ScanInProgress`] until the scan
    /// returns.
    ///
    /// # Errors
    ///
    /// - [`Error::CampaignInProgress`] while any channel is flashing, since
    ///   the scan replaces the artifacts in use
    /// - [`Error::ScanInProgress`] if another scan is running
    /// - [`Error::ScannerToolMissing`], [`Error::ScanTimeout`],
    ///   [`Error::ScanError`] from the enumeration tool
    pub async fn scan_devices(&self) -> Result<ScanReport> {
        let report = self
            .scanner
            .scan(&self.renderer, &self.artifact_dir, &self.state)
            .await;
        match &report {
            Ok(report) => log::info!("{}", report.message),
            Err(e) => log::error!("Device scan failed: {}", e),
        }
        report
    }

    /// Returns the current status of the active channels.
    pub fn status(&self) -> StatusSnapshot {
        self.state.snapshot()
    }

    /// Starts one channel.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidChannel`] outside `1..=num_channels`
    /// - [`Error::ScanInProgress`] while a scan is replacing artifacts
    /// - [`Error::CapReached`] once total successes meet the cap
    /// - [`Error::AlreadyInProgress`] if the channel is flashing
    /// - [`Error::ArtifactMissing`] if the channel is not provisioned (the
    ///   channel is marked `ConfigError`)
    pub fn start_channel(&self, channel: u8, secure: bool) -> Result<String> {
        let attempt = self.state.begin_attempt(channel).inspect_err(|e| {
            log::warn!("Channel {} not started: {}", channel, e);
        })?;
        self.spawn_worker(attempt, secure, std::time::Duration::ZERO);
        Ok(format!("Channel {channel} flashing started"))
    }

    /// Starts every active channel that is not already flashing.
    ///
    /// Launches are staggered by the configured delay so the probes are not
    /// all claimed at the same instant. Unprovisioned channels are marked
    /// `ConfigError` and reported, without failing the campaign.
    ///
    /// # Errors
    ///
    /// - [`Error::ScanInProgress`] while a scan is replacing artifacts
    /// - [`Error::CapReached`] once total successes meet the cap
    /// - [`Error::CampaignInProgress`] if any channel is flashing
    pub fn start_all(&self, secure: bool) -> Result<CampaignReport> {
        let entries = self.state.begin_campaign()?;
        let num_channels = entries.len();

        let mut started = Vec::new();
        let mut config_errors = Vec::new();
        for (channel, entry) in entries {
            match entry {
                Ok(attempt) => {
                    let delay = self.settings.spawn_stagger() * started.len() as u32;
                    self.spawn_worker(attempt, secure, delay);
                    started.push(channel);
                }
                Err(e) => {
                    log::error!("Channel {} not started: {}", channel, e);
                    config_errors.push(channel);
                }
            }
        }

        let message = if config_errors.is_empty() {
            format!("All {num_channels} channel(s) started")
        } else {
            format!(
                "{} of {} channel(s) started, channel(s) {:?} not provisioned",
                started.len(),
                num_channels,
                config_errors
            )
        };
        log::info!("{}", message);

        Ok(CampaignReport {
            started,
            config_errors,
            message,
        })
    }

    /// Stops every flashing channel.
    ///
    /// Stopped channels become `Terminated` and count one failure. The tool
    /// processes are not killed; their late results are discarded.
    pub fn stop_all(&self) -> String {
        let stopped = self.state.stop_all();
        if stopped.is_empty() {
            "No channel was flashing".to_string()
        } else {
            log::warn!("Stopped channel(s) {:?}", stopped);
            format!("Stopped {} channel(s)", stopped.len())
        }
    }

    /// Zeroes every success and fail counter.
    pub fn reset_counters(&self) -> String {
        self.state.reset_counters();
        log::info!("Flash counters reset");
        "Flash counters reset".to_string()
    }

    /// Returns the tunable configuration.
    pub fn config(&self) -> ConfigSnapshot {
        self.state
            .config_snapshot(self.settings.flash_tool(), self.settings.master_template())
    }

    /// Updates the channel count and/or the flash cap.
    ///
    /// Both values are validated before either is applied.
    pub fn set_config(
        &self,
        num_channels: Option<u8>,
        max_flash_count: Option<u32>,
    ) -> Result<ConfigSnapshot> {
        if num_channels.is_none() && max_flash_count.is_none() {
            return Err(Error::InvalidConfig("no configuration value given".into()));
        }
        if let Some(n) = num_channels {
            super::settings::validate_num_channels(n)?;
        }
        if let Some(max) = max_flash_count {
            super::settings::validate_max_flash_count(max)?;
        }

        if let Some(n) = num_channels {
            self.state.set_num_channels(n)?;
            log::info!("Channel count set to {}", n);
        }
        if let Some(max) = max_flash_count {
            self.state.set_max_flash_count(max)?;
            log::info!("Maximum flash count set to {}", max);
        }
        Ok(self.config())
    }

    /// Returns the image programmed by new attempts.
    pub fn target_image(&self) -> PathBuf {
        self.state.target_image()
    }

    /// Selects the image programmed by new attempts.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidConfig`] unless `image` is an existing `.out` file.
    pub fn set_target_image(&self, image: &Path) -> Result<()> {
        if !image.is_file() {
            return Err(Error::InvalidConfig(format!(
                "image not found: {}",
                image.display()
            )));
        }
        if image.extension().is_none_or(|ext| ext != "out") {
            return Err(Error::InvalidConfig(format!(
                "image must be a .out file: {}",
                image.display()
            )));
        }
        self.state.set_target_image(image);
        log::info!("Image set to {}", image.display());
        Ok(())
    }

    /// Lists the `.out` files in the image directory, sorted by name.
    pub fn list_images(&self) -> Result<Vec<String>> {
        let dir = self.settings.image_dir();
        if !dir.is_dir() {
            return Err(Error::InvalidConfig(format!(
                "image directory not found: {}",
                dir.display()
            )));
        }

        let mut images: Vec<String> = walkdir::WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "out"))
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        images.sort();
        Ok(images)
    }

    /// Waits until every spawned worker has returned.
    ///
    /// Workers of stopped channels are included: this waits for their tool
    /// processes to exit or time out.
    pub async fn wait_workers(&self) {
        self.workers.close();
        self.workers.wait().await;
        self.workers.reopen();
    }

    fn spawn_worker(&self, attempt: Attempt, secure: bool, delay: std::time::Duration) {
        let worker = ChannelWorker::new(
            Arc::clone(&self.state),
            self.commands.clone(),
            self.state.target_image(),
            self.settings.output_sink(attempt.channel),
            self.settings.flash_timeout(),
            secure,
        )
        .with_delay(delay);

        log::debug!(
            "Spawning worker for channel {} (attempt {}, delay {:?})",
            attempt.channel,
            attempt.id,
            delay
        );
        self.workers.spawn_on(worker.run(attempt), &self.runtime);
    }
}
