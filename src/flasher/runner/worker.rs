//! One channel's flashing attempt.

use super::{CommandBuilder, FlashCommand, Verdict, classify_file};
use crate::flasher::{
    Error, Result,
    error::ErrorExt,
    state::{Attempt, AttemptOutcome, OrchestrationState},
    tool_detection,
};
use chrono::{DateTime, Local};
use std::{
    path::{Path, PathBuf},
    process::Stdio,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::process::Command;

/// Record of a completed attempt. Logged, then dropped.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RunRecord {
    /// Channel number.
    pub channel: u8,
    /// Attempt generation.
    pub attempt: u64,
    /// When the tool was launched.
    pub started_at: DateTime<Local>,
    /// Tool exit code, if it exited normally.
    pub exit_code: Option<i32>,
    /// Wall-clock duration.
    pub duration: Duration,
    /// Output sink.
    pub output: PathBuf,
    /// Classification.
    pub verdict: Verdict,
}

/// Runs one accepted attempt to completion.
///
/// The worker never holds the state lock while the tool runs. Its verdict is
/// dropped if the attempt was stopped or replaced in the meantime.
#[derive(Debug, Clone)]
pub struct ChannelWorker {
    state: Arc<OrchestrationState>,
    commands: CommandBuilder,
    image: PathBuf,
    sink: PathBuf,
    timeout: Duration,
    delay: Duration,
    secure: bool,
}

impl ChannelWorker {
    /// Creates a worker.
    ///
    /// `sink` receives the tool's combined stdout/stderr and is replaced on
    /// every attempt. `delay` postpones the launch (campaign stagger).
    pub fn new(
        state: Arc<OrchestrationState>,
        commands: CommandBuilder,
        image: PathBuf,
        sink: PathBuf,
        timeout: Duration,
        secure: bool,
    ) -> Self {
        Self {
            state,
            commands,
            image,
            sink,
            timeout,
            delay: Duration::ZERO,
            secure,
        }
    }

    /// Postpones the launch by `delay`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Runs the attempt and records its verdict.
    pub async fn run(self, attempt: Attempt) {
        let channel = attempt.channel;

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
            if !self.state.is_current(&attempt) {
                log::info!("Channel {} stopped before launch", channel);
                return;
            }
        }

        let outcome = match self.prepare(&attempt) {
            Ok(command) => match self.execute(&attempt, &command).await {
                Ok(record) => {
                    log::info!(
                        "Channel {} attempt {} finished: {:?} (exit code {:?}, {:.1}s)",
                        channel,
                        record.attempt,
                        record.verdict,
                        record.exit_code,
                        record.duration.as_secs_f64()
                    );
                    if record.verdict.is_success() {
                        AttemptOutcome::Success
                    } else {
                        AttemptOutcome::Failure(match record.exit_code {
                            Some(code) => format!("exit code {code}"),
                            None => "terminated by signal".to_string(),
                        })
                    }
                }
                Err(e) => {
                    log::error!("Channel {} flashing error: {}", channel, e);
                    AttemptOutcome::Failure(e.to_string())
                }
            },
            Err(e) => {
                log::error!("Channel {} configuration error: {}", channel, e);
                AttemptOutcome::ConfigError(e.to_string())
            }
        };

        if !self.state.finish_attempt(&attempt, outcome) {
            log::warn!(
                "Channel {} attempt {} was superseded, discarding its result",
                channel,
                attempt.id
            );
        }
    }

    fn prepare(&self, attempt: &Attempt) -> Result<FlashCommand> {
        if !attempt.artifact.is_file() {
            return Err(Error::ArtifactMissing {
                channel: attempt.channel,
            });
        }
        if !self.image.is_file() {
            return Err(Error::InvalidConfig(format!(
                "image not found: {}",
                self.image.display()
            )));
        }
        self.commands.build(&attempt.artifact, &self.image, self.secure)
    }

    async fn execute(&self, attempt: &Attempt, command: &FlashCommand) -> Result<RunRecord> {
        let program = tool_detection::resolve_tool(command.program()).ok_or_else(|| {
            Error::ToolMissing {
                path: command.program().to_path_buf(),
            }
        })?;

        let (stdout, stderr) = open_sink(&self.sink)?;
        log::info!("Channel {} executing: {}", attempt.channel, command);

        let started_at = Local::now();
        let clock = Instant::now();
        let mut child = Command::new(&program)
            .args(command.args())
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr)
            .spawn()
            .map_err(|error| Error::CommandFailed {
                command: program.display().to_string(),
                error,
            })?;

        let status = match tokio::time::timeout(self.timeout, child.wait()).await {
            Ok(Ok(status)) => status,
            Ok(Err(error)) => {
                return Err(Error::CommandFailed {
                    command: program.display().to_string(),
                    error,
                });
            }
            Err(_elapsed) => {
                if let Err(e) = child.kill().await {
                    log::warn!(
                        "Channel {}: failed to kill timed-out dslite: {}",
                        attempt.channel,
                        e
                    );
                }
                return Err(Error::Timeout {
                    command: program.display().to_string(),
                    secs: self.timeout.as_secs(),
                });
            }
        };

        let exit_code = status.code();
        let verdict = classify_file(&self.sink, exit_code).await;

        Ok(RunRecord {
            channel: attempt.channel,
            attempt: attempt.id,
            started_at,
            exit_code,
            duration: clock.elapsed(),
            output: self.sink.clone(),
            verdict,
        })
    }
}

/// Replaces the sink and returns stdout/stderr handles to it.
///
/// The old file is unlinked rather than truncated, so a tool process left
/// over from a stopped attempt keeps writing to the orphaned file.
fn open_sink(path: &Path) -> Result<(Stdio, Stdio)> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).fs_context("creating output directory", parent)?;
    }
    match std::fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e).fs_context("removing previous output", path),
    }

    let file = std::fs::File::create(path).fs_context("creating output file", path)?;
    let stderr = file
        .try_clone()
        .fs_context("duplicating output handle", path)?;
    Ok((Stdio::from(file), Stdio::from(stderr)))
}
