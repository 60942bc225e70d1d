//! Success classification of `dslite` output.
//!
//! Only the last [`TAIL_LINES`] lines are inspected. The window must mention
//! [`SUCCESS_MARKER`] and must not mention any of [`FAILURE_MARKERS`]; a lock
//! or unlock failure printed next to "Success" is still a failure. The exit
//! code never turns a missing success marker into success.

use std::path::Path;

/// Lines inspected at the end of the output.
pub const TAIL_LINES: usize = 3;

/// Lower-case marker required for success.
pub const SUCCESS_MARKER: &str = "success";

/// Lower-case markers that veto success.
pub const FAILURE_MARKERS: &[&str] = &["failed: unknown error", "device is locked"];

/// Result of one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Image programmed and verified.
    Success,
    /// Anything else.
    Failure,
}

impl Verdict {
    /// Whether this is [`Verdict::Success`].
    pub fn is_success(self) -> bool {
        self == Verdict::Success
    }
}

/// Classifies captured output.
///
/// `exit_code` is only used to log a disagreement with the text verdict.
pub fn classify(output: &str, exit_code: Option<i32>) -> Verdict {
    let lines: Vec<&str> = output.lines().collect();
    let window = lines[lines.len().saturating_sub(TAIL_LINES)..]
        .join(" ")
        .to_lowercase();

    let has_success = window.contains(SUCCESS_MARKER);
    let has_failure = FAILURE_MARKERS.iter().any(|marker| window.contains(marker));

    let verdict = if has_success && !has_failure {
        Verdict::Success
    } else {
        Verdict::Failure
    };

    match (verdict, exit_code) {
        (Verdict::Success, Some(code)) if code != 0 => {
            log::warn!("Output reports success but dslite exited with {}", code)
        }
        (Verdict::Failure, Some(0)) if has_failure => {
            log::warn!("dslite exited with 0 but output reports a lock failure")
        }
        _ => {}
    }

    verdict
}

/// Classifies an output sink on disk. Unreadable files are failures.
pub async fn classify_file(path: &Path, exit_code: Option<i32>) -> Verdict {
    match tokio::fs::read(path).await {
        Ok(bytes) => classify(&String::from_utf8_lossy(&bytes), exit_code),
        Err(e) => {
            log::error!("Failed to read output {}: {}", path.display(), e);
            Verdict::Failure
        }
    }
}
