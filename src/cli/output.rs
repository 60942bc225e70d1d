//! Terminal output for operators.
//!
//! Engine diagnostics go through `log`; this is only what the operator reads.

use std::io::{self, Write};

/// Prints operator-facing messages, honouring verbose/quiet.
#[derive(Debug, Clone)]
pub struct OutputManager {
    verbose: bool,
    quiet: bool,
}

impl OutputManager {
    /// Creates an output manager.
    pub fn new(verbose: bool, quiet: bool) -> Self {
        Self { verbose, quiet }
    }

    /// Detail line, only with `--verbose`.
    pub fn verbose(&self, message: &str) -> io::Result<()> {
        if !self.verbose || self.quiet {
            return Ok(());
        }
        writeln!(io::stdout().lock(), "    {message}")
    }

    /// Progress line.
    pub fn progress(&self, message: &str) -> io::Result<()> {
        if self.quiet {
            return Ok(());
        }
        writeln!(io::stdout().lock(), "{message}")
    }

    /// Success line.
    pub fn success(&self, message: &str) -> io::Result<()> {
        if self.quiet {
            return Ok(());
        }
        writeln!(io::stdout().lock(), "OK  {message}")
    }

    /// Warning line, on stderr. Shown even when quiet.
    pub fn warn(&self, message: &str) -> io::Result<()> {
        writeln!(io::stderr().lock(), "!!  {message}")
    }

    /// Section header.
    pub fn section(&self, title: &str) -> io::Result<()> {
        if self.quiet {
            return Ok(());
        }
        let mut out = io::stdout().lock();
        writeln!(out)?;
        writeln!(out, "{title}")?;
        writeln!(out, "{}", "-".repeat(title.len()))
    }

    /// Indented detail line.
    pub fn indent(&self, message: &str) -> io::Result<()> {
        if self.quiet {
            return Ok(());
        }
        writeln!(io::stdout().lock(), "    {message}")
    }
}
