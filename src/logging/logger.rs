//! Console logger with a diagnostics summary.
use std::path::PathBuf;

use super::subscriber::STAGE_TARGET;
use super::types::{DiagnosticSummary, Log};
use super::utils::log_file_path;
use crate::diagnostics::Diagnostics;

/// Implement the methods of [`Log`] by delegating to inherent methods of the
/// same name on the implementing type.
macro_rules! forward_log_methods {
    ($($method:ident),+ $(,)?) => {
        $(
            fn $method(&self, msg: &str) {
                self.$method(msg);
            }
        )+
    };
}

/// Structured logger for command output.
///
/// All messages are also written to a persistent log file at
/// `$XDG_CACHE_HOME/pkgrules/<command>.log` (default
/// `~/.cache/pkgrules/<command>.log`) with timestamps and ANSI codes
/// stripped, regardless of the verbose flag.
#[derive(Debug)]
pub struct Logger {
    log_file: Option<PathBuf>,
}

impl Logger {
    /// Create a new logger.
    ///
    /// Stores the log file path for display in the summary.  The log file
    /// itself is created by [`init_subscriber`](super::subscriber::init_subscriber).
    #[must_use]
    pub fn new(command: &str) -> Self {
        Self {
            log_file: log_file_path(command),
        }
    }

    /// Return the log file path, if available.
    #[must_use]
    pub const fn log_path(&self) -> Option<&PathBuf> {
        self.log_file.as_ref()
    }

    /// Log an error message.
    pub fn error(&self, msg: &str) {
        tracing::error!("{msg}");
    }

    /// Log a warning message.
    pub fn warn(&self, msg: &str) {
        tracing::warn!("{msg}");
    }

    /// Log a stage header (major section).
    pub fn stage(&self, msg: &str) {
        tracing::info!(target: STAGE_TARGET, "{msg}");
    }

    /// Log an informational message.
    pub fn info(&self, msg: &str) {
        tracing::info!("{msg}");
    }

    /// Log a debug message (suppressed on console unless verbose; always
    /// written to the log file).
    pub fn debug(&self, msg: &str) {
        tracing::debug!("{msg}");
    }

    /// Print a summary of `diagnostics` and return the tally.
    pub fn print_summary(&self, diagnostics: &Diagnostics) -> DiagnosticSummary {
        let summary = DiagnosticSummary::from_diagnostics(&diagnostics.snapshot());

        self.stage("Summary");
        if summary.is_clean() {
            self.info("\x1b[32m✓ no problems found\x1b[0m");
        } else {
            for (code, count) in &summary.by_code {
                self.info(&format!("{code}: {count}"));
            }
            self.info(&format!(
                "\x1b[31m{} error(s)\x1b[0m, \x1b[33m{} warning(s)\x1b[0m",
                summary.errors, summary.warnings
            ));
        }

        if let Some(path) = &self.log_file {
            self.info(&format!("\x1b[2mlog: {}\x1b[0m", path.display()));
        }
        summary
    }
}

impl Log for Logger {
    forward_log_methods!(stage, info, debug, warn, error);
}
