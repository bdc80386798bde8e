//! Core logging types: the [`Log`] trait and the diagnostics summary.
use std::collections::BTreeMap;

use crate::diagnostics::{Diagnostic, MessageCode, Severity};

/// Abstraction over logging backends.
///
/// Command code logs through this trait so that tests can substitute a
/// recording implementation for the console [`Logger`](super::logger::Logger).
pub trait Log: Send + Sync {
    /// Log a stage header (major section).
    fn stage(&self, msg: &str);
    /// Log an informational message.
    fn info(&self, msg: &str);
    /// Log a debug message (may be suppressed on console).
    fn debug(&self, msg: &str);
    /// Log a warning message.
    fn warn(&self, msg: &str);
    /// Log an error message.
    fn error(&self, msg: &str);
}

/// Counts of reported diagnostics, by severity and by code.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiagnosticSummary {
    /// Number of warnings.
    pub warnings: usize,
    /// Number of errors.
    pub errors: usize,
    /// Number of diagnostics per code, in code order.
    pub by_code: BTreeMap<&'static str, usize>,
}

impl DiagnosticSummary {
    /// Tally `diagnostics`.
    #[must_use]
    pub fn from_diagnostics(diagnostics: &[Diagnostic]) -> Self {
        let mut summary = Self::default();
        for d in diagnostics {
            match d.severity {
                Severity::Warning => summary.warnings += 1,
                Severity::Error => summary.errors += 1,
            }
            *summary.by_code.entry(MessageCode::as_str(d.code)).or_insert(0) += 1;
        }
        summary
    }

    /// Returns `true` if nothing was reported.
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        self.warnings == 0 && self.errors == 0
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn summary_counts_severities_and_codes() {
        let diags = vec![
            Diagnostic::warning(MessageCode::ZeroMatches, "a"),
            Diagnostic::warning(MessageCode::ZeroMatches, "b"),
            Diagnostic::error(MessageCode::CircularReference, "c"),
        ];
        let summary = DiagnosticSummary::from_diagnostics(&diags);
        assert_eq!(summary.warnings, 2);
        assert_eq!(summary.errors, 1);
        assert_eq!(summary.by_code["ZeroMatches"], 2);
        assert_eq!(summary.by_code["CircularReference"], 1);
        assert!(!summary.is_clean());
    }

    #[test]
    fn empty_summary_is_clean() {
        assert!(DiagnosticSummary::from_diagnostics(&[]).is_clean());
    }
}
