//! Structured, non-fatal problem reporting.
//!
//! Every expected domain condition (an unknown list, a cycle, a glob that
//! matched nothing, ...) is reported here instead of being returned as an
//! error, so that one malformed rule never prevents resolving the rest of a
//! sheet.  Each report is recorded for later inspection and also emitted as
//! a [`tracing`] event on the `pkgrules::diagnostic` target.
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;

use crate::error::EndUserError;

/// Target of the events emitted for each reported diagnostic.
pub const DIAGNOSTIC_TARGET: &str = "pkgrules::diagnostic";

/// How serious a diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Resolution produced a usable, possibly degraded, result.
    Warning,
    /// Part of the requested result could not be produced.
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Machine-readable identifier of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MessageCode {
    /// The tokenizer met text it could not classify.
    LexicalAnomaly,
    /// The parser met an unexpected token.
    SyntaxError,
    /// An `@import` names a file that does not exist.
    UnknownImport,
    /// An `@import` names a file that is already being loaded.
    CircularImport,
    /// A referenced file list is not defined.
    UnknownFileList,
    /// A file list references itself, directly or transitively.
    CircularReference,
    /// More than one rule defines the same selector.
    AmbiguousDefinition,
    /// A glob pattern matched no files.
    ZeroMatches,
    /// A property holds a value outside its set of options.
    InvalidEnumOption,
    /// A glob pattern could not be parsed.
    InvalidPattern,
    /// A `${...}` reference could not be resolved.
    UnresolvedMacro,
    /// A `${...}` reference expands to itself.
    CircularMacro,
}

impl MessageCode {
    /// Stable name used in console output and JSON.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LexicalAnomaly => "LexicalAnomaly",
            Self::SyntaxError => "SyntaxError",
            Self::UnknownImport => "UnknownImport",
            Self::CircularImport => "CircularImport",
            Self::UnknownFileList => "UnknownFileList",
            Self::CircularReference => "CircularReference",
            Self::AmbiguousDefinition => "AmbiguousDefinition",
            Self::ZeroMatches => "ZeroMatches",
            Self::InvalidEnumOption => "InvalidEnumOption",
            Self::InvalidPattern => "InvalidPattern",
            Self::UnresolvedMacro => "UnresolvedMacro",
            Self::CircularMacro => "CircularMacro",
        }
    }
}

impl fmt::Display for MessageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A position in a source document.
///
/// `line` and `column` are 1-based.  In-memory sheets have no file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize)]
pub struct SourceLocation {
    /// Source file, shared by every location in that file.
    pub file: Option<Arc<Path>>,
    /// 1-based line.
    pub line: usize,
    /// 1-based column.
    pub column: usize,
}

impl SourceLocation {
    /// Create a location in `file`.
    #[must_use]
    pub const fn new(file: Option<Arc<Path>>, line: usize, column: usize) -> Self {
        Self { file, line, column }
    }

    /// Directory containing the source file, if the location has one.
    #[must_use]
    pub fn directory(&self) -> Option<PathBuf> {
        self.file
            .as_deref()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.file {
            Some(file) => write!(f, "{}({},{})", file.display(), self.line, self.column),
            None => write!(f, "<sheet>({},{})", self.line, self.column),
        }
    }
}

/// A single reported problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    /// How serious the problem is.
    pub severity: Severity,
    /// What kind of problem it is.
    pub code: MessageCode,
    /// Where it was found, when known.
    pub location: Option<SourceLocation>,
    /// Human-readable description.
    pub message: String,
}

impl Diagnostic {
    /// Create a warning.
    #[must_use]
    pub fn warning(code: MessageCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            code,
            location: None,
            message: message.into(),
        }
    }

    /// Create an error.
    #[must_use]
    pub fn error(code: MessageCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            code,
            location: None,
            message: message.into(),
        }
    }

    /// Attach a source location.
    #[must_use]
    pub fn at(mut self, location: Option<&SourceLocation>) -> Self {
        self.location = location.cloned();
        self
    }

    /// The fatal form of this diagnostic, keeping its position.
    #[must_use]
    pub fn to_end_user_error(&self) -> EndUserError {
        let error = EndUserError::new(format!("{}: {}", self.code, self.message));
        match &self.location {
            Some(location) => {
                let error = error.at(location.line, location.column);
                match &location.file {
                    Some(file) => error.in_file(file),
                    None => error,
                }
            }
            None => error,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(location) = &self.location {
            write!(f, "{location}: ")?;
        }
        write!(f, "{} {}: {}", self.severity, self.code, self.message)
    }
}

/// Collector for the diagnostics of one resolution session.
///
/// Reports go through a shared reference so that read-only resolution steps
/// (macro expansion, for instance) can still report.
#[derive(Debug, Default)]
pub struct Diagnostics {
    entries: Mutex<Vec<Diagnostic>>,
    once: Mutex<HashSet<String>>,
}

impl Diagnostics {
    /// Create an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a diagnostic and emit it as a tracing event.
    pub fn report(&self, diagnostic: Diagnostic) {
        match diagnostic.severity {
            Severity::Warning => {
                tracing::warn!(target: DIAGNOSTIC_TARGET, code = %diagnostic.code, "{diagnostic}");
            }
            Severity::Error => {
                tracing::error!(target: DIAGNOSTIC_TARGET, code = %diagnostic.code, "{diagnostic}");
            }
        }
        self.lock_entries().push(diagnostic);
    }

    /// Record a diagnostic unless one was already reported under `key`.
    ///
    /// Returns `true` if the diagnostic was recorded.
    pub fn report_once(&self, key: impl Into<String>, diagnostic: Diagnostic) -> bool {
        let fresh = self
            .once
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into());
        if fresh {
            self.report(diagnostic);
        }
        fresh
    }

    /// Return a copy of everything reported so far, in report order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Diagnostic> {
        self.lock_entries().clone()
    }

    /// Number of diagnostics with the given severity.
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.lock_entries()
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }

    /// Number of diagnostics with the given code.
    #[must_use]
    pub fn count_code(&self, code: MessageCode) -> usize {
        self.lock_entries().iter().filter(|d| d.code == code).count()
    }

    /// Return `true` if any error has been reported.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.count(Severity::Error) > 0
    }

    /// Return `true` if nothing has been reported.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock_entries().is_empty()
    }

    // Entries are only ever appended, so a poisoned list is still whole.
    fn lock_entries(&self) -> MutexGuard<'_, Vec<Diagnostic>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
#[allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::panic
)]
mod tests {
    use super::*;

    fn location() -> SourceLocation {
        SourceLocation::new(Some(Arc::from(Path::new("pkg.sheet"))), 3, 7)
    }

    #[test]
    fn diagnostic_display_with_location() {
        let d = Diagnostic::error(MessageCode::UnknownFileList, "unknown file list 'x'")
            .at(Some(&location()));
        assert_eq!(
            d.to_string(),
            "pkg.sheet(3,7): error UnknownFileList: unknown file list 'x'"
        );
    }

    #[test]
    fn diagnostic_display_without_location() {
        let d = Diagnostic::warning(MessageCode::ZeroMatches, "no files match '*.dll'");
        assert_eq!(d.to_string(), "warning ZeroMatches: no files match '*.dll'");
    }

    #[test]
    fn in_memory_location_display() {
        let loc = SourceLocation::new(None, 1, 2);
        assert_eq!(loc.to_string(), "<sheet>(1,2)");
        assert!(loc.directory().is_none());
    }

    #[test]
    fn location_directory_is_parent_of_file() {
        let loc = SourceLocation::new(Some(Arc::from(Path::new("/a/b/c.sheet"))), 1, 1);
        assert_eq!(loc.directory(), Some(PathBuf::from("/a/b")));
    }

    #[test]
    fn report_records_in_order() {
        let diags = Diagnostics::new();
        diags.report(Diagnostic::warning(MessageCode::ZeroMatches, "a"));
        diags.report(Diagnostic::error(MessageCode::UnknownFileList, "b"));
        let all = diags.snapshot();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].message, "a");
        assert_eq!(all[1].message, "b");
        assert_eq!(diags.count(Severity::Warning), 1);
        assert_eq!(diags.count(Severity::Error), 1);
        assert!(diags.has_errors());
    }

    #[test]
    fn report_once_suppresses_repeats() {
        let diags = Diagnostics::new();
        assert!(diags.report_once("cycle:a", Diagnostic::error(MessageCode::CircularReference, "a")));
        assert!(!diags.report_once("cycle:a", Diagnostic::error(MessageCode::CircularReference, "a")));
        assert!(diags.report_once("cycle:b", Diagnostic::error(MessageCode::CircularReference, "b")));
        assert_eq!(diags.count_code(MessageCode::CircularReference), 2);
    }

    #[test]
    fn end_user_error_keeps_the_position() {
        let d = Diagnostic::error(MessageCode::UnknownFileList, "file list 'x' is not defined")
            .at(Some(&location()));
        assert_eq!(
            d.to_end_user_error().to_string(),
            "pkg.sheet(3,7): error: UnknownFileList: file list 'x' is not defined"
        );
        let bare = Diagnostic::error(MessageCode::InvalidPattern, "bad");
        assert_eq!(bare.to_end_user_error().to_string(), "error: InvalidPattern: bad");
    }

    #[test]
    fn poisoned_collector_keeps_reporting() {
        let diags = Diagnostics::new();
        diags.report(Diagnostic::warning(MessageCode::ZeroMatches, "before"));
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = diags.entries.lock().unwrap();
            panic!("reporter died holding the lock");
        }));
        assert!(diags.entries.is_poisoned());

        diags.report(Diagnostic::error(MessageCode::UnknownFileList, "after"));
        assert!(diags.report_once("k", Diagnostic::warning(MessageCode::ZeroMatches, "once")));
        assert_eq!(diags.snapshot().len(), 3);
        assert!(diags.has_errors());
    }

    #[test]
    fn empty_collector() {
        let diags = Diagnostics::new();
        assert!(diags.is_empty());
        assert!(!diags.has_errors());
    }

    #[test]
    fn severity_orders_warning_before_error() {
        assert!(Severity::Warning < Severity::Error);
    }
}
