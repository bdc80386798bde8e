//! Error types for the rule-sheet engine.
//!
//! Almost every problem found while resolving a sheet is *not* an error in
//! the Rust sense: unknown references, cycles, ambiguous definitions and the
//! like are reported through [`Diagnostics`](crate::diagnostics::Diagnostics)
//! and resolution carries on with a partial result.  The types here cover
//! the conditions that make resolution impossible to continue at all.
//!
//! # Error hierarchy
//!
//! ```text
//! Error
//! ├── EndUser(EndUserError): the root document cannot be used
//! └── Config(ConfigError): session configuration cannot be loaded
//! ```
//!
//! Command handlers at the CLI boundary convert these to [`anyhow::Error`]
//! via the standard `?` operator.

use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Convenience alias used throughout the library.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Top-level error type for the engine.
#[derive(Error, Debug)]
pub enum Error {
    /// A fatal, user-facing error that aborts the session.
    #[error(transparent)]
    EndUser(#[from] EndUserError),

    /// Session configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// A fatal error meant for human display.
///
/// Formats as `file(line,column): error: message` so that editors and build
/// logs can jump to the offending location.  Line and column are 1-based;
/// `0` means "unknown" and is omitted from the output.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub struct EndUserError {
    /// Human-readable description of the problem.
    pub message: String,
    /// File the error refers to, if any.
    pub file: Option<PathBuf>,
    /// 1-based line, or `0` when unknown.
    pub line: usize,
    /// 1-based column, or `0` when unknown.
    pub column: usize,
}

impl EndUserError {
    /// Create an error without location information.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            file: None,
            line: 0,
            column: 0,
        }
    }

    /// Attach the file the error refers to.
    #[must_use]
    pub fn in_file(mut self, file: impl AsRef<Path>) -> Self {
        self.file = Some(file.as_ref().to_path_buf());
        self
    }

    /// Attach a 1-based line and column.
    #[must_use]
    pub const fn at(mut self, line: usize, column: usize) -> Self {
        self.line = line;
        self.column = column;
        self
    }
}

impl fmt::Display for EndUserError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.file, self.line, self.column) {
            (Some(file), 0, _) => write!(f, "{}: error: {}", file.display(), self.message),
            (Some(file), line, 0) => {
                write!(f, "{}({line}): error: {}", file.display(), self.message)
            }
            (Some(file), line, column) => write!(
                f,
                "{}({line},{column}): error: {}",
                file.display(),
                self.message
            ),
            (None, _, _) => write!(f, "error: {}", self.message),
        }
    }
}

/// Errors that arise from loading session configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// An I/O error occurred while reading a config file.
    #[error("IO error reading config file {path}: {source}")]
    Io {
        /// Path to the file that could not be read.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The config file is not valid TOML or has the wrong shape.
    #[error("Invalid config in {path}: {message}")]
    InvalidSyntax {
        /// Path to the offending file.
        path: String,
        /// Parser message.
        message: String,
    },

    /// A `KEY=VALUE` define given on the command line is malformed.
    #[error("Invalid define '{0}': expected KEY=VALUE")]
    InvalidDefine(String),
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io;

    // -----------------------------------------------------------------------
    // EndUserError
    // -----------------------------------------------------------------------

    #[test]
    fn end_user_error_with_full_location() {
        let e = EndUserError::new("unexpected end of sheet")
            .in_file("pkg/main.sheet")
            .at(12, 4);
        assert_eq!(
            e.to_string(),
            "pkg/main.sheet(12,4): error: unexpected end of sheet"
        );
    }

    #[test]
    fn end_user_error_with_line_only() {
        let e = EndUserError::new("bad").in_file("a.sheet").at(3, 0);
        assert_eq!(e.to_string(), "a.sheet(3): error: bad");
    }

    #[test]
    fn end_user_error_with_file_only() {
        let e = EndUserError::new("cannot locate root sheet").in_file("missing.sheet");
        assert_eq!(
            e.to_string(),
            "missing.sheet: error: cannot locate root sheet"
        );
    }

    #[test]
    fn end_user_error_without_location() {
        let e = EndUserError::new("nothing to do");
        assert_eq!(e.to_string(), "error: nothing to do");
    }

    // -----------------------------------------------------------------------
    // ConfigError
    // -----------------------------------------------------------------------

    #[test]
    fn config_error_io_display() {
        let e = ConfigError::Io {
            path: "/conf/pkgrules.toml".to_string(),
            source: io::Error::new(io::ErrorKind::NotFound, "no such file"),
        };
        assert!(e.to_string().contains("/conf/pkgrules.toml"));
        assert!(e.to_string().contains("IO error reading config file"));
    }

    #[test]
    fn config_error_io_has_source() {
        use std::error::Error as StdError;
        let e = ConfigError::Io {
            path: "/conf/pkgrules.toml".to_string(),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "permission denied"),
        };
        assert!(e.source().is_some());
    }

    #[test]
    fn config_error_invalid_define_display() {
        let e = ConfigError::InvalidDefine("NOEQUALS".to_string());
        assert_eq!(e.to_string(), "Invalid define 'NOEQUALS': expected KEY=VALUE");
    }

    // -----------------------------------------------------------------------
    // Error conversions
    // -----------------------------------------------------------------------

    #[test]
    fn error_from_end_user_error_is_transparent() {
        let e: Error = EndUserError::new("boom").in_file("x.sheet").into();
        assert_eq!(e.to_string(), "x.sheet: error: boom");
    }

    #[test]
    fn error_from_config_error() {
        let e: Error = ConfigError::InvalidDefine("X".to_string()).into();
        assert!(e.to_string().contains("Configuration error"));
    }

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn all_error_types_are_send_sync() {
        assert_send_sync::<Error>();
        assert_send_sync::<EndUserError>();
        assert_send_sync::<ConfigError>();
    }

    #[test]
    fn error_converts_to_anyhow() {
        let e: Error = EndUserError::new("x").into();
        let _anyhow_err: anyhow::Error = e.into();
    }
}
