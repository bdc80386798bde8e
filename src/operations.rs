//! Filesystem and environment abstractions for dependency injection.
//!
//! Provides the [`FileSystemOps`] and [`Environment`] traits so that sheet
//! loading and file-list resolution can be unit-tested without touching the
//! real filesystem or process environment.  Production code uses
//! [`SystemFileSystemOps`] and [`SystemEnvironment`]; tests use
//! `MockFileSystemOps` and [`FixedEnvironment`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Abstraction over the filesystem queries the engine needs.
pub trait FileSystemOps: Send + Sync + std::fmt::Debug {
    /// Read a whole file as UTF-8 text.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    fn read_to_string(&self, path: &Path) -> std::io::Result<String>;

    /// Returns `true` if `path` exists.
    fn exists(&self, path: &Path) -> bool;

    /// The directory relative paths and default list roots resolve against.
    fn current_dir(&self) -> PathBuf;

    /// Return the regular files matching `pattern`, rooted at `root`, sorted.
    ///
    /// Absolute patterns ignore `root`.  Returned paths are absolute when
    /// `root` is.
    ///
    /// # Errors
    ///
    /// Returns an error if `pattern` is not a valid glob.
    fn glob(&self, root: &Path, pattern: &str) -> Result<Vec<PathBuf>, glob::PatternError>;

    /// Canonical form of `path` used to recognise the same file reached
    /// through different spellings.  Falls back to `path` itself.
    fn canonicalize(&self, path: &Path) -> PathBuf {
        path.to_path_buf()
    }
}

/// Join `pattern` onto `root`, escaping glob metacharacters in the root.
#[must_use]
pub fn rooted_pattern(root: &Path, pattern: &str) -> String {
    if Path::new(pattern).is_absolute() {
        return pattern.to_string();
    }
    let root = root.to_string_lossy();
    let escaped = glob::Pattern::escape(root.trim_end_matches(['/', '\\']));
    let pattern = pattern.trim_start_matches("./");
    format!("{escaped}{}{pattern}", std::path::MAIN_SEPARATOR)
}

/// Production [`FileSystemOps`] implementation backed by [`std::fs`] and the
/// `glob` crate.
#[derive(Debug, Default)]
pub struct SystemFileSystemOps {
    base_dir: Option<PathBuf>,
}

impl SystemFileSystemOps {
    /// Use the process working directory as the current directory.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_dir: None }
    }

    /// Use `dir` instead of the process working directory.
    #[must_use]
    pub const fn with_base_dir(dir: PathBuf) -> Self {
        Self {
            base_dir: Some(dir),
        }
    }
}

impl FileSystemOps for SystemFileSystemOps {
    fn read_to_string(&self, path: &Path) -> std::io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn current_dir(&self) -> PathBuf {
        self.base_dir.clone().unwrap_or_else(|| {
            std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
        })
    }

    fn glob(&self, root: &Path, pattern: &str) -> Result<Vec<PathBuf>, glob::PatternError> {
        let full = rooted_pattern(root, pattern);
        let mut matches: Vec<PathBuf> = glob::glob(&full)?
            .filter_map(Result::ok)
            .filter(|p| p.is_file())
            .collect();
        matches.sort();
        Ok(matches)
    }

    fn canonicalize(&self, path: &Path) -> PathBuf {
        dunce::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
    }
}

/// Abstraction over process environment lookups.
pub trait Environment: Send + Sync + std::fmt::Debug {
    /// Value of the environment variable `name`, if set and valid Unicode.
    fn var(&self, name: &str) -> Option<String>;
}

/// Production [`Environment`] reading the process environment.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemEnvironment;

impl Environment for SystemEnvironment {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

/// An [`Environment`] with a fixed set of variables.
///
/// Used by tests and by embedders that want resolution to be independent of
/// the process environment.
#[derive(Debug, Default, Clone)]
pub struct FixedEnvironment {
    vars: HashMap<String, String>,
}

impl FixedEnvironment {
    /// Create an empty environment.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a variable.
    #[must_use]
    pub fn with_var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }
}

impl Environment for FixedEnvironment {
    fn var(&self, name: &str) -> Option<String> {
        self.vars.get(name).cloned()
    }
}

/// In-memory [`FileSystemOps`] for unit tests.
///
/// Pre-configure files and the current directory with the builder-style
/// methods; `glob` matches the configured file paths with the same
/// component-wise semantics as the real implementation.
#[cfg(test)]
#[derive(Debug)]
pub struct MockFileSystemOps {
    files: std::collections::BTreeMap<PathBuf, String>,
    cwd: PathBuf,
}

#[cfg(test)]
impl Default for MockFileSystemOps {
    fn default() -> Self {
        Self {
            files: std::collections::BTreeMap::new(),
            cwd: PathBuf::from("/work"),
        }
    }
}

#[cfg(test)]
impl MockFileSystemOps {
    /// Create an empty mock whose current directory is `/work`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an empty file.
    #[must_use]
    pub fn with_file(self, path: impl Into<PathBuf>) -> Self {
        self.with_contents(path, "")
    }

    /// Add a file with contents.
    #[must_use]
    pub fn with_contents(mut self, path: impl Into<PathBuf>, contents: &str) -> Self {
        self.files.insert(path.into(), contents.to_string());
        self
    }

    /// Set the current directory.
    #[must_use]
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = cwd.into();
        self
    }
}

#[cfg(test)]
impl FileSystemOps for MockFileSystemOps {
    fn read_to_string(&self, path: &Path) -> std::io::Result<String> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "mock: no such file"))
    }

    fn exists(&self, path: &Path) -> bool {
        self.files.contains_key(path)
            || self.files.keys().any(|f| f.starts_with(path))
    }

    fn current_dir(&self) -> PathBuf {
        self.cwd.clone()
    }

    fn glob(&self, root: &Path, pattern: &str) -> Result<Vec<PathBuf>, glob::PatternError> {
        let compiled = glob::Pattern::new(&rooted_pattern(root, pattern))?;
        let options = glob::MatchOptions {
            require_literal_separator: true,
            ..glob::MatchOptions::new()
        };
        Ok(self
            .files
            .keys()
            .filter(|f| compiled.matches_path_with(f, options))
            .cloned()
            .collect())
    }
}
