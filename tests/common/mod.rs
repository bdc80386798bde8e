// Shared helpers for integration tests.
//
// Provides a temporary-directory-backed package tree and a fluent builder so
// each integration test can lay out sheets and build output without
// repeating filesystem boilerplate.
//
// Used by all integration test binaries that declare `mod common;`.
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use pkgrules::cli::GlobalOpts;
use pkgrules::operations::{FixedEnvironment, SystemFileSystemOps};
use pkgrules::resolve::Session;

/// Name of the root sheet written by [`TestContextBuilder::with_sheet`].
pub const ROOT_SHEET: &str = "package.sheet";

/// An isolated package tree backed by a [`tempfile::TempDir`].
///
/// The directory is automatically deleted when dropped.
pub struct IntegrationTestContext {
    /// Temporary directory holding the sheets and files.
    pub root: tempfile::TempDir,
}

impl IntegrationTestContext {
    /// Path to the tree root.
    pub fn root_path(&self) -> &Path {
        self.root.path()
    }

    /// Path to the root sheet.
    pub fn sheet_path(&self) -> PathBuf {
        self.root.path().join(ROOT_SHEET)
    }

    /// Load the root sheet into a session with an empty environment.
    pub fn session(&self) -> Session {
        self.session_with_env(FixedEnvironment::new())
    }

    /// Load the root sheet into a session with the given environment.
    pub fn session_with_env(&self, env: FixedEnvironment) -> Session {
        Session::builder()
            .with_fs(Arc::new(SystemFileSystemOps::with_base_dir(
                self.root_path().to_path_buf(),
            )))
            .with_env(Arc::new(env))
            .load(&self.sheet_path())
            .expect("load sheet")
    }

    /// Command-line options pointing at the root sheet.
    pub fn global_opts(&self) -> GlobalOpts {
        GlobalOpts {
            sheet: self.sheet_path(),
            config: None,
            defines: Vec::new(),
            base_dir: Some(self.root_path().to_path_buf()),
        }
    }
}

/// Fluent builder for [`IntegrationTestContext`].
///
/// # Examples
///
/// ```ignore
/// let ctx = TestContextBuilder::new()
///     .with_sheet("files[bin] { include: \"out/*.dll\"; }")
///     .with_file("out/a.dll")
///     .build();
/// ```
pub struct TestContextBuilder {
    root: tempfile::TempDir,
}

impl TestContextBuilder {
    /// Start from an empty temporary directory.
    pub fn new() -> Self {
        Self {
            root: tempfile::tempdir().expect("create temp dir"),
        }
    }

    /// Write the root sheet.
    pub fn with_sheet(self, text: &str) -> Self {
        self.with_text(ROOT_SHEET, text)
    }

    /// Write a text file (an imported sheet, a config file) at `relative`.
    pub fn with_text(self, relative: &str, text: &str) -> Self {
        let path = self.root.path().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create parent dir");
        }
        std::fs::write(&path, text).expect("write text file");
        self
    }

    /// Create an empty build output file at `relative`.
    pub fn with_file(self, relative: &str) -> Self {
        self.with_text(relative, "")
    }

    /// Create several empty build output files.
    pub fn with_files(self, relatives: &[&str]) -> Self {
        relatives.iter().fold(self, |b, r| b.with_file(r))
    }

    /// Finish building.
    pub fn build(self) -> IntegrationTestContext {
        IntegrationTestContext { root: self.root }
    }
}

/// Destinations of a list's entries as `/`-joined strings, for
/// platform-independent assertions.
pub fn destinations(entries: &[pkgrules::resolve::files::FileEntry]) -> Vec<String> {
    entries
        .iter()
        .map(|e| {
            e.destination
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/")
        })
        .collect()
}
