//! Session configuration: macro defines and strictness.
//!
//! Settings come from an optional TOML file (by default `pkgrules.toml`
//! next to the sheet) and from `-D KEY=VALUE` command-line defines, which
//! take precedence.
//!
//! ```toml
//! strict = true
//!
//! [defines]
//! outdir = "build/out"
//! ```
pub mod toml_loader;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ConfigError;

/// File name looked up next to the sheet when no config path is given.
pub const DEFAULT_CONFIG_FILE: &str = "pkgrules.toml";

/// Settings applied to a resolution session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// Entries seeded into the session macro table.
    pub defines: BTreeMap<String, String>,
    /// Treat warnings as failures in `check`.
    pub strict: bool,
}

impl SessionConfig {
    /// Load the config at `path`; a missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        toml_loader::load_config(path)
    }

    /// The config file to use for `sheet`: `explicit` if given, otherwise
    /// [`DEFAULT_CONFIG_FILE`] in the sheet's directory.
    #[must_use]
    pub fn path_for(sheet: &Path, explicit: Option<&Path>) -> PathBuf {
        explicit.map_or_else(
            || {
                sheet
                    .parent()
                    .unwrap_or_else(|| Path::new(""))
                    .join(DEFAULT_CONFIG_FILE)
            },
            Path::to_path_buf,
        )
    }

    /// Apply `KEY=VALUE` defines on top of the file's defines.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidDefine`] for an entry without `=` or
    /// with an empty key.
    pub fn apply_defines<S: AsRef<str>>(&mut self, defines: &[S]) -> Result<(), ConfigError> {
        for define in defines {
            let (key, value) = parse_define(define.as_ref())?;
            self.defines.insert(key.to_string(), value.to_string());
        }
        Ok(())
    }
}

/// Split `KEY=VALUE`, trimming the key.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidDefine`] if there is no `=` or the key is
/// empty.
pub fn parse_define(define: &str) -> Result<(&str, &str), ConfigError> {
    match define.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => Ok((key.trim(), value)),
        _ => Err(ConfigError::InvalidDefine(define.to_string())),
    }
}
