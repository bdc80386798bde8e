pub mod check;
pub mod eval;
pub mod files;
pub mod roles;
pub mod tokens;
pub mod version;

use std::sync::Arc;

use anyhow::{Context as _, Result};

use crate::cli::GlobalOpts;
use crate::config::SessionConfig;
use crate::logging::Logger;
use crate::operations::{FileSystemOps, SystemFileSystemOps};
use crate::resolve::Session;

/// Shared state produced by the common command setup sequence.
///
/// Encapsulates configuration loading and sheet loading so that each
/// command does not have to repeat the boilerplate.
#[derive(Debug)]
pub struct CommandSetup {
    pub config: SessionConfig,
    pub session: Session,
}

impl CommandSetup {
    /// Load the session configuration and the root sheet.
    ///
    /// Progress is logged at debug level so that commands with
    /// machine-readable output keep stdout clean.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be parsed, a define is
    /// malformed, or the root sheet cannot be read.
    pub fn init(global: &GlobalOpts, log: &Logger) -> Result<Self> {
        let config_path = SessionConfig::path_for(&global.sheet, global.config.as_deref());
        log.debug(&format!("config: {}", config_path.display()));
        let mut config = SessionConfig::load(&config_path)
            .with_context(|| format!("loading {}", config_path.display()))?;
        config.apply_defines(&global.defines)?;
        log.debug(&format!(
            "{} define(s), strict: {}",
            config.defines.len(),
            config.strict
        ));

        let fs = file_system(global);
        log.debug(&format!("sheet: {}", global.sheet.display()));
        let session = Session::builder()
            .with_fs(fs)
            .with_macros(config.defines.clone())
            .load(&global.sheet)?;
        log.debug(&format!(
            "loaded {} rule(s) from {} file(s)",
            session.sheet().len(),
            session.sheet().sources().len()
        ));

        Ok(Self { config, session })
    }
}

/// The filesystem commands read through, honouring `--base-dir`.
pub(crate) fn file_system(global: &GlobalOpts) -> Arc<dyn FileSystemOps> {
    Arc::new(
        global
            .base_dir
            .clone()
            .map_or_else(SystemFileSystemOps::new, SystemFileSystemOps::with_base_dir),
    )
}
