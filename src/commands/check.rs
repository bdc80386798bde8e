//! Command: resolve everything and fail on problems.
use anyhow::Result;

use crate::cli::GlobalOpts;
use crate::diagnostics::Severity;
use crate::logging::Logger;

/// Resolve the package, every file list and every role, then print the
/// diagnostics summary.
///
/// # Errors
///
/// Returns an error if setup fails, if any error was reported, or, when the
/// config sets `strict`, if any warning was reported.
pub fn run(global: &GlobalOpts, log: &Logger) -> Result<()> {
    let mut setup = super::CommandSetup::init(global, log)?;
    log.stage(&format!("Checking {}", global.sheet.display()));
    setup.session.resolve_all();

    let summary = log.print_summary(setup.session.diagnostics());
    let diagnostics = setup.session.diagnostics().snapshot();
    if let Some(first) = diagnostics.iter().find(|d| d.severity == Severity::Error) {
        return Err(anyhow::Error::new(first.to_end_user_error())
            .context(format!("{} error(s) found", summary.errors)));
    }
    if setup.config.strict && summary.warnings > 0 {
        anyhow::bail!("{} warning(s) found (strict)", summary.warnings);
    }
    Ok(())
}
