//! Command: list the package and its roles.
use anyhow::Result;

use crate::cli::GlobalOpts;
use crate::logging::Logger;

/// Print the package metadata and every role with its resolved files.
///
/// # Errors
///
/// Returns an error if setup fails.
pub fn run(global: &GlobalOpts, log: &Logger) -> Result<()> {
    let mut setup = super::CommandSetup::init(global, log)?;
    let session = &mut setup.session;

    let package = session.package();
    log.stage("Package");
    let field = |value: &Option<String>| value.clone().unwrap_or_else(|| "-".to_string());
    log.info(&format!("name:      {}", field(&package.name)));
    log.info(&format!("version:   {}", field(&package.version)));
    log.info(&format!("arch:      {}", field(&package.arch)));
    log.info(&format!("publisher: {}", field(&package.publisher)));
    if package.synthesized {
        log.warn("sheet has no package rule");
    }

    let roles = session.roles();
    if roles.is_empty() {
        log.info("no roles defined");
    }
    for role in roles {
        log.stage(&format!("{}[{}]", role.kind, role.name));
        for entry in session.role_files(&role) {
            println!(
                "  {} -> {}",
                entry.source.display(),
                entry.destination.display()
            );
        }
    }

    log.print_summary(session.diagnostics());
    Ok(())
}
