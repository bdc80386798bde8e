//! Command: resolve file lists.
use anyhow::Result;

use crate::cli::{FilesOpts, GlobalOpts};
use crate::logging::Logger;
use crate::resolve::files::FileList;

/// Resolve the requested file lists (all lists when none are named) and
/// print their entries.
///
/// # Errors
///
/// Returns an error if setup fails or, with `--json`, if serialization
/// fails.
pub fn run(global: &GlobalOpts, opts: &FilesOpts, log: &Logger) -> Result<()> {
    let mut setup = super::CommandSetup::init(global, log)?;
    let session = &mut setup.session;

    let names = if opts.lists.is_empty() {
        session.file_list_names()
    } else {
        opts.lists.clone()
    };

    let lists: Vec<FileList> = names
        .iter()
        .filter_map(|name| session.get_file_list(name))
        .collect();

    if opts.json {
        println!("{}", serde_json::to_string_pretty(&lists)?);
        return Ok(());
    }

    for list in &lists {
        log.stage(&format!("files[{}] ({} entries)", list.name, list.len()));
        for entry in list.entries() {
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
