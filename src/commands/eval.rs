//! Command: resolve or expand macros.
use anyhow::Result;

use crate::cli::{EvalOpts, GlobalOpts};
use crate::logging::Logger;

/// Print the value of each macro, or with `--expand` the expansion of each
/// argument.
///
/// # Errors
///
/// Returns an error if setup fails or any macro has no value.
pub fn run(global: &GlobalOpts, opts: &EvalOpts, log: &Logger) -> Result<()> {
    let setup = super::CommandSetup::init(global, log)?;
    let session = &setup.session;

    let mut missing = 0usize;
    for input in &opts.macros {
        if opts.expand {
            println!("{}", session.expand(input));
            continue;
        }
        match session.resolve_macro(input) {
            Some(value) => println!("{input} = {value}"),
            None => {
                log.warn(&format!("{input}: no value"));
                missing += 1;
            }
        }
    }

    if missing > 0 {
        anyhow::bail!("{missing} macro(s) have no value");
    }
    Ok(())
}
