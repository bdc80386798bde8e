//! Command: dump the tokens of the root sheet.
use std::path::Path;

use anyhow::{Context as _, Result};

use crate::cli::GlobalOpts;
use crate::logging::Logger;
use crate::operations::FileSystemOps;
use crate::sheet::tokenizer::{HyphenatedDialect, TokenKind, Tokens};

/// Print one line per token of the root sheet (imports are not followed).
///
/// # Errors
///
/// Returns an error if the sheet cannot be read.
pub fn run(global: &GlobalOpts, log: &Logger) -> Result<()> {
    let fs = super::file_system(global);
    let (lines, unknown) = token_lines(fs.as_ref(), &global.sheet)?;
    for line in &lines {
        println!("{line}");
    }
    if unknown > 0 {
        log.warn(&format!("{unknown} unrecognized token(s)"));
    }
    Ok(())
}

/// Rendered tokens of the sheet at `path` and the number of unknown ones.
fn token_lines(fs: &dyn FileSystemOps, path: &Path) -> Result<(Vec<String>, usize)> {
    let text = fs
        .read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;

    let mut unknown = 0usize;
    let lines = Tokens::new(&text, HyphenatedDialect)
        .inspect(|token| {
            if token.kind == TokenKind::Unknown {
                unknown += 1;
            }
        })
        .map(|token| token.to_string())
        .collect();
    Ok((lines, unknown))
}
