use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Top-level CLI entry point for the rule-sheet resolver.
#[derive(Parser, Debug)]
#[command(
    name = "pkgrules",
    about = "Resolve package rule sheets into file lists and values",
    version = crate::VERSION
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(flatten)]
    pub global: GlobalOpts,
}

/// Options shared across all subcommands.
#[derive(Parser, Debug, Clone)]
pub struct GlobalOpts {
    /// Root rule sheet to load
    #[arg(short, long, global = true, default_value = "package.sheet")]
    pub sheet: PathBuf,

    /// Config file (default: pkgrules.toml next to the sheet)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Define a macro, overriding the config file (repeatable, before the
    /// subcommand)
    #[arg(short = 'D', long = "define", value_name = "KEY=VALUE")]
    pub defines: Vec<String>,

    /// Directory that file-list roots default to (default: current directory)
    #[arg(long, global = true)]
    pub base_dir: Option<PathBuf>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the tokens of the sheet
    Tokens,
    /// Resolve file lists and print their entries
    Files(FilesOpts),
    /// Resolve macros
    Eval(EvalOpts),
    /// List roles and the files they carry
    Roles,
    /// Resolve everything and report problems
    Check,
    /// Print version information
    Version,
}

/// Options for the `files` subcommand.
#[derive(Parser, Debug, Clone)]
pub struct FilesOpts {
    /// Lists to resolve (default: every list in the sheet)
    pub lists: Vec<String>,

    /// Print JSON instead of text
    #[arg(long)]
    pub json: bool,
}

/// Options for the `eval` subcommand.
#[derive(Parser, Debug, Clone)]
pub struct EvalOpts {
    /// Macro names, or text containing `${...}` references with --expand
    #[arg(required = true)]
    pub macros: Vec<String>,

    /// Treat each argument as text and expand every reference in it
    #[arg(long)]
    pub expand: bool,
}

impl Command {
    /// Name used for the per-command log file.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Tokens => "tokens",
            Self::Files(_) => "files",
            Self::Eval(_) => "eval",
            Self::Roles => "roles",
            Self::Check => "check",
            Self::Version => "version",
        }
    }
}
