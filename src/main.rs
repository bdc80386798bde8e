use anyhow::Result;
use clap::Parser;

use pkgrules::cli::{Cli, Command};
use pkgrules::{commands, logging};

fn main() -> Result<()> {
    let _ = enable_ansi_support::enable_ansi_support();
    let args = Cli::parse();
    let name = args.command.name();
    logging::init_subscriber(args.verbose, name);
    let log = logging::Logger::new(name);

    match &args.command {
        Command::Tokens => commands::tokens::run(&args.global, &log),
        Command::Files(opts) => commands::files::run(&args.global, opts, &log),
        Command::Eval(opts) => commands::eval::run(&args.global, opts, &log),
        Command::Roles => commands::roles::run(&args.global, &log),
        Command::Check => commands::check::run(&args.global, &log),
        Command::Version => {
            commands::version::run();
            Ok(())
        }
    }
}
