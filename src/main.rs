use std::process::ExitCode;

use clap::Parser;

use colorbook::cli::{self, CliArgs};
use colorbook::logger;

fn main() -> ExitCode {
    // Initialize session log (overwrites previous session log)
    logger::init();

    let args = CliArgs::parse();
    cli::run(args)
}
