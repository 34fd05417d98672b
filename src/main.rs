#![allow(clippy::too_many_arguments)]

mod cli;
mod logger;

use std::process::ExitCode;

use clap::Parser;

fn main() -> ExitCode {
    let args = cli::CliArgs::parse();
    if let Some(path) = logger::init(args.log_file.as_deref(), args.verbose) {
        tracing::info!(log = %path.display(), "photoforge batch run");
    }
    cli::run(args)
}
