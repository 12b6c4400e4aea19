//! sortomatic CLI - walks, categorizes, and hashes a directory tree into a
//! resumable SQLite catalog.
//!
//! Usage: sortomatic <command> [arguments]

mod cli;
mod reset_cmd;
mod scan_cmd;
mod stats_cmd;

use std::process::ExitCode;

use cli::Command;

fn init_logging(verbose: bool) {
    let mut builder = env_logger::Builder::from_default_env();
    builder.filter_level(if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    });
    builder.init();
}

fn main() -> ExitCode {
    let command = match cli::parse_args() {
        Ok(command) => command,
        Err(e) => {
            eprintln!("Error: {e}");
            cli::print_usage();
            return ExitCode::from(1);
        }
    };

    let verbose = match &command {
        Command::Scan { options, .. } => options.verbose,
        Command::Stats { options, .. } => options.verbose,
        Command::Reset { options, .. } => options.verbose,
    };
    init_logging(verbose);

    let result = match command {
        Command::Scan { mode, path, options } => scan_cmd::run_scan(mode, path, options),
        Command::Stats { path, options } => stats_cmd::run_stats(path, options),
        Command::Reset { path, options } => reset_cmd::run_reset(path, options),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}
