//! Command-line argument parsing for sortomatic.
//!
//! Hand-rolled over `std::env::args()`, matching the teacher's own dispatch
//! shape (`parse_args() -> Result<Command>`, one `parse_*_args` function per
//! subcommand, small shared helpers for flag extraction) rather than pulling
//! in an argument-parsing crate.

use std::path::PathBuf;

use anyhow::{anyhow, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanMode {
    All,
    Index,
    Category,
    Hash,
}

#[derive(Debug, Clone)]
pub struct GlobalOptions {
    pub verbose: bool,
    pub threads: Option<usize>,
    pub reset: bool,
    pub config_dir: Option<PathBuf>,
    pub cache_dir: Option<PathBuf>,
}

impl Default for GlobalOptions {
    fn default() -> Self {
        GlobalOptions {
            verbose: false,
            threads: None,
            reset: false,
            config_dir: None,
            cache_dir: None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Command {
    Scan {
        mode: ScanMode,
        path: Option<PathBuf>,
        options: GlobalOptions,
    },
    Stats {
        path: Option<PathBuf>,
        options: GlobalOptions,
    },
    Reset {
        path: Option<PathBuf>,
        options: GlobalOptions,
    },
}

pub fn print_usage() {
    eprintln!("sortomatic - local file cataloging pipeline");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  sortomatic scan all <PATH> [options]       index, categorize, and hash PATH");
    eprintln!("  sortomatic scan index <PATH> [options]     only populate rows for PATH");
    eprintln!("  sortomatic scan category [options]         fill categories for existing rows");
    eprintln!("  sortomatic scan hash [options]              fill hashes for existing rows");
    eprintln!("  sortomatic stats [PATH] [options]          print category counts");
    eprintln!("  sortomatic reset [PATH] [options]          drop and recreate the catalog");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --verbose            Enable debug-level logging");
    eprintln!("  --threads <N>        Override the worker thread count");
    eprintln!("  --reset              Drop the catalog before running");
    eprintln!("  --config <DIR>       Load settings.toml/filetypes.toml from DIR");
    eprintln!("  --cache <DIR>        Use DIR for the catalog database instead of the default");
    eprintln!("  --help, -h           Show this message");
}

/// Parses `std::env::args()` into a [`Command`]. Mirrors the teacher's
/// `command = &args[1]` dispatch, with `scan` further dispatching on its own
/// first positional argument.
pub fn parse_args() -> Result<Command> {
    let args: Vec<String> = std::env::args().collect();
    parse_args_from(&args[1..])
}

fn parse_args_from(args: &[String]) -> Result<Command> {
    if args.is_empty() {
        return Err(anyhow!("missing command"));
    }

    if args[0] == "--help" || args[0] == "-h" {
        print_usage();
        std::process::exit(0);
    }

    match args[0].as_str() {
        "scan" => parse_scan_args(&args[1..]),
        "stats" => parse_stats_args(&args[1..]),
        "reset" => parse_reset_args(&args[1..]),
        other => Err(anyhow!("unknown command: {other}")),
    }
}

fn parse_scan_args(args: &[String]) -> Result<Command> {
    if args.is_empty() {
        return Err(anyhow!("scan requires a mode: all, index, category, or hash"));
    }

    let mode = match args[0].as_str() {
        "all" => ScanMode::All,
        "index" => ScanMode::Index,
        "category" => ScanMode::Category,
        "hash" => ScanMode::Hash,
        other => return Err(anyhow!("unknown scan mode: {other}")),
    };

    let rest = &args[1..];
    let mut path: Option<PathBuf> = None;
    let mut options = GlobalOptions::default();

    let mut i = 0;
    while i < rest.len() {
        match rest[i].as_str() {
            "--verbose" => {
                options.verbose = true;
                i += 1;
            }
            "--reset" => {
                options.reset = true;
                i += 1;
            }
            "--threads" => options.threads = Some(parse_int_arg(rest, &mut i, "--threads")?),
            "--config" => options.config_dir = Some(parse_path_arg(rest, &mut i, "--config")?),
            "--cache" => options.cache_dir = Some(parse_path_arg(rest, &mut i, "--cache")?),
            other if !other.starts_with('-') && path.is_none() => {
                path = Some(PathBuf::from(other));
                i += 1;
            }
            other => return Err(anyhow!("unknown argument: {other}")),
        }
    }

    if matches!(mode, ScanMode::All | ScanMode::Index) && path.is_none() {
        return Err(anyhow!("scan {:?} requires a <PATH>", mode));
    }

    Ok(Command::Scan { mode, path, options })
}

fn parse_stats_args(args: &[String]) -> Result<Command> {
    let (path, options) = parse_path_and_options(args)?;
    Ok(Command::Stats { path, options })
}

fn parse_reset_args(args: &[String]) -> Result<Command> {
    let (path, options) = parse_path_and_options(args)?;
    Ok(Command::Reset { path, options })
}

fn parse_path_and_options(args: &[String]) -> Result<(Option<PathBuf>, GlobalOptions)> {
    let mut path: Option<PathBuf> = None;
    let mut options = GlobalOptions::default();

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--verbose" => {
                options.verbose = true;
                i += 1;
            }
            "--reset" => {
                options.reset = true;
                i += 1;
            }
            "--threads" => options.threads = Some(parse_int_arg(args, &mut i, "--threads")?),
            "--config" => options.config_dir = Some(parse_path_arg(args, &mut i, "--config")?),
            "--cache" => options.cache_dir = Some(parse_path_arg(args, &mut i, "--cache")?),
            other if !other.starts_with('-') && path.is_none() => {
                path = Some(PathBuf::from(other));
                i += 1;
            }
            other => return Err(anyhow!("unknown argument: {other}")),
        }
    }

    Ok((path, options))
}

fn parse_required_arg(args: &[String], i: &mut usize, flag: &str) -> Result<String> {
    if *i + 1 >= args.len() {
        return Err(anyhow!("{flag} requires an argument"));
    }
    let value = args[*i + 1].clone();
    *i += 2;
    Ok(value)
}

fn parse_path_arg(args: &[String], i: &mut usize, flag: &str) -> Result<PathBuf> {
    let value = parse_required_arg(args, i, flag)?;
    Ok(PathBuf::from(value))
}

fn parse_int_arg<T: std::str::FromStr>(args: &[String], i: &mut usize, flag: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    let value = parse_required_arg(args, i, flag)?;
    value
        .parse::<T>()
        .map_err(|e| anyhow!("invalid value for {flag}: {e}"))
}
