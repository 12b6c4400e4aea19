//! `reset [path]`: drops and recreates the catalog for a working root.
//!
//! Grounded on `cli.py::reset` (confirm, then `drop_tables`/`create_tables`).

use std::path::PathBuf;

use anyhow::{Context, Result};
use log::warn;

use sortomatic::catalog::Catalog;

use crate::cli::GlobalOptions;

const DATA_FOLDER_NAME: &str = ".sortomatic";
const DB_NAME: &str = "sortomatic.db";

pub fn run_reset(path: Option<PathBuf>, _options: GlobalOptions) -> Result<()> {
    let base_path = match path {
        Some(p) => p,
        None => std::env::current_dir().context("resolving current directory")?,
    };
    let data_dir = base_path.join(DATA_FOLDER_NAME);
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("creating {}", data_dir.display()))?;
    let db_path = data_dir.join(DB_NAME);

    eprint!("This will drop the existing catalog at {}. Continue? [y/N] ", db_path.display());
    use std::io::Write;
    std::io::stderr().flush().ok();
    let mut answer = String::new();
    std::io::stdin().read_line(&mut answer).ok();
    if !matches!(answer.trim().to_lowercase().as_str(), "y" | "yes") {
        warn!("aborted: catalog reset was not confirmed");
        return Ok(());
    }

    let catalog = Catalog::open(&db_path)?;
    catalog.reset()?;
    warn!("catalog reset at {}", db_path.display());
    Ok(())
}
