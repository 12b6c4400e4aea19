//! `stats [path]`: prints per-category row counts for an existing catalog.
//!
//! Grounded on `cli.py::stats` (group-by-category count query, no-database
//! error before touching anything else).

use std::path::PathBuf;

use anyhow::{Context, Result};
use rusqlite::Connection;

use crate::cli::GlobalOptions;

const DATA_FOLDER_NAME: &str = ".sortomatic";
const DB_NAME: &str = "sortomatic.db";

pub fn run_stats(path: Option<PathBuf>, _options: GlobalOptions) -> Result<()> {
    let base_path = match path {
        Some(p) => p,
        None => std::env::current_dir().context("resolving current directory")?,
    };
    let db_path = base_path.join(DATA_FOLDER_NAME).join(DB_NAME);

    if !db_path.exists() {
        anyhow::bail!("no database found at {}", db_path.display());
    }

    let conn = Connection::open(&db_path)
        .with_context(|| format!("opening {}", db_path.display()))?;

    let mut stmt = conn.prepare(
        "SELECT COALESCE(category, '(uncategorized)') AS category, COUNT(*) AS count
         FROM catalog_entries
         GROUP BY category
         ORDER BY count DESC",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
    })?;

    println!("{:<24} {:>10}", "Category", "Count");
    println!("{}", "-".repeat(35));
    for row in rows {
        let (category, count) = row?;
        println!("{category:<24} {count:>10}");
    }

    Ok(())
}
