//! Error types for the cataloging pipeline.
//!
//! `SortomaticError` covers the fatal, pass-aborting failures: a missing
//! root, a catalog that cannot be opened, a malformed config file, a batch
//! commit that fails. These are surfaced to the CLI as a non-zero exit.
//!
//! `WorkerError` is the containment boundary for per-file failures (stat
//! failure, permission denied, I/O error mid-hash): a worker always turns
//! these into `Ok(None)` after logging, so they never reach `SortomaticError`.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum SortomaticError {
    #[error("root path does not exist: {0}")]
    RootNotFound(PathBuf),

    #[error("catalog error: {0}")]
    Catalog(#[from] rusqlite::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("operation interrupted")]
    Interrupted,
}

/// Per-file failure, always caught and logged inside a worker closure.
///
/// Never propagated past `PassExecutor::run_fs`/`run_db` — see
/// `executor.rs`.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("stat failed for {path}: {source}")]
    Stat {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("read failed for {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("row {id} missing expected field: {field}")]
    MalformedRow { id: i64, field: &'static str },
}
