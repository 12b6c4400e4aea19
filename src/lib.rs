//! sortomatic: a local file-cataloging pipeline.
//!
//! Walks a directory tree, categorizes each file by extension or magic-byte
//! signature, and hashes it (fast + full + perceptual), persisting results
//! into a resumable SQLite catalog. The CLI binary (`src/main.rs`) is a thin
//! caller of [`pipeline::PipelineManager`]; this crate can equally be
//! embedded by another tool that wants typed access to the pipeline.

pub mod catalog;
pub mod categorizer;
pub mod config;
pub mod error;
pub mod executor;
pub mod hasher;
pub mod pipeline;
pub mod progress;
pub mod walker;

pub use catalog::{Catalog, CatalogEntry, CategorizeUpdate, HashUpdate, NewEntry};
pub use config::Settings;
pub use error::{SortomaticError, WorkerError};
pub use executor::{FsPassStats, PassExecutor};
pub use hasher::HashResult;
pub use pipeline::PipelineManager;
pub use progress::ProgressEvent;
pub use walker::WalkEntry;
