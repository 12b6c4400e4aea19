//! `PipelineManager`: the thin composer over Walker, Categorizer, Hasher,
//! `PassExecutor` and `Catalog` (§4.6).
//!
//! Grounded on `core/pipeline/manager.py::PipelineManager` — the four
//! `_*_pass` worker functions there (`_index_pass`, `_categorize_pass`,
//! `_hash_pass`, `_full_pass`) become the four free functions below, kept
//! outside the struct so each is a plain `Fn(...) -> Option<_>` the executor
//! can clone onto its thread pool without borrowing `self`.

use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, info};

use crate::catalog::{
    Catalog, CategorizeUpdate, HashUpdate, NewEntry, ENTRY_BUNDLE,
};
use crate::categorizer;
use crate::config::{Settings, CAT_BUNDLE, CAT_OTHER};
use crate::error::{SortomaticError, WorkerError};
use crate::executor::{FsPassStats, PassExecutor};
use crate::hasher;
use crate::progress::ProgressEvent;
use crate::walker::{self, WalkEntry};

/// Composes the three passes behind `run_index`/`run_categorize`/`run_hash`/
/// `run_all`. Owns the `PassExecutor` (and therefore its thread pool) for
/// the lifetime of one CLI invocation; `settings` is `Arc`-shared so worker
/// closures spawned onto the pool can each hold their own clone of the
/// handle without borrowing `self`.
pub struct PipelineManager {
    settings: Arc<Settings>,
    executor: PassExecutor,
}

impl PipelineManager {
    pub fn new(settings: Arc<Settings>) -> Result<PipelineManager, SortomaticError> {
        let executor = PassExecutor::new(&settings)?;
        Ok(PipelineManager { settings, executor })
    }

    /// Index pass: walk `root`, stat each entry, insert bare records with
    /// every analytical field left null (or `category = Project/Bundle` for
    /// bundles).
    pub fn run_index(
        &self,
        root: &Path,
        catalog: &mut Catalog,
        progress: &(dyn Fn(&ProgressEvent) + Send + Sync),
        cancel: &AtomicBool,
    ) -> Result<FsPassStats, SortomaticError> {
        if !root.exists() {
            return Err(SortomaticError::RootNotFound(root.to_path_buf()));
        }
        let producer = walker::walk(root, &self.settings);
        let settings = Arc::clone(&self.settings);
        let worker = move |entry: WalkEntry| index_pass(&entry, &settings);
        self.executor
            .run_fs(producer, worker, |batch| catalog.insert_many(batch), progress, cancel)
    }

    /// Combined index+categorize+hash pass backing `run_all`'s index leg
    /// (§4.6, DESIGN.md Open Question 2): one `insert_many` per row instead
    /// of three separate rewrites.
    pub fn run_all(
        &self,
        root: &Path,
        catalog: &mut Catalog,
        progress: &(dyn Fn(&ProgressEvent) + Send + Sync),
        cancel: &AtomicBool,
    ) -> Result<FsPassStats, SortomaticError> {
        if !root.exists() {
            return Err(SortomaticError::RootNotFound(root.to_path_buf()));
        }
        let producer = walker::walk(root, &self.settings);
        let settings = Arc::clone(&self.settings);
        let worker = move |entry: WalkEntry| full_pass(&entry, &settings);
        self.executor
            .run_fs(producer, worker, |batch| catalog.insert_many(batch), progress, cancel)
    }

    /// Categorize pass: stream every row with `category IS NULL` and fill it
    /// in. Returns immediately with `0` if nothing is eligible (S4).
    pub fn run_categorize(
        &self,
        catalog: &mut Catalog,
        progress: &(dyn Fn(&ProgressEvent) + Send + Sync),
        cancel: &AtomicBool,
    ) -> Result<u64, SortomaticError> {
        let total = catalog.count_uncategorized()?;
        if total == 0 {
            return Ok(0);
        }
        let cursor = catalog.iter_uncategorized(self.settings.batch_size)?;
        let settings = Arc::clone(&self.settings);
        let worker = move |row| categorize_pass(row, &settings);
        self.executor.run_db(
            cursor,
            worker,
            |batch: &[CategorizeUpdate]| catalog.bulk_update_categorize(batch),
            progress,
            Some(total),
            cancel,
        )
    }

    /// Hash pass: stream every file row with `full_hash IS NULL` (bundles
    /// are excluded at the query level per invariant 3) and fill in the
    /// three hash fields.
    pub fn run_hash(
        &self,
        catalog: &mut Catalog,
        progress: &(dyn Fn(&ProgressEvent) + Send + Sync),
        cancel: &AtomicBool,
    ) -> Result<u64, SortomaticError> {
        let total = catalog.count_unhashed()?;
        if total == 0 {
            return Ok(0);
        }
        let cursor = catalog.iter_unhashed(self.settings.batch_size)?;
        let settings = Arc::clone(&self.settings);
        let worker = move |row| hash_pass(row, &settings);
        self.executor.run_db(
            cursor,
            worker,
            |batch: &[HashUpdate]| catalog.bulk_update_hash(batch),
            progress,
            Some(total),
            cancel,
        )
    }

    /// Logs how much of the catalog is already categorized/hashed before a
    /// non-`--reset` `run_all`/`run_index`, so a resumed run's progress
    /// reads against the whole catalog rather than just the newly walked
    /// subset (§4.6 "Resumability").
    pub fn log_resume_summary(&self, catalog: &Catalog) -> Result<(), SortomaticError> {
        let uncategorized = catalog.count_uncategorized()?;
        let unhashed = catalog.count_unhashed()?;
        if uncategorized > 0 || unhashed > 0 {
            info!(
                "resuming scan ({uncategorized} uncategorized, {unhashed} unhashed rows already indexed)"
            );
        }
        Ok(())
    }
}

/// The worker-containment boundary (§4.5, §7 "Transient per-file"): builds a
/// `Result<NewEntry, WorkerError>` and immediately collapses any `Err` into a
/// debug log plus `None`, so nothing past this function ever sees a stat
/// failure as anything other than "this row didn't make it this run".
fn index_pass(entry: &WalkEntry, settings: &Settings) -> Option<NewEntry> {
    match index_pass_result(entry, settings) {
        Ok(record) => Some(record),
        Err(e) => {
            debug!("{e}");
            None
        }
    }
}

fn index_pass_result(entry: &WalkEntry, settings: &Settings) -> Result<NewEntry, WorkerError> {
    let _ = settings;
    let metadata =
        std::fs::symlink_metadata(&entry.path).map_err(|source| WorkerError::Stat {
            path: entry.path.clone(),
            source,
        })?;
    let filename = entry
        .path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let modified_at: DateTime<Utc> = metadata
        .modified()
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| Utc::now());
    let category = (entry.entry_type == ENTRY_BUNDLE).then(|| CAT_BUNDLE.to_string());

    Ok(NewEntry {
        path: entry.path.clone(),
        filename,
        size_bytes: metadata.len() as i64,
        modified_at,
        entry_type: entry.entry_type.to_string(),
        category,
        mime_type: None,
        fast_hash: None,
        full_hash: None,
        perceptual_hash: None,
    })
}

fn full_pass(entry: &WalkEntry, settings: &Settings) -> Option<NewEntry> {
    let mut record = index_pass(entry, settings)?;
    if record.entry_type == ENTRY_BUNDLE {
        return Some(record);
    }

    if let Some(detected) = categorizer::detect_type(&record.path, settings) {
        record.mime_type = Some(detected.mime_type);
        record.category = Some(detected.category);
    }

    let category = record.category.clone().unwrap_or_else(|| CAT_OTHER.to_string());
    if let Some(hashed) = hasher::compute_hashes(&record.path, record.size_bytes, &category, settings) {
        record.fast_hash = hashed.fast_hash;
        record.full_hash = hashed.full_hash;
        record.perceptual_hash = hashed.perceptual_hash;
    }

    Some(record)
}

fn categorize_pass(row: crate::catalog::CatalogEntry, settings: &Settings) -> Option<CategorizeUpdate> {
    let detected = categorizer::detect_type(&row.path, settings)?;
    Some(CategorizeUpdate {
        id: row.id,
        category: detected.category,
        mime_type: Some(detected.mime_type),
        extension: detected.extension,
    })
}

fn hash_pass(row: crate::catalog::CatalogEntry, settings: &Settings) -> Option<HashUpdate> {
    let category = row.category.clone().unwrap_or_default();
    let hashed = hasher::compute_hashes(&row.path, row.size_bytes, &category, settings)?;
    Some(HashUpdate {
        id: row.id,
        fast_hash: hashed.fast_hash,
        full_hash: hashed.full_hash,
        perceptual_hash: hashed.perceptual_hash,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CAT_DOCUMENT, CAT_IMAGE};
    use std::sync::atomic::AtomicBool;

    fn no_cancel() -> AtomicBool {
        AtomicBool::new(false)
    }

    #[test]
    fn run_index_creates_one_row_per_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"hi").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/b.jpg"), b"not a jpeg").unwrap();

        let db_path = dir.path().join("cat.db");
        let mut catalog = Catalog::open(&db_path).unwrap();
        let settings = Arc::new(Settings::default());
        let manager = PipelineManager::new(Arc::clone(&settings)).unwrap();
        let cancel = no_cancel();

        let stats = manager
            .run_index(dir.path(), &mut catalog, &|_| {}, &cancel)
            .unwrap();
        assert_eq!(stats.count, 2);
        assert_eq!(catalog.count_uncategorized().unwrap(), 2);
    }

    #[test]
    fn run_index_is_idempotent_on_rerun() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"hi").unwrap();

        let db_path = dir.path().join("cat.db");
        let mut catalog = Catalog::open(&db_path).unwrap();
        let settings = Arc::new(Settings::default());
        let manager = PipelineManager::new(Arc::clone(&settings)).unwrap();
        let cancel = no_cancel();

        manager.run_index(dir.path(), &mut catalog, &|_| {}, &cancel).unwrap();
        manager.run_index(dir.path(), &mut catalog, &|_| {}, &cancel).unwrap();

        assert_eq!(catalog.count_uncategorized().unwrap(), 1);
    }

    #[test]
    fn run_index_on_missing_root_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("cat.db");
        let mut catalog = Catalog::open(&db_path).unwrap();
        let settings = Arc::new(Settings::default());
        let manager = PipelineManager::new(settings).unwrap();
        let cancel = no_cancel();

        let result = manager.run_index(&dir.path().join("nope"), &mut catalog, &|_| {}, &cancel);
        assert!(matches!(result, Err(SortomaticError::RootNotFound(_))));
    }

    #[test]
    fn run_categorize_sets_category_then_is_a_noop() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"hi").unwrap();
        std::fs::write(dir.path().join("b.jpg"), b"not a jpeg").unwrap();

        let db_path = dir.path().join("cat.db");
        let mut catalog = Catalog::open(&db_path).unwrap();
        let settings = Arc::new(Settings::default());
        let manager = PipelineManager::new(Arc::clone(&settings)).unwrap();
        let cancel = no_cancel();

        manager.run_index(dir.path(), &mut catalog, &|_| {}, &cancel).unwrap();
        let n = manager.run_categorize(&mut catalog, &|_| {}, &cancel).unwrap();
        assert_eq!(n, 2);
        assert_eq!(catalog.count_uncategorized().unwrap(), 0);

        let n2 = manager.run_categorize(&mut catalog, &|_| {}, &cancel).unwrap();
        assert_eq!(n2, 0);
    }

    #[test]
    fn run_hash_populates_full_hash_for_files_only() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"hello world").unwrap();

        let db_path = dir.path().join("cat.db");
        let mut catalog = Catalog::open(&db_path).unwrap();
        let settings = Arc::new(Settings::default());
        let manager = PipelineManager::new(Arc::clone(&settings)).unwrap();
        let cancel = no_cancel();

        manager.run_index(dir.path(), &mut catalog, &|_| {}, &cancel).unwrap();
        manager.run_categorize(&mut catalog, &|_| {}, &cancel).unwrap();
        let n = manager.run_hash(&mut catalog, &|_| {}, &cancel).unwrap();
        assert_eq!(n, 1);
        assert_eq!(catalog.count_unhashed().unwrap(), 0);
    }

    #[test]
    fn run_all_categorizes_and_hashes_in_one_pass() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"hi").unwrap();
        std::fs::write(dir.path().join("b.jpg"), b"fake jpeg bytes here").unwrap();

        let db_path = dir.path().join("cat.db");
        let mut catalog = Catalog::open(&db_path).unwrap();
        let settings = Arc::new(Settings::default());
        let manager = PipelineManager::new(settings).unwrap();
        let cancel = no_cancel();

        let stats = manager.run_all(dir.path(), &mut catalog, &|_| {}, &cancel).unwrap();
        assert_eq!(stats.count, 2);
        assert_eq!(catalog.count_uncategorized().unwrap(), 0);
        assert_eq!(catalog.count_unhashed().unwrap(), 0);
    }

    #[test]
    fn bundle_directory_never_eligible_for_hash() {
        let dir = tempfile::tempdir().unwrap();
        let repo = dir.path().join("repo");
        std::fs::create_dir(&repo).unwrap();
        std::fs::create_dir(repo.join(".git")).unwrap();
        std::fs::write(repo.join("README.md"), b"hi").unwrap();

        let db_path = dir.path().join("cat.db");
        let mut catalog = Catalog::open(&db_path).unwrap();
        let settings = Arc::new(Settings::default());
        let manager = PipelineManager::new(settings).unwrap();
        let cancel = no_cancel();

        manager.run_all(dir.path(), &mut catalog, &|_| {}, &cancel).unwrap();
        assert_eq!(catalog.count_unhashed().unwrap(), 0);

        let rows: Vec<_> = catalog.iter_uncategorized(10).unwrap().collect::<Result<_, _>>().unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn full_pass_worker_functions_detect_both_categories() {
        let settings = Settings::default();
        let dir = tempfile::tempdir().unwrap();
        let txt = dir.path().join("a.txt");
        std::fs::write(&txt, b"hello").unwrap();
        let jpg = dir.path().join("b.jpg");
        std::fs::write(&jpg, b"whatever bytes").unwrap();

        let txt_entry = WalkEntry { path: txt, entry_type: crate::catalog::ENTRY_FILE };
        let jpg_entry = WalkEntry { path: jpg, entry_type: crate::catalog::ENTRY_FILE };

        let r1 = full_pass(&txt_entry, &settings).unwrap();
        assert_eq!(r1.category.as_deref(), Some(CAT_DOCUMENT));
        assert!(r1.full_hash.is_some());

        let r2 = full_pass(&jpg_entry, &settings).unwrap();
        assert_eq!(r2.category.as_deref(), Some(CAT_IMAGE));
        assert!(r2.full_hash.is_some());
    }
}
