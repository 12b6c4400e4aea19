//! The concurrency core: a bounded sliding-window dispatcher over a producer
//! iterator, backed by a dedicated rayon thread pool.
//!
//! Mirrors `core/pipeline/manager.py`'s `_run_fs_pipeline`/`_run_db_pipeline`
//! almost line for line: `fill_pool` tops up an in-flight set to
//! `batch_size`, the caller waits for *any* completion (there:
//! `concurrent.futures.wait(..., FIRST_COMPLETED)`; here: a blocking recv on
//! a `crossbeam_channel`), and a buffer is flushed every time it reaches
//! `ceil(batch_size / 10)` entries. Unlike a `rayon::Scope`, a bare
//! `ThreadPool::spawn` does not join outstanding tasks when this function
//! returns — on cancellation that is exactly what §4.5 asks for: the
//! in-flight set is simply abandoned rather than waited on.

use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_channel::{unbounded, Sender};
use rayon::ThreadPool;

use crate::catalog::{CatalogEntry, NewEntry};
use crate::config::Settings;
use crate::error::SortomaticError;
use crate::progress::ProgressEvent;
use crate::walker::WalkEntry;

/// Totals returned by [`PassExecutor::run_fs`], matching the source
/// pipeline's `{'count': total, 'bytes': total_bytes}` result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FsPassStats {
    pub count: u64,
    pub bytes: u64,
}

pub struct PassExecutor {
    pool: ThreadPool,
    window: usize,
}

impl PassExecutor {
    /// Builds a thread pool sized to `settings.max_workers` and a sliding
    /// window sized to `settings.batch_size`.
    pub fn new(settings: &Settings) -> Result<PassExecutor, SortomaticError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(settings.max_workers.max(1))
            .thread_name(|i| format!("sortomatic-worker-{i}"))
            .build()
            .map_err(|e| SortomaticError::Config(e.to_string()))?;
        Ok(PassExecutor {
            pool,
            window: settings.batch_size.max(1),
        })
    }

    fn flush_threshold(&self) -> usize {
        (((self.window as f64) / 10.0).ceil() as usize).max(1)
    }

    /// Drives `worker` over a filesystem walk (§4.5 points 1-5): pulls items
    /// from `producer` into an in-flight window of `batch_size`, waits for
    /// completions in arrival order, buffers non-null results and flushes
    /// them through `flush_fn` every `ceil(batch_size/10)` entries.
    ///
    /// Returns [`SortomaticError::Interrupted`] the moment `cancel` is
    /// observed set, without waiting for the in-flight window to drain.
    pub fn run_fs<I, W>(
        &self,
        mut producer: I,
        worker: W,
        mut flush_fn: impl FnMut(&[NewEntry]) -> Result<(), SortomaticError>,
        progress: &(dyn Fn(&ProgressEvent) + Send + Sync),
        cancel: &AtomicBool,
    ) -> Result<FsPassStats, SortomaticError>
    where
        I: Iterator<Item = WalkEntry>,
        W: Fn(WalkEntry) -> Option<NewEntry> + Send + Sync + Clone + 'static,
    {
        let flush_threshold = self.flush_threshold();
        let (tx, rx) = unbounded::<Option<NewEntry>>();
        let mut buffer: Vec<NewEntry> = Vec::new();
        let mut total = 0u64;
        let mut total_bytes = 0u64;
        let mut in_flight = 0usize;
        let mut exhausted = false;

        let mut fill = |in_flight: &mut usize, exhausted: &mut bool| {
            while *in_flight < self.window {
                match producer.next() {
                    Some(item) => {
                        *in_flight += 1;
                        let tx: Sender<Option<NewEntry>> = tx.clone();
                        let worker = worker.clone();
                        self.pool.spawn(move || {
                            let result = worker(item);
                            let _ = tx.send(result);
                        });
                    }
                    None => {
                        *exhausted = true;
                        break;
                    }
                }
            }
        };

        fill(&mut in_flight, &mut exhausted);

        while in_flight > 0 {
            if cancel.load(Ordering::SeqCst) {
                return Err(SortomaticError::Interrupted);
            }
            let result = rx.recv().map_err(|_| SortomaticError::Interrupted)?;
            in_flight -= 1;
            if let Some(entry) = result {
                total += 1;
                total_bytes += entry.size_bytes.max(0) as u64;
                buffer.push(entry);
                progress(&ProgressEvent {
                    processed: total,
                    total: None,
                    bytes: total_bytes,
                });
                if buffer.len() >= flush_threshold {
                    flush_fn(&buffer)?;
                    buffer.clear();
                }
            }
            if !exhausted {
                fill(&mut in_flight, &mut exhausted);
            }
        }

        if !buffer.is_empty() {
            flush_fn(&buffer)?;
        }

        Ok(FsPassStats {
            count: total,
            bytes: total_bytes,
        })
    }

    /// Drives `worker` over a streaming catalog cursor the same way
    /// [`PassExecutor::run_fs`] drives a filesystem walk, but against rows
    /// already in the catalog and without a byte total (categorize/hash
    /// passes report only a count, per §4.5's `run_db` contract).
    pub fn run_db<I, W, U>(
        &self,
        mut producer: I,
        worker: W,
        mut flush_fn: impl FnMut(&[U]) -> Result<(), SortomaticError>,
        progress: &(dyn Fn(&ProgressEvent) + Send + Sync),
        total_hint: Option<u64>,
        cancel: &AtomicBool,
    ) -> Result<u64, SortomaticError>
    where
        I: Iterator<Item = Result<CatalogEntry, SortomaticError>>,
        W: Fn(CatalogEntry) -> Option<U> + Send + Sync + Clone + 'static,
        U: Send + 'static,
    {
        let flush_threshold = self.flush_threshold();
        let (tx, rx) = unbounded::<Option<U>>();
        let mut buffer: Vec<U> = Vec::new();
        let mut total = 0u64;
        let mut in_flight = 0usize;
        let mut exhausted = false;
        let mut producer_err: Option<SortomaticError> = None;

        let mut fill = |in_flight: &mut usize, exhausted: &mut bool| {
            while *in_flight < self.window {
                match producer.next() {
                    Some(Ok(row)) => {
                        *in_flight += 1;
                        let tx: Sender<Option<U>> = tx.clone();
                        let worker = worker.clone();
                        self.pool.spawn(move || {
                            let result = worker(row);
                            let _ = tx.send(result);
                        });
                    }
                    Some(Err(e)) => {
                        producer_err = Some(e);
                        *exhausted = true;
                        break;
                    }
                    None => {
                        *exhausted = true;
                        break;
                    }
                }
            }
        };

        fill(&mut in_flight, &mut exhausted);

        while in_flight > 0 {
            if cancel.load(Ordering::SeqCst) {
                return Err(SortomaticError::Interrupted);
            }
            let result = rx.recv().map_err(|_| SortomaticError::Interrupted)?;
            in_flight -= 1;
            if let Some(update) = result {
                total += 1;
                buffer.push(update);
                progress(&ProgressEvent {
                    processed: total,
                    total: total_hint,
                    bytes: 0,
                });
                if buffer.len() >= flush_threshold {
                    flush_fn(&buffer)?;
                    buffer.clear();
                }
            }
            if !exhausted {
                fill(&mut in_flight, &mut exhausted);
            }
        }

        if !buffer.is_empty() {
            flush_fn(&buffer)?;
        }

        if let Some(e) = producer_err {
            return Err(e);
        }

        Ok(total)
    }
}
