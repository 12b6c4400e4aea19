//! `scan all`/`scan index`/`scan category`/`scan hash` command glue.
//!
//! Grounded on `cli.py::_run_pipeline` (base-path resolution, resume-summary
//! log, progress bar setup, `KeyboardInterrupt` → detach-and-`os._exit(130)`)
//! and `watch_cmd.rs` (the `Arc<AtomicBool>` + `signal_hook::iterator::Signals`
//! shutdown-flag idiom, reused here verbatim for SIGINT/SIGTERM).

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use log::{info, warn};

use sortomatic::catalog::Catalog;
use sortomatic::config::Settings;
use sortomatic::error::SortomaticError;
use sortomatic::pipeline::PipelineManager;
use sortomatic::progress::{bar_sink, cli_progress_bar, log_sink};

use crate::cli::{GlobalOptions, ScanMode};

const DATA_FOLDER_NAME: &str = ".sortomatic";
const DB_NAME: &str = "sortomatic.db";

fn db_path_for(base_path: &Path) -> Result<PathBuf> {
    let data_dir = base_path.join(DATA_FOLDER_NAME);
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("creating {}", data_dir.display()))?;
    Ok(data_dir.join(DB_NAME))
}

fn load_settings(options: &GlobalOptions) -> Result<Arc<Settings>> {
    let mut settings = match &options.config_dir {
        Some(dir) => Settings::load(dir)?,
        None => Settings::default(),
    };
    if let Some(threads) = options.threads {
        settings.max_workers = threads;
    }
    if let Some(cache_dir) = &options.cache_dir {
        settings.cache_dir = cache_dir.clone();
    }
    if options.reset {
        settings.reset_db = true;
    }
    Ok(Arc::new(settings))
}

fn install_shutdown_handler() -> Result<Arc<AtomicBool>> {
    let shutdown = Arc::new(AtomicBool::new(false));

    #[cfg(unix)]
    {
        use signal_hook::consts::signal;
        use signal_hook::iterator::Signals;

        let shutdown_clone = Arc::clone(&shutdown);
        let mut signals = Signals::new([signal::SIGTERM, signal::SIGINT])?;
        std::thread::spawn(move || {
            for _ in &mut signals {
                shutdown_clone.store(true, Ordering::SeqCst);
                break;
            }
        });
    }

    Ok(shutdown)
}

fn confirm_wipe(base_path: &Path) -> bool {
    eprint!(
        "This will drop the existing catalog at {}. Continue? [y/N] ",
        base_path.join(DATA_FOLDER_NAME).join(DB_NAME).display()
    );
    use std::io::Write;
    let _ = std::io::stderr().flush();
    let mut answer = String::new();
    if std::io::stdin().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

/// Runs the scan pipeline for `mode`, exiting the process directly with 130
/// on interrupt (bypassing `rayon::ThreadPool`'s blocking drop-join, exactly
/// as the source CLI's `os._exit(130)` bypasses Python's atexit stall).
pub fn run_scan(mode: ScanMode, path: Option<PathBuf>, options: GlobalOptions) -> Result<()> {
    let base_path = match &path {
        Some(p) => p.clone(),
        None => std::env::current_dir().context("resolving current directory")?,
    };

    if matches!(mode, ScanMode::Index | ScanMode::All) && !base_path.exists() {
        return Err(SortomaticError::RootNotFound(base_path).into());
    }

    let settings = load_settings(&options)?;
    let db_path = db_path_for(&base_path)?;
    let mut catalog = Catalog::open(&db_path)?;

    let explicit_reset = settings.reset_db && path.is_some();
    if explicit_reset {
        if !confirm_wipe(&base_path) {
            warn!("aborted: catalog reset was not confirmed");
            return Ok(());
        }
        catalog.reset()?;
        warn!("catalog reset");
    }

    let manager = PipelineManager::new(Arc::clone(&settings))?;
    if !explicit_reset && matches!(mode, ScanMode::All | ScanMode::Index) {
        manager.log_resume_summary(&catalog)?;
    }

    let shutdown = install_shutdown_handler()?;
    let interactive = atty_stdout();

    let start = std::time::Instant::now();
    // Boxed so every arm's `?` resolves against `Result<(), SortomaticError>`
    // rather than unwinding straight out of `run_scan`'s `anyhow::Result` and
    // skipping the interrupt handling below.
    let result: Result<(), SortomaticError> = (|| {
        match mode {
            ScanMode::All => {
                let root = path.expect("scan all requires a path, checked in cli.rs");
                let bar = indeterminate_sink(interactive, "indexing, categorizing, hashing");
                let stats = manager.run_all(&root, &mut catalog, bar.as_ref(), &shutdown)?;
                info!("scan complete: {} entries, {} bytes", stats.count, stats.bytes);
                Ok(())
            }
            ScanMode::Index => {
                let root = path.expect("scan index requires a path, checked in cli.rs");
                let bar = indeterminate_sink(interactive, "indexing");
                let stats = manager.run_index(&root, &mut catalog, bar.as_ref(), &shutdown)?;
                info!("scan complete: {} entries, {} bytes", stats.count, stats.bytes);
                Ok(())
            }
            ScanMode::Category => {
                let total = catalog.count_uncategorized()?;
                let bar = determinate_sink(interactive, total, "categorizing");
                let count = manager.run_categorize(&mut catalog, bar.as_ref(), &shutdown)?;
                info!("categorized {count} entries");
                Ok(())
            }
            ScanMode::Hash => {
                let total = catalog.count_unhashed()?;
                let bar = determinate_sink(interactive, total, "hashing");
                let count = manager.run_hash(&mut catalog, bar.as_ref(), &shutdown)?;
                info!("hashed {count} entries");
                Ok(())
            }
        }
    })();

    match result {
        Ok(()) => {
            info!("finished in {:.2}s", start.elapsed().as_secs_f64());
            catalog.close();
            Ok(())
        }
        Err(SortomaticError::Interrupted) => {
            warn!("scan interrupted");
            catalog.close();
            std::process::exit(130);
        }
        Err(e) => Err(e.into()),
    }
}

fn atty_stdout() -> bool {
    use std::io::IsTerminal;
    std::io::stdout().is_terminal()
}

fn indeterminate_sink(interactive: bool, message: &str) -> Box<dyn Fn(&sortomatic::progress::ProgressEvent) + Send + Sync> {
    if interactive {
        let bar = cli_progress_bar(None, message);
        Box::new(bar_sink(bar))
    } else {
        Box::new(log_sink(1000))
    }
}

fn determinate_sink(
    interactive: bool,
    total: u64,
    message: &str,
) -> Box<dyn Fn(&sortomatic::progress::ProgressEvent) + Send + Sync> {
    if total == 0 {
        return Box::new(|_event: &sortomatic::progress::ProgressEvent| {});
    }
    if interactive {
        let bar = cli_progress_bar(Some(total), message);
        Box::new(bar_sink(bar))
    } else {
        Box::new(log_sink(1000))
    }
}
