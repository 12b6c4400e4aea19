//! Progress sink (§4.5/§6, ambient §12): an opaque callback invoked once per
//! completed unit, never per-batch, so it stays constant-time on the
//! executor thread.
//!
//! Grounded on `vrift-cas/src/parallel_ingest.rs::parallel_ingest_with_progress`'s
//! `Fn(...) + Send + Sync` callback shape; rendered with `indicatif`, the
//! pack's standard for bulk file operations (present but unused in the
//! teacher's own `Cargo.toml`, so treated as an available-but-vestigial
//! dependency this crate puts to actual use).

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use log::info;

/// One completed unit of work, delivered synchronously on the executor
/// thread. `total` is `None` for the filesystem passes (the walker doesn't
/// know its size up front) and `Some` for the DB passes, which pre-count via
/// `Catalog::count_uncategorized`/`count_unhashed`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProgressEvent {
    pub processed: u64,
    pub total: Option<u64>,
    pub bytes: u64,
}

/// Builds an indicatif bar for a known total, or a spinner for an unknown
/// one — a redrawing progress bar only makes sense in an interactive
/// terminal, so [`log_sink`] is the fallback for `--verbose`/non-tty runs.
pub fn cli_progress_bar(total: Option<u64>, message: impl Into<String>) -> ProgressBar {
    let bar = match total {
        Some(n) => {
            let bar = ProgressBar::new(n);
            bar.set_style(
                ProgressStyle::with_template(
                    "{msg} [{bar:40.cyan/blue}] {pos}/{len} ({elapsed})",
                )
                .unwrap()
                .progress_chars("=>-"),
            );
            bar
        }
        None => {
            let bar = ProgressBar::new_spinner();
            bar.set_style(
                ProgressStyle::with_template("{msg} {spinner} {pos} done ({elapsed})").unwrap(),
            );
            bar.enable_steady_tick(Duration::from_millis(120));
            bar
        }
    };
    bar.set_message(message.into());
    bar
}

/// A callback that drives an indicatif bar from executor-thread progress
/// events. Cheap: `ProgressBar::set_position` is an atomic store.
pub fn bar_sink(bar: ProgressBar) -> impl Fn(&ProgressEvent) + Send + Sync {
    move |event: &ProgressEvent| {
        bar.set_position(event.processed);
    }
}

/// Non-interactive fallback: an `info!` line every `every` completions
/// instead of a redrawing bar, since a bar is unreadable once interleaved
/// with log output.
pub fn log_sink(every: u64) -> impl Fn(&ProgressEvent) + Send + Sync {
    let every = every.max(1);
    let seen = AtomicU64::new(0);
    move |event: &ProgressEvent| {
        let n = seen.fetch_add(1, Ordering::Relaxed) + 1;
        if n % every == 0 {
            match event.total {
                Some(total) => info!("{}/{total} processed", event.processed),
                None => info!("{} processed", event.processed),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn log_sink_fires_only_every_nth_event() {
        let calls = AtomicUsize::new(0);
        // Wrap so the test can observe emission count without parsing log output:
        // re-derive the same modulo logic the sink uses internally.
        let every = 5u64;
        for processed in 1..=20u64 {
            if processed % every == 0 {
                calls.fetch_add(1, Ordering::Relaxed);
            }
        }
        assert_eq!(calls.load(Ordering::Relaxed), 4);

        // Smoke-test the real sink doesn't panic across a run of events.
        let sink = log_sink(every);
        for processed in 1..=20u64 {
            sink(&ProgressEvent { processed, total: Some(20), bytes: 0 });
        }
    }
}
