//! Pass 3: fast hash, perceptual hash, and full hash, computed on a detached
//! helper thread under a single deadline.
//!
//! Mirrors the source pipeline's warning/grace split: the caller waits 80%
//! of `hashing_timeout`, logs a warning and waits the remaining 20% if the
//! thread hasn't finished, then gives up and reports whatever the thread
//! has written so far. The thread is never killed; a slow hash on a huge
//! file simply finishes after its row has already moved on, and a later
//! rerun of `scan hash` will leave it alone if `full_hash` got set in time
//! or pick it back up if it didn't.

use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{debug, warn};
use xxhash_rust::xxh64::Xxh64;

use crate::config::{Settings, CAT_IMAGE, CAT_MUSIC};
use crate::error::WorkerError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HashResult {
    pub fast_hash: Option<String>,
    pub full_hash: Option<String>,
    pub perceptual_hash: Option<String>,
}

/// Computes hashes for `path`. Returns `None` if `path` is no longer a
/// regular file; the caller leaves the row unhashed for a future run.
pub fn compute_hashes(
    path: &Path,
    size_bytes: i64,
    category: &str,
    settings: &Settings,
) -> Option<HashResult> {
    if !path.is_file() {
        return None;
    }

    let shared = Arc::new(Mutex::new(HashResult::default()));
    let (tx, rx) = mpsc::channel();

    let worker_path = path.to_path_buf();
    let worker_category = category.to_string();
    let worker_settings = settings.clone();
    let worker_shared = Arc::clone(&shared);

    std::thread::spawn(move || {
        run_worker(&worker_path, size_bytes, &worker_category, &worker_settings, &worker_shared);
        let _ = tx.send(());
    });

    let warning_timeout = Duration::from_secs_f64((settings.hashing_timeout_secs * 0.8).max(0.0));
    let remaining = Duration::from_secs_f64((settings.hashing_timeout_secs * 0.2).max(0.0));

    if rx.recv_timeout(warning_timeout).is_err() {
        warn!(
            "hashing is slow for {} ({size_bytes} bytes), reached 80% of timeout",
            path.display()
        );
        if rx.recv_timeout(remaining).is_err() {
            warn!(
                "hashing timed out for {} (>{}s)",
                path.display(),
                settings.hashing_timeout_secs
            );
        }
    }

    let result = shared.lock().unwrap_or_else(|p| p.into_inner()).clone();
    Some(result)
}

fn run_worker(
    path: &PathBuf,
    size_bytes: i64,
    category: &str,
    settings: &Settings,
    shared: &Arc<Mutex<HashResult>>,
) {
    if size_bytes > 0 {
        match fast_hash(path, size_bytes, settings.fast_hash_size) {
            Ok(fast_hash) => shared.lock().unwrap_or_else(|p| p.into_inner()).fast_hash = Some(fast_hash),
            Err(e) => debug!("{e}"),
        }
    }

    if category == CAT_IMAGE {
        if let Some(phash) = perceptual_hash(path) {
            shared.lock().unwrap_or_else(|p| p.into_inner()).perceptual_hash = Some(phash);
        }
    }

    if category == CAT_MUSIC {
        // No acoustic-fingerprint library is pulled in anywhere in this
        // crate's lineage; `fast_hash` keeps the byte-range hash computed
        // above instead of being overwritten by a fingerprint.
    }

    match full_hash(path, settings.hashing_chunk_size) {
        Ok(full_hash) => shared.lock().unwrap_or_else(|p| p.into_inner()).full_hash = Some(full_hash),
        Err(e) => debug!("{e}"),
    }
}

fn fast_hash(path: &Path, size_bytes: i64, fast_hash_size: usize) -> Result<String, WorkerError> {
    let to_err = |source| WorkerError::Read { path: path.to_path_buf(), source };

    let mut file = std::fs::File::open(path).map_err(to_err)?;
    let mut hasher = Xxh64::new(0);

    let mut head = vec![0u8; fast_hash_size];
    let read_head = file.read(&mut head).map_err(to_err)?;
    hasher.update(&head[..read_head]);

    let size_bytes = size_bytes as u64;
    if size_bytes > fast_hash_size as u64 {
        let tail_len = (fast_hash_size as u64).min(size_bytes - fast_hash_size as u64);
        file.seek(SeekFrom::End(-(tail_len as i64))).map_err(to_err)?;
        let mut tail = vec![0u8; tail_len as usize];
        file.read_exact(&mut tail).map_err(to_err)?;
        hasher.update(&tail);
    }

    Ok(hex::encode(hasher.digest().to_be_bytes()))
}

fn full_hash(path: &Path, chunk_size: usize) -> Result<String, WorkerError> {
    let to_err = |source| WorkerError::Read { path: path.to_path_buf(), source };

    let mut file = std::fs::File::open(path).map_err(to_err)?;
    let mut hasher = Xxh64::new(0);
    let mut buf = vec![0u8; chunk_size.max(1)];
    loop {
        let n = file.read(&mut buf).map_err(to_err)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.digest().to_be_bytes()))
}

/// 8x8 average hash, matching `imagehash.average_hash`'s bit ordering:
/// row-major, most significant bit first, 1 where a pixel is at or above
/// the mean grayscale value.
fn perceptual_hash(path: &Path) -> Option<String> {
    let img = image::open(path).ok()?;
    let small = img
        .resize_exact(8, 8, image::imageops::FilterType::Lanczos3)
        .to_luma8();

    let pixels: Vec<u32> = small.pixels().map(|p| p.0[0] as u32).collect();
    let mean = pixels.iter().sum::<u32>() / pixels.len() as u32;

    let mut bits: u64 = 0;
    for (i, &p) in pixels.iter().enumerate() {
        if p >= mean {
            bits |= 1 << (63 - i);
        }
    }
    Some(format!("{bits:016x}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CAT_DOCUMENT;

    #[test]
    fn empty_file_hashes_without_panic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.txt");
        std::fs::write(&path, b"").unwrap();

        let settings = Settings::default();
        let result = compute_hashes(&path, 0, CAT_DOCUMENT, &settings).unwrap();
        assert!(result.fast_hash.is_none());
        assert!(result.full_hash.is_some());
    }

    #[test]
    fn identical_content_produces_identical_hashes() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.txt");
        std::fs::write(&a, b"the quick brown fox").unwrap();
        std::fs::write(&b, b"the quick brown fox").unwrap();

        let settings = Settings::default();
        let size = std::fs::metadata(&a).unwrap().len() as i64;
        let ra = compute_hashes(&a, size, CAT_DOCUMENT, &settings).unwrap();
        let rb = compute_hashes(&b, size, CAT_DOCUMENT, &settings).unwrap();
        assert_eq!(ra.fast_hash, rb.fast_hash);
        assert_eq!(ra.full_hash, rb.full_hash);
    }

    #[test]
    fn differing_content_produces_differing_full_hash() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.txt");
        std::fs::write(&a, b"the quick brown fox").unwrap();
        std::fs::write(&b, b"a completely different sentence").unwrap();

        let settings = Settings::default();
        let ra = compute_hashes(&a, 20, CAT_DOCUMENT, &settings).unwrap();
        let rb = compute_hashes(&b, 32, CAT_DOCUMENT, &settings).unwrap();
        assert_ne!(ra.full_hash, rb.full_hash);
    }

    #[test]
    fn missing_file_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone.txt");
        let settings = Settings::default();
        assert!(compute_hashes(&path, 0, CAT_DOCUMENT, &settings).is_none());
    }
}
