//! Pass 1: extension lookup, falling back to a deadline-bounded magic-byte
//! probe when the extension alone resolves to `Other`/`Unsorted`.
//!
//! The probe runs on a detached helper thread exactly like the source
//! pipeline's `threading.Thread(..., daemon=True)` plus a two-stage
//! `join(timeout=...)`: the caller waits 80% of `categorization_timeout`,
//! logs a warning if the thread is still running, then waits the remaining
//! 20% before giving up. The thread itself is never killed — if it finishes
//! after the deadline its result is simply discarded.
//!
//! Content sniffing itself is `infer::Infer::get_from_path`, the same
//! `Infer::new()` + `get_from_path` idiom used for MIME detection in
//! `examples/other_examples/a1c51064_pau1a-Arklowdun__src-tauri-src-files_indexer.rs.rs::detect_mime`.

use std::path::Path;
use std::sync::mpsc;
use std::time::Duration;

use log::{debug, warn};

use crate::config::{Settings, CAT_ARCHIVE, CAT_DOCUMENT, CAT_IMAGE, CAT_MUSIC, CAT_OTHER,
    CAT_UNSORTED, CAT_VIDEO, DEFAULT_MIME};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedType {
    pub category: String,
    pub mime_type: String,
    pub extension: Option<String>,
}

/// Detects category and MIME type for `path`. Returns `None` if `path` is no
/// longer a regular file (deleted between the index and categorize passes);
/// the caller leaves that row uncategorized for a future run.
pub fn detect_type(path: &Path, settings: &Settings) -> Option<DetectedType> {
    if !path.is_file() {
        return None;
    }

    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    let mut category = settings.category_for_extension(&ext);
    let mut mime = DEFAULT_MIME.to_string();

    if category == CAT_OTHER || category == CAT_UNSORTED {
        if let Some(sniffed) = sniff_with_deadline(path, settings.categorization_timeout_secs) {
            mime = sniffed.mime.to_string();
            category = sniffed.category.to_string();
        }
    }

    Some(DetectedType {
        category,
        mime_type: mime,
        extension: if ext.is_empty() { None } else { Some(ext) },
    })
}

struct Sniffed {
    mime: &'static str,
    category: &'static str,
}

fn sniff_with_deadline(path: &Path, timeout_secs: f64) -> Option<Sniffed> {
    let (tx, rx) = mpsc::channel();
    let path = path.to_path_buf();
    std::thread::spawn(move || {
        let result = sniff_magic_bytes(&path);
        let _ = tx.send(result);
    });

    let warning_timeout = Duration::from_secs_f64((timeout_secs * 0.8).max(0.0));
    let remaining = Duration::from_secs_f64((timeout_secs * 0.2).max(0.0));

    match rx.recv_timeout(warning_timeout) {
        Ok(result) => result,
        Err(mpsc::RecvTimeoutError::Timeout) => {
            warn!("categorization is slow for {}, reached 80% of timeout", path.display());
            match rx.recv_timeout(remaining) {
                Ok(result) => result,
                Err(_) => {
                    debug!("categorization probe for {} did not finish within deadline", path.display());
                    None
                }
            }
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => None,
    }
}

/// Sniffs `path`'s leading bytes against `infer`'s built-in signature table
/// and maps the resolved MIME type to a category (§4.3 step 4: `image/*` →
/// Image, `video/*` → Video, `audio/*` → Music, select document/archive
/// MIMEs → Document/Archive). Anything `infer` doesn't recognize, or whose
/// MIME falls outside that table, leaves the tentative extension-derived
/// category in place.
fn sniff_magic_bytes(path: &Path) -> Option<Sniffed> {
    let engine = infer::Infer::new();
    let kind = engine.get_from_path(path).ok().flatten()?;
    let mime = kind.mime_type();
    let category = category_for_mime(mime)?;
    Some(Sniffed { mime, category })
}

fn category_for_mime(mime: &str) -> Option<&'static str> {
    if mime.starts_with("image/") {
        return Some(CAT_IMAGE);
    }
    if mime.starts_with("video/") {
        return Some(CAT_VIDEO);
    }
    if mime.starts_with("audio/") {
        return Some(CAT_MUSIC);
    }
    match mime {
        "application/pdf"
        | "application/msword"
        | "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        | "application/vnd.ms-excel"
        | "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => Some(CAT_DOCUMENT),
        "application/zip"
        | "application/x-rar-compressed"
        | "application/x-7z-compressed"
        | "application/gzip"
        | "application/x-tar"
        | "application/vnd.rar" => Some(CAT_ARCHIVE),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_extension_skips_magic_byte_probe() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo.jpg");
        std::fs::write(&path, b"not actually a jpeg").unwrap();

        let result = detect_type(&path, &Settings::default()).unwrap();
        assert_eq!(result.category, CAT_IMAGE);
    }

    #[test]
    fn unknown_extension_falls_back_to_magic_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mystery.dat");
        std::fs::write(&path, b"\x89PNG\r\n\x1a\nrestofdata").unwrap();

        let result = detect_type(&path, &Settings::default()).unwrap();
        assert_eq!(result.category, CAT_IMAGE);
        assert_eq!(result.mime_type, "image/png");
    }

    #[test]
    fn unrecognized_content_stays_other() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mystery.xyz");
        std::fs::write(&path, b"plain text, nothing special").unwrap();

        let result = detect_type(&path, &Settings::default()).unwrap();
        assert_eq!(result.category, CAT_OTHER);
        assert_eq!(result.mime_type, DEFAULT_MIME);
    }

    #[test]
    fn missing_file_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone.jpg");
        assert!(detect_type(&path, &Settings::default()).is_none());
    }
}
