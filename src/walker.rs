//! Directory walk that collapses atomic project folders (a `.git` repo, a
//! `package.json` tree, ...) to a single bundle entry instead of descending
//! into them.
//!
//! Built on `walkdir`'s manual iterator form rather than `WalkDir::new(...)
//! .into_iter().filter_map(...)`, because collapsing a directory requires
//! calling [`walkdir::IntoIter::skip_current_dir`] on the live iterator the
//! moment a marker is seen — a closure-based filter can't express that.

use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use log::debug;
use walkdir::WalkDir;

use crate::catalog::{ENTRY_BUNDLE, ENTRY_FILE};
use crate::config::Settings;

/// One yielded path from [`walk`]: a plain file, or the root of a collapsed
/// atomic bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkEntry {
    pub path: PathBuf,
    pub entry_type: &'static str,
}

/// Walks `root`, yielding [`WalkEntry`] values depth-first.
///
/// A directory whose immediate children include any of `settings.atomic_markers`
/// is yielded once as a bundle and not descended into. Otherwise, entries
/// (both subdirectories and files) matching `settings.ignore_patterns` are
/// skipped, and every remaining file is yielded.
pub fn walk(root: &Path, settings: &Settings) -> impl Iterator<Item = WalkEntry> + '_ {
    let ignore_set = build_globset(&settings.ignore_patterns);
    let atomic_markers = settings.atomic_markers.clone();

    WalkIter {
        inner: WalkDir::new(root).follow_links(false).into_iter(),
        ignore_set,
        atomic_markers,
    }
}

fn build_globset(patterns: &[String]) -> GlobSet {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        if let Ok(glob) = Glob::new(pattern) {
            builder.add(glob);
        } else {
            debug!("ignoring malformed ignore pattern: {pattern}");
        }
    }
    builder.build().unwrap_or_else(|_| GlobSetBuilder::new().build().unwrap())
}

fn matches_basename(set: &GlobSet, path: &Path) -> bool {
    match path.file_name() {
        Some(name) => set.is_match(name),
        None => false,
    }
}

struct WalkIter {
    inner: walkdir::IntoIter,
    ignore_set: GlobSet,
    atomic_markers: Vec<String>,
}

impl WalkIter {
    fn is_atomic_dir(&self, dir_path: &Path) -> bool {
        let entries = match std::fs::read_dir(dir_path) {
            Ok(entries) => entries,
            Err(e) => {
                debug!("skipping unreadable directory {}: {e}", dir_path.display());
                return false;
            }
        };
        for entry in entries.flatten() {
            if let Some(name) = entry.file_name().to_str() {
                if self.atomic_markers.iter().any(|m| m == name) {
                    return true;
                }
            }
        }
        false
    }
}

impl Iterator for WalkIter {
    type Item = WalkEntry;

    fn next(&mut self) -> Option<WalkEntry> {
        loop {
            let entry = match self.inner.next()? {
                Ok(entry) => entry,
                Err(e) => {
                    debug!("walk error: {e}");
                    continue;
                }
            };
            let path = entry.path();

            if entry.file_type().is_dir() {
                if self.is_atomic_dir(path) {
                    self.inner.skip_current_dir();
                    return Some(WalkEntry {
                        path: path.to_path_buf(),
                        entry_type: ENTRY_BUNDLE,
                    });
                }
                if matches_basename(&self.ignore_set, path) {
                    self.inner.skip_current_dir();
                }
                continue;
            }

            if matches_basename(&self.ignore_set, path) {
                continue;
            }

            return Some(WalkEntry {
                path: path.to_path_buf(),
                entry_type: ENTRY_FILE,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn settings() -> Settings {
        Settings::default()
    }

    #[test]
    fn walk_yields_plain_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), b"hi").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub/b.txt"), b"hi").unwrap();

        let mut entries: Vec<_> = walk(dir.path(), &settings()).collect();
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e.entry_type == ENTRY_FILE));
    }

    #[test]
    fn walk_collapses_atomic_folder_to_single_bundle_entry() {
        let dir = tempfile::tempdir().unwrap();
        let repo = dir.path().join("myrepo");
        fs::create_dir(&repo).unwrap();
        fs::create_dir(repo.join(".git")).unwrap();
        fs::write(repo.join("README.md"), b"hi").unwrap();
        fs::create_dir(repo.join("src")).unwrap();
        fs::write(repo.join("src/main.rs"), b"fn main() {}").unwrap();

        let entries: Vec<_> = walk(dir.path(), &settings()).collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].entry_type, ENTRY_BUNDLE);
        assert_eq!(entries[0].path, repo);
    }

    #[test]
    fn walk_skips_ignored_files_and_directories() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("node_modules")).unwrap();
        fs::write(dir.path().join("node_modules/pkg.js"), b"x").unwrap();
        fs::write(dir.path().join(".DS_Store"), b"x").unwrap();
        fs::write(dir.path().join("keep.txt"), b"x").unwrap();

        let entries: Vec<_> = walk(dir.path(), &settings()).collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].path, dir.path().join("keep.txt"));
    }
}
