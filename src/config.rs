//! Typed settings, loaded from two optional TOML files and merged over
//! built-in defaults (§4.7, §13 of the design).
//!
//! Precedence, lowest to highest: [`Settings::default`] → `settings.toml` →
//! `filetypes.toml` → CLI overrides, applied by the caller after
//! [`Settings::load`] returns. Hot-reload is the explicit `load` call; it is
//! never invoked while a pass is running (see `pipeline.rs`).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::SortomaticError;

pub const CAT_IMAGE: &str = "Image";
pub const CAT_VIDEO: &str = "Video";
pub const CAT_DOCUMENT: &str = "Document";
pub const CAT_MUSIC: &str = "Music";
pub const CAT_ARCHIVE: &str = "Archive";
pub const CAT_CODE: &str = "Code";
pub const CAT_3D: &str = "3D";
pub const CAT_SOFTWARE: &str = "Software";
pub const CAT_OTHER: &str = "Other";
pub const CAT_UNSORTED: &str = "Unsorted";
pub const CAT_BUNDLE: &str = "Project/Bundle";
pub const DEFAULT_MIME: &str = "application/octet-stream";

/// Typed, immutable-once-loaded settings for a single pipeline invocation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub max_workers: usize,
    pub batch_size: usize,
    pub hashing_chunk_size: usize,
    pub fast_hash_size: usize,
    pub categorization_timeout_secs: f64,
    pub hashing_timeout_secs: f64,
    pub categories: HashMap<String, Vec<String>>,
    pub ignore_patterns: Vec<String>,
    pub atomic_markers: Vec<String>,
    pub cache_dir: PathBuf,
    pub config_dir: PathBuf,
    pub reset_db: bool,
}

impl Default for Settings {
    fn default() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        let mut categories = HashMap::new();
        categories.insert(
            CAT_IMAGE.to_string(),
            strs(&["jpg", "jpeg", "png", "gif", "bmp", "tiff", "heic", "svg"]),
        );
        categories.insert(
            CAT_VIDEO.to_string(),
            strs(&["mp4", "mkv", "avi", "mov", "wmv", "flv", "webm"]),
        );
        categories.insert(
            CAT_DOCUMENT.to_string(),
            strs(&[
                "pdf", "doc", "docx", "txt", "md", "xls", "xlsx", "ppt", "pptx",
            ]),
        );
        categories.insert(
            CAT_MUSIC.to_string(),
            strs(&["mp3", "wav", "flac", "aac", "ogg", "m4a"]),
        );
        categories.insert(
            CAT_ARCHIVE.to_string(),
            strs(&["zip", "rar", "7z", "tar", "gz"]),
        );
        categories.insert(
            CAT_CODE.to_string(),
            strs(&[
                "py", "js", "html", "css", "json", "xml", "c", "cpp", "h", "java", "go", "rs",
                "sh", "bat", "ps1",
            ]),
        );
        categories.insert(
            CAT_3D.to_string(),
            strs(&["obj", "stl", "fbx", "blend", "dae", "3ds", "step", "stp"]),
        );
        categories.insert(
            CAT_SOFTWARE.to_string(),
            strs(&["exe", "msi", "app", "deb", "rpm", "dmg", "iso", "bin"]),
        );

        Settings {
            max_workers: default_max_workers(),
            batch_size: 1000,
            hashing_chunk_size: 1024 * 1024,
            fast_hash_size: 4 * 1024,
            categorization_timeout_secs: 1.0,
            hashing_timeout_secs: 60.0,
            categories,
            ignore_patterns: strs(&[
                ".git",
                "__pycache__",
                ".DS_Store",
                "node_modules",
                ".venv",
                ".sortomatic",
            ]),
            atomic_markers: strs(&[
                ".git",
                ".hg",
                "Makefile",
                "package.json",
                "requirements.txt",
                "venv",
            ]),
            cache_dir: home.join(".cache").join("sortomatic"),
            config_dir: home.join(".config").join("sortomatic"),
            reset_db: false,
        }
    }
}

fn strs(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn default_max_workers() -> usize {
    (num_cpus::get() / 2).max(1)
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    max_workers: Option<usize>,
    batch_size: Option<usize>,
    reset_db: Option<bool>,
    hashing_chunk_size: Option<usize>,
    fast_hash_size: Option<usize>,
    categorization_timeout: Option<f64>,
    hashing_timeout: Option<f64>,
    cache_dir: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct FiletypesFile {
    categories: Option<HashMap<String, Vec<String>>>,
    ignore: Option<Vec<String>>,
    atomic_markers: Option<Vec<String>>,
}

impl Settings {
    /// Loads `settings.toml` and `filetypes.toml` from `dir` over the
    /// built-in defaults. Missing files are not errors; a malformed file is.
    ///
    /// Never call this while a pass from `pipeline.rs` is running.
    pub fn load(dir: &Path) -> Result<Settings, SortomaticError> {
        let mut settings = Settings::default();
        settings.config_dir = dir.to_path_buf();

        let settings_path = dir.join("settings.toml");
        if settings_path.exists() {
            let text = std::fs::read_to_string(&settings_path)?;
            let patch: SettingsFile = toml::from_str(&text)
                .map_err(|e| SortomaticError::Config(format!("{}: {e}", settings_path.display())))?;
            if let Some(v) = patch.max_workers {
                settings.max_workers = v;
            }
            if let Some(v) = patch.batch_size {
                settings.batch_size = v;
            }
            if let Some(v) = patch.reset_db {
                settings.reset_db = v;
            }
            if let Some(v) = patch.hashing_chunk_size {
                settings.hashing_chunk_size = v;
            }
            if let Some(v) = patch.fast_hash_size {
                settings.fast_hash_size = v;
            }
            if let Some(v) = patch.categorization_timeout {
                settings.categorization_timeout_secs = v;
            }
            if let Some(v) = patch.hashing_timeout {
                settings.hashing_timeout_secs = v;
            }
            if let Some(v) = patch.cache_dir {
                settings.cache_dir = v;
            }
        }

        let filetypes_path = dir.join("filetypes.toml");
        if filetypes_path.exists() {
            let text = std::fs::read_to_string(&filetypes_path)?;
            let patch: FiletypesFile = toml::from_str(&text).map_err(|e| {
                SortomaticError::Config(format!("{}: {e}", filetypes_path.display()))
            })?;
            if let Some(v) = patch.categories {
                settings.categories = v;
            }
            if let Some(v) = patch.ignore {
                settings.ignore_patterns = v;
            }
            if let Some(v) = patch.atomic_markers {
                settings.atomic_markers = v;
            }
        }

        Ok(settings)
    }

    /// Extension (without leading dot, case-insensitive) to category,
    /// defaulting to [`CAT_OTHER`] when no configured category claims it.
    pub fn category_for_extension(&self, ext: &str) -> String {
        let ext = ext.to_lowercase();
        let ext = ext.strip_prefix('.').unwrap_or(&ext);
        for (category, extensions) in &self.categories {
            if extensions.iter().any(|e| e == ext) {
                return category.clone();
            }
        }
        CAT_OTHER.to_string()
    }
}
