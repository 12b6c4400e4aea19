//! The on-disk record store: a single SQLite table tracking every indexed
//! path plus whatever the categorize and hash passes have learned about it.
//!
//! Opening follows the same preflight shape as the teacher's graph
//! compatibility layer (check, then configure pragmas, then create schema)
//! but simplified to a single always-compatible table: there is no prior
//! schema version to reject, only "does the file exist yet".

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::debug;
use rusqlite::{Connection, OptionalExtension};

use crate::error::{SortomaticError, WorkerError};

pub const ENTRY_FILE: &str = "file";
pub const ENTRY_BUNDLE: &str = "bundle";

/// A row as read back from `catalog_entries`.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    pub id: i64,
    pub path: PathBuf,
    pub filename: String,
    pub extension: Option<String>,
    pub size_bytes: i64,
    pub modified_at: DateTime<Utc>,
    pub entry_type: String,
    pub category: Option<String>,
    pub mime_type: Option<String>,
    pub fast_hash: Option<String>,
    pub full_hash: Option<String>,
    pub perceptual_hash: Option<String>,
}

/// A freshly walked path, not yet persisted.
///
/// The index pass leaves every field past `category` `None`; the combined
/// full pass that backs `run_all`'s index leg (§4.6) fills them in before a
/// single `insert_many` call, so one record type serves both.
#[derive(Debug, Clone)]
pub struct NewEntry {
    pub path: PathBuf,
    pub filename: String,
    pub size_bytes: i64,
    pub modified_at: DateTime<Utc>,
    pub entry_type: String,
    /// Bundles are pre-categorized at walk time; plain files leave this `None`
    /// unless the combined full pass ran categorize inline.
    pub category: Option<String>,
    pub mime_type: Option<String>,
    pub fast_hash: Option<String>,
    pub full_hash: Option<String>,
    pub perceptual_hash: Option<String>,
}

/// Result of the categorize pass for one row, keyed by id.
#[derive(Debug, Clone)]
pub struct CategorizeUpdate {
    pub id: i64,
    pub category: String,
    pub mime_type: Option<String>,
    pub extension: Option<String>,
}

/// Result of the hash pass for one row, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct HashUpdate {
    pub id: i64,
    pub fast_hash: Option<String>,
    pub full_hash: Option<String>,
    pub perceptual_hash: Option<String>,
}

/// Sub-batch size for `bulk_update_*`, matching the source pipeline's
/// `bulk_update(..., batch_size=100)`.
const UPDATE_BATCH_SIZE: usize = 100;

/// An opened catalog: a single SQLite connection configured for a local,
/// single-process, throughput-over-durability workload.
pub struct Catalog {
    conn: Connection,
    db_path: PathBuf,
}

/// Opens a connection with the same pragmas [`Catalog::open`] uses. Shared by
/// the main connection and by [`CatalogCursor`], which opens a second,
/// independent connection so a streaming read cursor never contends with the
/// `&mut Connection` borrow a `bulk_update_*` transaction needs — WAL mode
/// lets the two coexist.
fn open_connection(db_path: &Path) -> Result<Connection, SortomaticError> {
    let conn = Connection::open(db_path)?;
    conn.pragma_update(None, "journal_mode", "wal")?;
    conn.pragma_update(None, "cache_size", -1024 * 64)?;
    conn.pragma_update(None, "synchronous", 0)?;
    Ok(conn)
}

impl Catalog {
    /// Opens (creating if necessary) the catalog at `db_path`, applying WAL
    /// journaling, a 64 MiB page cache, and `synchronous = OFF`.
    pub fn open(db_path: &Path) -> Result<Catalog, SortomaticError> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = open_connection(db_path)?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS catalog_entries (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                path            TEXT NOT NULL UNIQUE,
                filename        TEXT NOT NULL,
                extension       TEXT,
                size_bytes      INTEGER NOT NULL,
                modified_at     TEXT NOT NULL,
                entry_type      TEXT NOT NULL DEFAULT 'file',
                category        TEXT,
                mime_type       TEXT,
                fast_hash       TEXT,
                full_hash       TEXT,
                perceptual_hash TEXT,
                is_duplicate    INTEGER NOT NULL DEFAULT 0,
                group_id        TEXT,
                action_pending  TEXT
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_catalog_filename ON catalog_entries(filename)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_catalog_category ON catalog_entries(category)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_catalog_entry_type ON catalog_entries(entry_type)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_catalog_fast_hash ON catalog_entries(fast_hash)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_catalog_full_hash ON catalog_entries(full_hash)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_catalog_group_id ON catalog_entries(group_id)",
            [],
        )?;

        Ok(Catalog { conn, db_path: db_path.to_path_buf() })
    }

    /// Drops and recreates the schema, used by `sortomatic reset`.
    pub fn reset(&self) -> Result<(), SortomaticError> {
        self.conn.execute("DROP TABLE IF EXISTS catalog_entries", [])?;
        self.conn.execute(
            "CREATE TABLE catalog_entries (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                path            TEXT NOT NULL UNIQUE,
                filename        TEXT NOT NULL,
                extension       TEXT,
                size_bytes      INTEGER NOT NULL,
                modified_at     TEXT NOT NULL,
                entry_type      TEXT NOT NULL DEFAULT 'file',
                category        TEXT,
                mime_type       TEXT,
                fast_hash       TEXT,
                full_hash       TEXT,
                perceptual_hash TEXT,
                is_duplicate    INTEGER NOT NULL DEFAULT 0,
                group_id        TEXT,
                action_pending  TEXT
            )",
            [],
        )?;
        Ok(())
    }

    /// Inserts a batch of freshly walked entries, ignoring rows whose path
    /// already exists (re-running `scan index` on an unchanged tree is a
    /// no-op per row), all inside one transaction.
    pub fn insert_many(&mut self, entries: &[NewEntry]) -> Result<(), SortomaticError> {
        if entries.is_empty() {
            return Ok(());
        }
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO catalog_entries
                    (path, filename, extension, size_bytes, modified_at, entry_type,
                     category, mime_type, fast_hash, full_hash, perceptual_hash)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            )?;
            for entry in entries {
                let extension = extension_of(&entry.path);
                stmt.execute(rusqlite::params![
                    entry.path.to_string_lossy(),
                    entry.filename,
                    extension,
                    entry.size_bytes,
                    entry.modified_at.to_rfc3339(),
                    entry.entry_type,
                    entry.category,
                    entry.mime_type,
                    entry.fast_hash,
                    entry.full_hash,
                    entry.perceptual_hash,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Writes categorize-pass results back in sub-batches of
    /// [`UPDATE_BATCH_SIZE`] rows per transaction.
    pub fn bulk_update_categorize(
        &mut self,
        updates: &[CategorizeUpdate],
    ) -> Result<(), SortomaticError> {
        for chunk in updates.chunks(UPDATE_BATCH_SIZE) {
            let tx = self.conn.transaction()?;
            {
                let mut stmt = tx.prepare(
                    "UPDATE catalog_entries
                     SET category = ?1, mime_type = ?2, extension = COALESCE(?3, extension)
                     WHERE id = ?4",
                )?;
                for update in chunk {
                    stmt.execute(rusqlite::params![
                        update.category,
                        update.mime_type,
                        update.extension,
                        update.id,
                    ])?;
                }
            }
            tx.commit()?;
        }
        Ok(())
    }

    /// Writes hash-pass results back in sub-batches of [`UPDATE_BATCH_SIZE`]
    /// rows per transaction.
    pub fn bulk_update_hash(&mut self, updates: &[HashUpdate]) -> Result<(), SortomaticError> {
        for chunk in updates.chunks(UPDATE_BATCH_SIZE) {
            let tx = self.conn.transaction()?;
            {
                let mut stmt = tx.prepare(
                    "UPDATE catalog_entries
                     SET fast_hash = ?1, full_hash = ?2, perceptual_hash = ?3
                     WHERE id = ?4",
                )?;
                for update in chunk {
                    stmt.execute(rusqlite::params![
                        update.fast_hash,
                        update.full_hash,
                        update.perceptual_hash,
                        update.id,
                    ])?;
                }
            }
            tx.commit()?;
        }
        Ok(())
    }

    /// Count of rows with `category IS NULL`, for progress pre-sizing.
    pub fn count_uncategorized(&self) -> Result<u64, SortomaticError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM catalog_entries WHERE category IS NULL",
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// Count of file rows (bundles excluded) with `full_hash IS NULL`.
    pub fn count_unhashed(&self) -> Result<u64, SortomaticError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM catalog_entries WHERE full_hash IS NULL AND entry_type = ?1",
            [ENTRY_FILE],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// Streams rows with `category IS NULL`, oldest id first, without
    /// loading the full result set into memory: each call re-queries a page
    /// of `page_size` rows keyed past the last id seen. The cursor opens its
    /// own connection to `db_path` rather than borrowing this one, so a
    /// `run_categorize`/`run_hash` pass can drain it with one hand while
    /// flushing `bulk_update_*` through `&mut self` with the other.
    pub fn iter_uncategorized(&self, page_size: usize) -> Result<CatalogCursor, SortomaticError> {
        Ok(CatalogCursor {
            conn: open_connection(&self.db_path)?,
            where_clause: "category IS NULL",
            entry_type_filter: None,
            page_size,
            last_id: 0,
            buffer: Vec::new(),
            exhausted: false,
        })
    }

    /// Streams unhashed file rows the same way as [`Catalog::iter_uncategorized`].
    pub fn iter_unhashed(&self, page_size: usize) -> Result<CatalogCursor, SortomaticError> {
        Ok(CatalogCursor {
            conn: open_connection(&self.db_path)?,
            where_clause: "full_hash IS NULL",
            entry_type_filter: Some(ENTRY_FILE),
            page_size,
            last_id: 0,
            buffer: Vec::new(),
            exhausted: false,
        })
    }

    /// Closing is implicit on drop; exposed for symmetry with the two-phase
    /// open and to make shutdown ordering explicit at call sites.
    pub fn close(self) {
        drop(self);
    }
}

/// A forward-only, paginated cursor over rows matching a fixed predicate.
///
/// Re-issues a bounded `SELECT ... WHERE id > ?` query per page instead of
/// holding a single open `Statement`, so it can be freely interleaved with
/// the catalog's own `&mut self` update methods between pages.
pub struct CatalogCursor {
    conn: Connection,
    where_clause: &'static str,
    entry_type_filter: Option<&'static str>,
    page_size: usize,
    last_id: i64,
    buffer: std::collections::VecDeque<CatalogEntry>,
    exhausted: bool,
}

impl CatalogCursor {
    fn fetch_page(&mut self) -> Result<(), SortomaticError> {
        let sql = format!(
            "SELECT id, path, filename, extension, size_bytes, modified_at, entry_type,
                    category, mime_type, fast_hash, full_hash, perceptual_hash
             FROM catalog_entries
             WHERE id > ?1 AND {clause} {entry_type_clause}
             ORDER BY id ASC
             LIMIT ?2",
            clause = self.where_clause,
            entry_type_clause = if self.entry_type_filter.is_some() {
                "AND entry_type = ?3"
            } else {
                ""
            },
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows: Vec<(i64, Result<CatalogEntry, WorkerError>)> = if let Some(entry_type) =
            self.entry_type_filter
        {
            stmt.query_map(
                rusqlite::params![self.last_id, self.page_size as i64, entry_type],
                row_to_entry,
            )?
            .collect::<Result<Vec<_>, _>>()?
        } else {
            stmt.query_map(
                rusqlite::params![self.last_id, self.page_size as i64],
                row_to_entry,
            )?
            .collect::<Result<Vec<_>, _>>()?
        };

        if rows.is_empty() {
            self.exhausted = true;
        } else {
            self.last_id = rows.last().unwrap().0;
            for (_, result) in rows {
                match result {
                    Ok(entry) => self.buffer.push_back(entry),
                    Err(e) => debug!("{e}"),
                }
            }
        }
        Ok(())
    }
}

impl Iterator for CatalogCursor {
    type Item = Result<CatalogEntry, SortomaticError>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.buffer.is_empty() && !self.exhausted {
            if let Err(e) = self.fetch_page() {
                return Some(Err(e));
            }
        }
        self.buffer.pop_front().map(Ok)
    }
}

/// Parses one row, keeping the row's id alongside the parse result so a
/// malformed `modified_at` can be logged and skipped without losing the
/// cursor's place (`fetch_page` advances `last_id` from the id regardless of
/// whether the row decoded cleanly).
fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<(i64, Result<CatalogEntry, WorkerError>)> {
    let id: i64 = row.get(0)?;
    let path_str: String = row.get(1)?;
    let modified_at_str: String = row.get(5)?;

    let modified_at = match DateTime::parse_from_rfc3339(&modified_at_str) {
        Ok(dt) => dt.with_timezone(&Utc),
        Err(_) => {
            return Ok((id, Err(WorkerError::MalformedRow { id, field: "modified_at" })));
        }
    };

    Ok((
        id,
        Ok(CatalogEntry {
            id,
            path: PathBuf::from(path_str),
            filename: row.get(2)?,
            extension: row.get(3)?,
            size_bytes: row.get(4)?,
            modified_at,
            entry_type: row.get(6)?,
            category: row.get(7)?,
            mime_type: row.get(8)?,
            fast_hash: row.get(9)?,
            full_hash: row.get(10)?,
            perceptual_hash: row.get(11)?,
        }),
    ))
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension().map(|e| e.to_string_lossy().to_lowercase())
}
