//! Embedded SQLite backend.
//!
//! One `learnings` table plus an FTS5 external-content index over
//! `(content, tags, category)` kept in sync by triggers. The index is
//! optional: if it cannot be created when the store is opened, the backend
//! runs in `LIKE`-fallback mode for the rest of its lifetime.

mod search;

use std::path::Path;

use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{Connection, OpenFlags, params};
use tracing::{debug, info, warn};

use crate::backend::{Backend, effective_limit};
use crate::error::{Result, StoreError};
use crate::types::{
    Category, CategoryStats, DEFAULT_LIST_LIMIT, DEFAULT_SEARCH_LIMIT, Learning,
    current_timestamp, format_timestamp, parse_timestamp,
};

/// Columns selected for every learning row, in `row_to_learning` order.
pub(crate) const LEARNING_COLUMNS: &str =
    "id, category, content, tags, confidence, use_count, created_at, updated_at";

// ─────────────────────────────────────────────────────────────────────────────
// Options
// ─────────────────────────────────────────────────────────────────────────────

/// Options for opening a [`SqliteBackend`].
#[derive(Debug, Clone, Copy)]
pub struct SqliteOptions {
    /// Try to create the FTS5 index and triggers. When false, or when the
    /// attempt fails, search uses the `LIKE` fallback only.
    pub full_text_search: bool,
}

impl Default for SqliteOptions {
    fn default() -> Self {
        Self {
            full_text_search: true,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Backend
// ─────────────────────────────────────────────────────────────────────────────

/// Learning store backed by a single SQLite file.
///
/// Writes rely on SQLite's own locking. The use counter is bumped with a
/// single `use_count = use_count + 1` statement, so concurrent increments are
/// never lost.
pub struct SqliteBackend {
    /// The connection; `None` once the backend has been closed.
    conn: Mutex<Option<Connection>>,
    /// Whether the FTS5 index was available when the store was opened.
    full_text: bool,
}

impl std::fmt::Debug for SqliteBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteBackend")
            .field("full_text", &self.full_text)
            .field("closed", &self.conn.lock().is_none())
            .finish()
    }
}

impl SqliteBackend {
    /// Open or create a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_options(path, SqliteOptions::default())
    }

    /// Open or create a store at the given path with explicit options.
    pub fn open_with_options(path: impl AsRef<Path>, options: SqliteOptions) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|_| {
                    StoreError::Database(rusqlite::Error::InvalidPath(path.to_path_buf()))
                })?;
            }
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_FULL_MUTEX,
        )?;

        let backend = Self::initialize(conn, options)?;
        info!(path = %path.display(), full_text = backend.full_text, "sqlite backend opened");
        Ok(backend)
    }

    /// Create an in-memory store (useful for testing).
    pub fn open_in_memory() -> Result<Self> {
        Self::open_in_memory_with_options(SqliteOptions::default())
    }

    /// Create an in-memory store with explicit options.
    pub fn open_in_memory_with_options(options: SqliteOptions) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let backend = Self::initialize(conn, options)?;
        info!(full_text = backend.full_text, "in-memory sqlite backend created");
        Ok(backend)
    }

    /// Whether searches go through the FTS5 index.
    pub fn has_full_text(&self) -> bool {
        self.full_text
    }

    fn initialize(conn: Connection, options: SqliteOptions) -> Result<Self> {
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;

        create_schema(&conn)?;

        let full_text = options.full_text_search
            && match create_full_text_index(&conn) {
                Ok(()) => true,
                Err(e) => {
                    warn!(error = %e, "FTS5 unavailable, using LIKE fallback");
                    false
                }
            };

        Ok(Self {
            conn: Mutex::new(Some(conn)),
            full_text,
        })
    }

    /// Run `f` against the open connection, or fail with `Closed`.
    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let guard = self.conn.lock();
        let conn = guard.as_ref().ok_or(StoreError::Closed)?;
        f(conn)
    }

    /// Get a learning by id.
    pub fn get(&self, id: &str) -> Result<Option<Learning>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {LEARNING_COLUMNS} FROM learnings WHERE id = ?1");
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query(params![id])?;
            match rows.next()? {
                Some(row) => Ok(Some(row_to_learning(row)?)),
                None => Ok(None),
            }
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Schema
// ─────────────────────────────────────────────────────────────────────────────

fn create_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS learnings (
            id         INTEGER PRIMARY KEY AUTOINCREMENT,
            category   TEXT NOT NULL DEFAULT 'general',
            content    TEXT NOT NULL,
            tags       TEXT NOT NULL DEFAULT '',
            confidence REAL NOT NULL DEFAULT 0.8,
            use_count  INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_learnings_updated_at
            ON learnings(updated_at);

        CREATE INDEX IF NOT EXISTS idx_learnings_category
            ON learnings(category);
        "#,
    )?;
    Ok(())
}

/// Best-effort creation of the FTS5 index and its sync triggers.
fn create_full_text_index(conn: &Connection) -> rusqlite::Result<()> {
    let existed: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE name = 'learnings_fts')",
        [],
        |row| row.get(0),
    )?;

    conn.execute_batch(
        r#"
        CREATE VIRTUAL TABLE IF NOT EXISTS learnings_fts USING fts5(
            content, tags, category,
            content='learnings', content_rowid='id'
        );

        CREATE TRIGGER IF NOT EXISTS learnings_ai AFTER INSERT ON learnings BEGIN
            INSERT INTO learnings_fts(rowid, content, tags, category)
            VALUES (new.id, new.content, new.tags, new.category);
        END;

        CREATE TRIGGER IF NOT EXISTS learnings_au AFTER UPDATE ON learnings BEGIN
            INSERT INTO learnings_fts(learnings_fts, rowid, content, tags, category)
            VALUES ('delete', old.id, old.content, old.tags, old.category);
            INSERT INTO learnings_fts(rowid, content, tags, category)
            VALUES (new.id, new.content, new.tags, new.category);
        END;

        CREATE TRIGGER IF NOT EXISTS learnings_ad AFTER DELETE ON learnings BEGIN
            INSERT INTO learnings_fts(learnings_fts, rowid, content, tags, category)
            VALUES ('delete', old.id, old.content, old.tags, old.category);
        END;
        "#,
    )?;

    // Rows written while the index did not exist are missing from it.
    if !existed {
        conn.execute(
            "INSERT INTO learnings_fts(learnings_fts) VALUES ('rebuild')",
            [],
        )?;
        debug!("FTS5 index created and rebuilt");
    }

    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Row mapping
// ─────────────────────────────────────────────────────────────────────────────

/// Convert a row selected with [`LEARNING_COLUMNS`] into a learning.
pub(crate) fn row_to_learning(row: &rusqlite::Row) -> Result<Learning> {
    let id: i64 = row.get(0)?;
    let category: String = row.get(1)?;
    let content: String = row.get(2)?;
    let tags: String = row.get(3)?;
    let confidence: f64 = row.get(4)?;
    let use_count: i64 = row.get(5)?;
    let created_at_str: String = row.get(6)?;
    let updated_at_str: String = row.get(7)?;

    let created_at = parse_timestamp(&created_at_str)
        .ok_or_else(|| StoreError::InvalidData(format!("bad created_at '{created_at_str}'")))?;
    let updated_at = parse_timestamp(&updated_at_str)
        .ok_or_else(|| StoreError::InvalidData(format!("bad updated_at '{updated_at_str}'")))?;

    Ok(Learning {
        id: id.to_string(),
        category: Category::parse_lenient(&category),
        content,
        tags,
        confidence,
        use_count: use_count.max(0) as u64,
        created_at,
        updated_at,
    })
}

pub(crate) fn collect_learnings(mut rows: rusqlite::Rows<'_>) -> Result<Vec<Learning>> {
    let mut learnings = Vec::new();
    while let Some(row) = rows.next()? {
        learnings.push(row_to_learning(row)?);
    }
    Ok(learnings)
}

// ─────────────────────────────────────────────────────────────────────────────
// Backend Trait Implementation
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl Backend for SqliteBackend {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn add(
        &self,
        category: Category,
        content: &str,
        tags: &str,
        confidence: f64,
    ) -> Result<Learning> {
        let now = current_timestamp();
        let stamp = format_timestamp(&now);

        let id = self.with_conn(|conn| {
            conn.execute(
                r#"
                INSERT INTO learnings (category, content, tags, confidence, use_count, created_at, updated_at)
                VALUES (?1, ?2, ?3, ?4, 0, ?5, ?5)
                "#,
                params![category.as_str(), content, tags, confidence, stamp],
            )?;
            Ok(conn.last_insert_rowid())
        })?;

        debug!(id, %category, "inserted learning");
        Ok(Learning::new(id.to_string(), category, content, tags, confidence, now))
    }

    async fn search(
        &self,
        query: &str,
        category: Option<Category>,
        limit: usize,
    ) -> Result<Vec<Learning>> {
        let limit = effective_limit(limit, DEFAULT_SEARCH_LIMIT);
        self.with_conn(|conn| {
            // An empty match expression is never valid FTS5 syntax.
            if self.full_text && !query.trim().is_empty() {
                match search::full_text(conn, query, category, limit) {
                    Ok(results) => return Ok(results),
                    Err(e) => debug!(error = %e, query, "full-text match failed, using LIKE"),
                }
            }
            search::like_fallback(conn, query, category, limit)
        })
    }

    async fn list(&self, category: Option<Category>, limit: usize) -> Result<Vec<Learning>> {
        let limit = effective_limit(limit, DEFAULT_LIST_LIMIT);
        self.with_conn(|conn| {
            let mut sql = format!("SELECT {LEARNING_COLUMNS} FROM learnings");
            let mut args: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
            if let Some(category) = category {
                sql.push_str(" WHERE category = ?");
                args.push(Box::new(category.as_str()));
            }
            sql.push_str(" ORDER BY updated_at DESC, id DESC LIMIT ?");
            args.push(Box::new(limit as i64));

            let mut stmt = conn.prepare(&sql)?;
            let refs: Vec<&dyn rusqlite::ToSql> = args.iter().map(|b| b.as_ref()).collect();
            let rows = stmt.query(refs.as_slice())?;
            collect_learnings(rows)
        })
    }

    async fn update(&self, id: &str, content: &str, tags: &str, confidence: f64) -> Result<()> {
        let stamp = format_timestamp(&current_timestamp());
        let rows_affected = self.with_conn(|conn| {
            Ok(conn.execute(
                r#"
                UPDATE learnings
                SET content = ?2, tags = ?3, confidence = ?4, updated_at = ?5
                WHERE id = ?1
                "#,
                params![id, content, tags, confidence, stamp],
            )?)
        })?;

        if rows_affected == 0 {
            debug!(id, "update matched no learning");
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let rows_affected = self.with_conn(|conn| {
            Ok(conn.execute("DELETE FROM learnings WHERE id = ?1", params![id])?)
        })?;

        if rows_affected == 0 {
            debug!(id, "delete matched no learning");
        }
        Ok(())
    }

    async fn increment_use_count(&self, id: &str) {
        let stamp = format_timestamp(&current_timestamp());
        let result = self.with_conn(|conn| {
            Ok(conn.execute(
                "UPDATE learnings SET use_count = use_count + 1, updated_at = ?2 WHERE id = ?1",
                params![id, stamp],
            )?)
        });
        if let Err(e) = result {
            warn!(id, error = %e, "failed to increment use count");
        }
    }

    async fn stats(&self) -> Result<CategoryStats> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT category, COUNT(*) FROM learnings GROUP BY category")?;
            let mut rows = stmt.query([])?;

            let mut stats = CategoryStats::new();
            while let Some(row) = rows.next()? {
                let category: String = row.get(0)?;
                let count: i64 = row.get(1)?;
                stats.insert(category, count as usize);
            }
            Ok(stats)
        })
    }

    async fn close(&self) -> Result<()> {
        let conn = self.conn.lock().take();
        if let Some(conn) = conn {
            conn.close().map_err(|(_, e)| StoreError::Database(e))?;
            info!("sqlite backend closed");
        }
        Ok(())
    }
}
