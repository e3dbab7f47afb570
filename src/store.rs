use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use tracing::debug;

use crate::types::{DomainResult, ScanResults};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("{0}")]
    Other(String),
}

const SCHEMA_SQL: &str = r#"
PRAGMA foreign_keys = ON;

-- One row per completed scan
CREATE TABLE IF NOT EXISTS scan_history (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    domain         TEXT NOT NULL,
    timestamp      TEXT NOT NULL,
    active_count   INTEGER NOT NULL DEFAULT 0,
    inactive_count INTEGER NOT NULL DEFAULT 0,
    total_count    INTEGER NOT NULL DEFAULT 0
);

-- Per-subdomain results
CREATE TABLE IF NOT EXISTS scan_results (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    scan_id       INTEGER NOT NULL REFERENCES scan_history(id) ON DELETE CASCADE,
    subdomain     TEXT NOT NULL,
    is_active     INTEGER NOT NULL DEFAULT 0,
    response_info TEXT,
    timestamp     TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_results_scan ON scan_results(scan_id);
"#;

/// Summary row of a stored scan.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ScanSummary {
    pub id: i64,
    pub domain: String,
    pub timestamp: String,
    pub active_count: u64,
    pub inactive_count: u64,
    pub total_count: u64,
}

/// A stored scan with its results split by activity.
#[derive(Debug, Clone, Serialize)]
pub struct ScanDetail {
    pub scan: ScanSummary,
    pub active: Vec<DomainResult>,
    pub inactive: Vec<DomainResult>,
}

/// Scan history backed by SQLite.
pub struct ScanStore {
    conn: Connection,
}

impl std::fmt::Debug for ScanStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanStore").finish_non_exhaustive()
    }
}

impl ScanStore {
    /// Open (or create) the database at `path`.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Other(format!(
                    "failed to create db directory {}: {e}",
                    parent.display()
                ))
            })?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA_SQL)?;
        debug!(path = %path.display(), "scan database opened");
        Ok(Self { conn })
    }

    /// In-memory database for tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self { conn })
    }

    /// Persist a completed scan. Returns the new history id.
    pub fn save_scan(&self, results: &ScanResults) -> Result<i64, StoreError> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO scan_history (domain, timestamp, active_count, inactive_count, total_count) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                results.domain,
                results.finished_at,
                results.active_count() as i64,
                results.inactive_count() as i64,
                results.total_count() as i64,
            ],
        )?;
        let scan_id = tx.last_insert_rowid();

        for entry in &results.entries {
            tx.execute(
                "INSERT INTO scan_results (scan_id, subdomain, is_active, response_info, timestamp) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    scan_id,
                    entry.domain,
                    entry.is_active,
                    entry.response_info,
                    entry.timestamp,
                ],
            )?;
        }

        tx.commit()?;
        debug!(scan_id, domain = %results.domain, "scan saved to database");
        Ok(scan_id)
    }

    /// All stored scans, newest first.
    pub fn list_history(&self) -> Result<Vec<ScanSummary>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, domain, timestamp, active_count, inactive_count, total_count \
             FROM scan_history ORDER BY timestamp DESC, id DESC",
        )?;
        let rows = stmt.query_map([], summary_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn load_scan(&self, id: i64) -> Result<Option<ScanDetail>, StoreError> {
        let summary = self
            .conn
            .query_row(
                "SELECT id, domain, timestamp, active_count, inactive_count, total_count \
                 FROM scan_history WHERE id = ?1",
                params![id],
                summary_from_row,
            )
            .optional()?;
        let Some(scan) = summary else {
            return Ok(None);
        };

        let mut stmt = self.conn.prepare(
            "SELECT subdomain, is_active, response_info, timestamp \
             FROM scan_results WHERE scan_id = ?1 ORDER BY id",
        )?;
        let results = stmt
            .query_map(params![id], |row| {
                Ok(DomainResult {
                    domain: row.get(0)?,
                    is_active: row.get(1)?,
                    response_info: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                    timestamp: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        let (active, inactive) = results.into_iter().partition(|r| r.is_active);
        Ok(Some(ScanDetail {
            scan,
            active,
            inactive,
        }))
    }

    /// Delete a scan and its results. Returns `false` if no such scan.
    pub fn delete_scan(&self, id: i64) -> Result<bool, StoreError> {
        let n = self
            .conn
            .execute("DELETE FROM scan_history WHERE id = ?1", params![id])?;
        debug!(scan_id = id, deleted = n > 0, "scan history delete");
        Ok(n > 0)
    }
}

fn summary_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ScanSummary> {
    Ok(ScanSummary {
        id: row.get(0)?,
        domain: row.get(1)?,
        timestamp: row.get(2)?,
        active_count: row.get::<_, i64>(3)? as u64,
        inactive_count: row.get::<_, i64>(4)? as u64,
        total_count: row.get::<_, i64>(5)? as u64,
    })
}
