//! Durable store registry backed by SQLite.
//!
//! # Table design
//!
//! A single `stores` table keyed by store id:
//! ```text
//! stores(id TEXT PRIMARY KEY, status TEXT NOT NULL, engine TEXT NOT NULL,
//!        url TEXT NOT NULL, created_at INTEGER NOT NULL, last_error TEXT)
//! ```
//!
//! The primary key is what makes `create_if_absent` race-free: the insert is
//! `ON CONFLICT(id) DO NOTHING`, so two concurrent creates for the same id
//! cannot both observe "absent". The row read that follows happens in the same
//! immediate transaction, so the caller always gets the row that won.
//!
//! The connection lives behind a `Mutex`. Every method takes the guard for its
//! own duration only; the guard (and any open transaction) is dropped on every
//! return path.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};

use crate::error::{Result, StoreError};
use crate::types::{StoreRecord, StoreStatus};

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS stores(
    id TEXT PRIMARY KEY,
    status TEXT NOT NULL,
    engine TEXT NOT NULL,
    url TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    last_error TEXT
);
";

const SELECT_COLUMNS: &str = "SELECT id, status, engine, url, created_at, last_error FROM stores";

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<StoreRecord> {
    let status: String = row.get(1)?;
    let status = status
        .parse::<StoreStatus>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e)))?;
    Ok(StoreRecord {
        id: row.get(0)?,
        status,
        engine: row.get(2)?,
        url: row.get(3)?,
        created_at: row.get(4)?,
        last_error: row.get(5)?,
    })
}

// ---------------------------------------------------------------------------
// Insertion
// ---------------------------------------------------------------------------

/// Outcome of [`Registry::create_if_absent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Insertion {
    /// The row was inserted by this call.
    Created(StoreRecord),
    /// A row with the id already existed and was left untouched.
    Existing(StoreRecord),
}

impl Insertion {
    pub fn record(&self) -> &StoreRecord {
        match self {
            Insertion::Created(r) | Insertion::Existing(r) => r,
        }
    }

    pub fn into_record(self) -> StoreRecord {
        match self {
            Insertion::Created(r) | Insertion::Existing(r) => r,
        }
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

pub struct Registry {
    conn: Mutex<Connection>,
}

impl Registry {
    /// Open or create the registry database at `path`.
    ///
    /// Creates the parent directory and the `stores` table if missing.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            crate::io::ensure_dir(parent)?;
        }
        let conn = Connection::open(path).map_err(|e| {
            StoreError::Registry(format!("cannot open database {}: {e}", path.display()))
        })?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "wal", |row| row.get(0))?;
        if mode != "wal" {
            tracing::debug!(mode = %mode, "registry journal mode is not WAL");
        }
        Self::init(conn)
    }

    /// A private registry that disappears when dropped.
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Registry("registry connection lock poisoned".into()))
    }

    /// Insert `record` unless a row with its id exists; return whichever row
    /// is stored afterwards.
    pub fn create_if_absent(&self, record: &StoreRecord) -> Result<Insertion> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let inserted = tx.execute(
            "INSERT INTO stores(id, status, engine, url, created_at, last_error)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(id) DO NOTHING",
            params![
                record.id,
                record.status.as_str(),
                record.engine,
                record.url,
                record.created_at,
                record.last_error,
            ],
        )?;
        let stored = tx.query_row(
            &format!("{SELECT_COLUMNS} WHERE id = ?1"),
            [&record.id],
            row_to_record,
        )?;
        tx.commit()?;

        Ok(if inserted == 1 {
            Insertion::Created(stored)
        } else {
            Insertion::Existing(stored)
        })
    }

    pub fn get(&self, id: &str) -> Result<StoreRecord> {
        let conn = self.conn()?;
        conn.query_row(&format!("{SELECT_COLUMNS} WHERE id = ?1"), [id], row_to_record)
            .optional()?
            .ok_or_else(|| StoreError::StoreNotFound(id.to_string()))
    }

    /// All records, newest first. Ties on `created_at` are ordered by id.
    pub fn list(&self) -> Result<Vec<StoreRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "{SELECT_COLUMNS} ORDER BY created_at DESC, id ASC"
        ))?;
        let rows = stmt.query_map([], row_to_record)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Set `status` and replace `last_error` (`None` clears it).
    pub fn update_status(&self, id: &str, status: StoreStatus, error: Option<&str>) -> Result<()> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE stores SET status = ?1, last_error = ?2 WHERE id = ?3",
            params![status.as_str(), error, id],
        )?;
        if changed == 0 {
            return Err(StoreError::StoreNotFound(id.to_string()));
        }
        Ok(())
    }

    /// Attach an error without touching the status.
    pub fn record_error(&self, id: &str, error: &str) -> Result<()> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE stores SET last_error = ?1 WHERE id = ?2",
            params![error, id],
        )?;
        if changed == 0 {
            return Err(StoreError::StoreNotFound(id.to_string()));
        }
        Ok(())
    }

    /// Move a `Failed` record back to `Provisioning` and clear its error.
    ///
    /// Returns `true` only for the caller whose update matched; concurrent
    /// callers see `false`.
    pub fn reclaim_failed(&self, id: &str) -> Result<bool> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE stores SET status = ?1, last_error = NULL WHERE id = ?2 AND status = ?3",
            params![
                StoreStatus::Provisioning.as_str(),
                id,
                StoreStatus::Failed.as_str()
            ],
        )?;
        Ok(changed == 1)
    }

    /// Remove the row. Returns whether one existed.
    pub fn delete(&self, id: &str) -> Result<bool> {
        let conn = self.conn()?;
        let changed = conn.execute("DELETE FROM stores WHERE id = ?1", [id])?;
        Ok(changed == 1)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
