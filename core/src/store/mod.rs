//! SQLite persistence layer.
//!
//! RULE: Only the store talks to the database.
//! Pipeline stages call store methods; they never execute SQL directly.

use crate::error::SegResult;
use rusqlite::Connection;
use std::time::Duration;

mod rlfm;
mod runs;
mod stats;
mod transactions;

pub use rlfm::RlfmRow;
pub use runs::{NewRun, RunRecord, RunSummary};
pub use stats::{ClusterCustomer, ClusterStats};
pub use transactions::DataSummary;

/// Writers wait this long for a competing writer before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct SegStore {
    conn: Connection,
    path: Option<String>, // None for :memory:, Some(path) for file
}

impl SegStore {
    pub fn open(path: &str) -> SegResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only for real files (shared-memory and :memory: ignore it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(Self {
            conn,
            path: Some(path.to_string()),
        })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> SegResult<Self> {
        let conn = Connection::open(":memory:")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn, path: None })
    }

    /// Reopen a new connection to the same database.
    /// For in-memory databases, this returns a new in-memory database (isolated).
    /// For file-based databases, this opens the same file.
    pub fn reopen(&self) -> SegResult<Self> {
        match &self.path {
            Some(p) => Self::open(p),
            None => Self::in_memory(),
        }
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> SegResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_foundation.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/002_clustering.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/003_rlfm_snapshot.sql"))?;
        Ok(())
    }
}
