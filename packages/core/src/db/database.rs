//! Database Connection Management
//!
//! This module provides the core database connection and initialization
//! functionality using libsql for NoteFlow's reference engine.
//!
//! # Architecture
//!
//! - **Path-agnostic**: Accepts any valid PathBuf (user-selectable data dir)
//! - **WAL mode**: Write-Ahead Logging for better concurrency
//! - **Foreign keys**: Enabled for referential integrity within this store
//! - **No FK between edges and notes**: the Note Store is an external
//!   collaborator and note deletions may bypass this subsystem entirely;
//!   the resulting drift is repaired by the orphan sweep, not by cascades
//!
//! # Database Connection Patterns
//!
//! **Always use `connect_with_timeout()` in async functions.** The 5-second
//! busy timeout allows concurrent operations to wait and retry instead of
//! failing immediately with `SQLITE_BUSY` when the Tokio runtime interleaves
//! writers.

use crate::db::error::DatabaseError;
use chrono::{DateTime, NaiveDateTime, Utc};
use libsql::{Builder, Database};
use std::path::PathBuf;
use std::sync::Arc;

/// Database service managing the libsql connection and schema
///
/// # Examples
///
/// ```no_run
/// use noteflow_core::db::DatabaseService;
/// use std::path::PathBuf;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let db_path = PathBuf::from("/path/to/noteflow.db");
///     let db_service = DatabaseService::new(db_path).await?;
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct DatabaseService {
    /// libsql database handle (wrapped in Arc for sharing)
    pub db: Arc<Database>,

    /// Path to the database file
    pub db_path: PathBuf,
}

impl DatabaseService {
    /// Create a new DatabaseService with the specified database path
    ///
    /// This will:
    /// 1. Ensure the parent directory exists (create if needed)
    /// 2. Open/create the database file
    /// 3. Initialize the schema (CREATE TABLE IF NOT EXISTS)
    /// 4. Enable SQLite features (WAL mode, foreign keys, busy timeout)
    ///
    /// # Arguments
    ///
    /// * `db_path` - Path to the database file, or `:memory:` for tests
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the directory cannot be created, the
    /// database cannot be opened, or schema initialization fails.
    pub async fn new(db_path: PathBuf) -> Result<Self, DatabaseError> {
        if db_path != PathBuf::from(":memory:") {
            if let Some(parent) = db_path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
        }

        let db = Builder::new_local(&db_path)
            .build()
            .await
            .map_err(|e| DatabaseError::connection_failed(db_path.clone(), e))?;

        let service = Self {
            db: Arc::new(db),
            db_path,
        };

        service.initialize_schema().await?;

        Ok(service)
    }

    /// Get a connection without the busy timeout configured
    ///
    /// Use only in single-threaded, synchronous contexts where the
    /// connection is not held across await points.
    pub fn connect(&self) -> Result<libsql::Connection, DatabaseError> {
        self.db.connect().map_err(DatabaseError::LibsqlError)
    }

    /// Get an async connection with busy timeout configured
    ///
    /// Sets a 5-second busy timeout so concurrent operations wait and retry
    /// instead of failing immediately when the database is locked. This is
    /// the default choice for all async call sites.
    pub async fn connect_with_timeout(&self) -> Result<libsql::Connection, DatabaseError> {
        let conn = self.connect()?;

        self.execute_pragma(&conn, "PRAGMA busy_timeout = 5000")
            .await?;

        Ok(conn)
    }

    /// Execute a PRAGMA statement, discarding any result rows
    async fn execute_pragma(
        &self,
        conn: &libsql::Connection,
        pragma: &str,
    ) -> Result<(), DatabaseError> {
        let mut stmt = conn.prepare(pragma).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute '{}': {}", pragma, e))
        })?;
        let _ = stmt.query(()).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute '{}': {}", pragma, e))
        })?;
        Ok(())
    }

    /// Initialize database schema and configuration
    ///
    /// Creates tables and indexes using CREATE TABLE IF NOT EXISTS,
    /// ensuring idempotent initialization (safe to call multiple times).
    ///
    /// # Schema
    ///
    /// - `notes` table: note rows as the Note Store persists them
    /// - `note_references` table: directed reference edges, unique on
    ///   `(from_note_id, to_note_id, reference_text)`
    /// - Indexes for per-owner and bidirectional endpoint queries
    async fn initialize_schema(&self) -> Result<(), DatabaseError> {
        let conn = self.connect()?;

        self.execute_pragma(&conn, "PRAGMA journal_mode = WAL")
            .await?;
        self.execute_pragma(&conn, "PRAGMA busy_timeout = 5000")
            .await?;
        self.execute_pragma(&conn, "PRAGMA foreign_keys = ON")
            .await?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS notes (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                content TEXT NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                modified_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )",
            (),
        )
        .await
        .map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to create notes table: {}", e))
        })?;

        // Reference edges carry no FK into notes: the Note Store may live
        // elsewhere and hard-deletes may bypass this subsystem. Orphaned
        // edges are repaired by the sweep.
        conn.execute(
            "CREATE TABLE IF NOT EXISTS note_references (
                id TEXT PRIMARY KEY,
                from_note_id TEXT NOT NULL,
                to_note_id TEXT NOT NULL,
                reference_text TEXT NOT NULL,
                user_id TEXT NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                UNIQUE (from_note_id, to_note_id, reference_text)
            )",
            (),
        )
        .await
        .map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to create note_references table: {}", e))
        })?;

        self.create_core_indexes(&conn).await?;

        Ok(())
    }

    /// Create core indexes
    ///
    /// These indexes are essential for query performance and never change
    /// (no ALTER TABLE required on user machines).
    async fn create_core_indexes(&self, conn: &libsql::Connection) -> Result<(), DatabaseError> {
        // Index on user_id (every note query is owner-scoped)
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_notes_user ON notes(user_id)",
            (),
        )
        .await
        .map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to create index 'idx_notes_user': {}", e))
        })?;

        // Indexes for note_references (bidirectional endpoint queries)
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_references_source ON note_references(from_note_id)",
            (),
        )
        .await
        .map_err(|e| {
            DatabaseError::sql_execution(format!(
                "Failed to create index 'idx_references_source': {}",
                e
            ))
        })?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_references_target ON note_references(to_note_id)",
            (),
        )
        .await
        .map_err(|e| {
            DatabaseError::sql_execution(format!(
                "Failed to create index 'idx_references_target': {}",
                e
            ))
        })?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_references_user ON note_references(user_id)",
            (),
        )
        .await
        .map_err(|e| {
            DatabaseError::sql_execution(format!(
                "Failed to create index 'idx_references_user': {}",
                e
            ))
        })?;

        Ok(())
    }
}

/// Parse a timestamp from the database - handles both SQLite and RFC3339 formats
///
/// `CURRENT_TIMESTAMP` defaults produce `YYYY-MM-DD HH:MM:SS`; rows written
/// through serde round-trips carry RFC3339. Unparseable values fall back to
/// now rather than failing a whole row read.
pub(crate) fn parse_timestamp(s: &str) -> DateTime<Utc> {
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return naive.and_utc();
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }

    Utc::now()
}
