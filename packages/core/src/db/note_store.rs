//! NoteStore Trait - Note Persistence Seam
//!
//! This module defines the `NoteStore` trait: the narrow interface the
//! reference engine consumes from the app's note storage. Note lifecycle
//! (create/delete, recycle bin, backups) belongs to the app and is NOT part
//! of this seam - the engine only resolves notes and rewrites content of
//! referenced notes.
//!
//! # Design Decisions
//!
//! 1. **Async-First**: All methods are async so embedded and networked
//!    backends can sit behind the same trait
//! 2. **Owner Scoping**: Every method takes `user_id`; a note that exists
//!    under a different owner does not resolve
//! 3. **Race Tolerance**: `update_content` returns `Ok(None)` when the note
//!    vanished between resolve and write, so callers can treat a
//!    concurrently deleted target as a soft skip instead of an error

use crate::db::database::{parse_timestamp, DatabaseService};
use crate::db::error::DatabaseError;
use crate::models::Note;
use async_trait::async_trait;
use std::sync::Arc;

/// Abstraction over note persistence, as consumed by the reference engine
///
/// Implementations must be `Send + Sync` so the engine can hold them behind
/// `Arc<dyn NoteStore>` across await points.
#[async_trait]
pub trait NoteStore: Send + Sync {
    /// Fetch a note by ID, restricted to the given owner
    ///
    /// Returns `Ok(None)` when the note does not exist or belongs to a
    /// different owner.
    async fn get_by_id(
        &self,
        note_id: &str,
        user_id: &str,
    ) -> Result<Option<Note>, DatabaseError>;

    /// Replace a note's content, restricted to the given owner
    ///
    /// Returns the updated note, or `Ok(None)` when the note no longer
    /// exists (e.g. deleted concurrently).
    async fn update_content(
        &self,
        note_id: &str,
        user_id: &str,
        content: &str,
    ) -> Result<Option<Note>, DatabaseError>;
}

/// libsql-backed NoteStore implementation
///
/// Fills the Note Store collaborator role when the app runs against the
/// embedded database; also the store used throughout the engine's own
/// integration tests. The extra `create_note`/`delete_note` methods are app
/// and test plumbing, deliberately absent from the trait.
pub struct LibsqlNoteStore {
    db: Arc<DatabaseService>,
}

impl LibsqlNoteStore {
    /// Create a new LibsqlNoteStore over a shared database service
    pub fn new(db: Arc<DatabaseService>) -> Self {
        Self { db }
    }

    /// Insert a note row
    pub async fn create_note(&self, note: &Note) -> Result<(), DatabaseError> {
        let conn = self.db.connect_with_timeout().await?;

        conn.execute(
            "INSERT INTO notes (id, user_id, content) VALUES (?, ?, ?)",
            (note.id.as_str(), note.user_id.as_str(), note.content.as_str()),
        )
        .await
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to create note: {}", e)))?;

        Ok(())
    }

    /// Delete a note row, returning the number of rows removed
    ///
    /// This models the app's hard-delete path that bypasses reconciliation;
    /// edges referencing the deleted note linger until the orphan sweep.
    pub async fn delete_note(&self, note_id: &str, user_id: &str) -> Result<u64, DatabaseError> {
        let conn = self.db.connect_with_timeout().await?;

        let rows_affected = conn
            .execute(
                "DELETE FROM notes WHERE id = ? AND user_id = ?",
                (note_id, user_id),
            )
            .await
            .map_err(|e| DatabaseError::sql_execution(format!("Failed to delete note: {}", e)))?;

        Ok(rows_affected)
    }

    async fn fetch_note(
        &self,
        conn: &libsql::Connection,
        note_id: &str,
        user_id: &str,
    ) -> Result<Option<Note>, DatabaseError> {
        let mut stmt = conn
            .prepare(
                "SELECT id, user_id, content, created_at, modified_at
                 FROM notes WHERE id = ? AND user_id = ?",
            )
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to prepare note query: {}", e))
            })?;

        let mut rows = stmt.query((note_id, user_id)).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute note query: {}", e))
        })?;

        let row = match rows
            .next()
            .await
            .map_err(|e| DatabaseError::sql_execution(e.to_string()))?
        {
            Some(row) => row,
            None => return Ok(None),
        };

        let id: String = row
            .get(0)
            .map_err(|e| DatabaseError::sql_execution(e.to_string()))?;
        let user_id: String = row
            .get(1)
            .map_err(|e| DatabaseError::sql_execution(e.to_string()))?;
        let content: String = row
            .get(2)
            .map_err(|e| DatabaseError::sql_execution(e.to_string()))?;
        let created_at: String = row
            .get(3)
            .map_err(|e| DatabaseError::sql_execution(e.to_string()))?;
        let modified_at: String = row
            .get(4)
            .map_err(|e| DatabaseError::sql_execution(e.to_string()))?;

        Ok(Some(Note {
            id,
            user_id,
            content,
            created_at: parse_timestamp(&created_at),
            modified_at: parse_timestamp(&modified_at),
        }))
    }
}

#[async_trait]
impl NoteStore for LibsqlNoteStore {
    async fn get_by_id(
        &self,
        note_id: &str,
        user_id: &str,
    ) -> Result<Option<Note>, DatabaseError> {
        let conn = self.db.connect_with_timeout().await?;
        self.fetch_note(&conn, note_id, user_id).await
    }

    async fn update_content(
        &self,
        note_id: &str,
        user_id: &str,
        content: &str,
    ) -> Result<Option<Note>, DatabaseError> {
        let conn = self.db.connect_with_timeout().await?;

        let rows_affected = conn
            .execute(
                "UPDATE notes SET content = ?, modified_at = CURRENT_TIMESTAMP
                 WHERE id = ? AND user_id = ?",
                (content, note_id, user_id),
            )
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to update note content: {}", e))
            })?;

        if rows_affected == 0 {
            return Ok(None);
        }

        self.fetch_note(&conn, note_id, user_id).await
    }
}
