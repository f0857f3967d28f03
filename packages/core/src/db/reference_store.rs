//! Reference Store - Edge Persistence
//!
//! Persistence for directed reference edges between notes. Edges are
//! derived state: the outgoing set of a note is recomputed wholesale from
//! its content on every save, so the only write primitive the engine needs
//! is a transactional delete-all-then-insert. Uniqueness violations on
//! insert mean "already present" and are ignored, never surfaced.
//!
//! All SQL for the `note_references` table lives here; services never see
//! SQL.

use crate::db::database::{parse_timestamp, DatabaseService};
use crate::db::error::DatabaseError;
use crate::models::{NoteReferences, ReferenceEdge};
use std::sync::Arc;

/// Store for directed reference edges
pub struct ReferenceStore {
    db: Arc<DatabaseService>,
}

impl ReferenceStore {
    /// Create a new ReferenceStore over a shared database service
    pub fn new(db: Arc<DatabaseService>) -> Self {
        Self { db }
    }

    /// Replace the full outgoing edge set of a source note
    ///
    /// Deletes every existing outgoing edge for `from_note_id` and inserts
    /// the given set in one transaction, so concurrent readers never observe
    /// a transiently empty edge set. Duplicate edges in the input (or edges
    /// racing an identical insert) hit the uniqueness constraint and are
    /// ignored via INSERT OR IGNORE.
    ///
    /// # Returns
    ///
    /// The number of edges actually inserted.
    ///
    /// # Errors
    ///
    /// Any failure rolls the transaction back; no partial edge state is
    /// left behind.
    pub async fn replace_outgoing_edges(
        &self,
        user_id: &str,
        from_note_id: &str,
        edges: &[ReferenceEdge],
    ) -> Result<usize, DatabaseError> {
        let conn = self.db.connect_with_timeout().await?;

        conn.execute("BEGIN TRANSACTION", ()).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to begin transaction: {}", e))
        })?;

        let result = self
            .replace_outgoing_edges_in_tx(&conn, user_id, from_note_id, edges)
            .await;

        match result {
            Ok(inserted) => {
                conn.execute("COMMIT", ()).await.map_err(|e| {
                    DatabaseError::sql_execution(format!("Failed to commit transaction: {}", e))
                })?;
                Ok(inserted)
            }
            Err(e) => {
                // Best-effort rollback; the original error is what matters
                let _ = conn.execute("ROLLBACK", ()).await;
                Err(e)
            }
        }
    }

    async fn replace_outgoing_edges_in_tx(
        &self,
        conn: &libsql::Connection,
        user_id: &str,
        from_note_id: &str,
        edges: &[ReferenceEdge],
    ) -> Result<usize, DatabaseError> {
        conn.execute(
            "DELETE FROM note_references WHERE from_note_id = ? AND user_id = ?",
            (from_note_id, user_id),
        )
        .await
        .map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to clear outgoing edges: {}", e))
        })?;

        let mut inserted = 0usize;
        for edge in edges {
            let rows_affected = conn
                .execute(
                    "INSERT OR IGNORE INTO note_references
                     (id, from_note_id, to_note_id, reference_text, user_id)
                     VALUES (?, ?, ?, ?, ?)",
                    (
                        edge.id.as_str(),
                        edge.from_note_id.as_str(),
                        edge.to_note_id.as_str(),
                        edge.reference_text.as_str(),
                        edge.user_id.as_str(),
                    ),
                )
                .await
                .map_err(|e| {
                    DatabaseError::sql_execution(format!("Failed to insert edge: {}", e))
                })?;
            inserted += rows_affected as usize;
        }

        Ok(inserted)
    }

    /// Get both directions of the reference graph around a note
    pub async fn get_by_note(
        &self,
        user_id: &str,
        note_id: &str,
    ) -> Result<NoteReferences, DatabaseError> {
        let conn = self.db.connect_with_timeout().await?;

        let outgoing = self
            .query_edges(
                &conn,
                "SELECT id, from_note_id, to_note_id, reference_text, user_id, created_at
                 FROM note_references WHERE user_id = ? AND from_note_id = ?
                 ORDER BY created_at, id",
                user_id,
                note_id,
            )
            .await?;

        let incoming = self
            .query_edges(
                &conn,
                "SELECT id, from_note_id, to_note_id, reference_text, user_id, created_at
                 FROM note_references WHERE user_id = ? AND to_note_id = ?
                 ORDER BY created_at, id",
                user_id,
                note_id,
            )
            .await?;

        Ok(NoteReferences { outgoing, incoming })
    }

    /// Delete every edge between an ordered pair of notes
    ///
    /// Removes all labels recorded for the pair. Idempotent: deleting an
    /// absent edge succeeds with a zero count.
    pub async fn delete_edge(
        &self,
        user_id: &str,
        from_note_id: &str,
        to_note_id: &str,
    ) -> Result<u64, DatabaseError> {
        let conn = self.db.connect_with_timeout().await?;

        let rows_affected = conn
            .execute(
                "DELETE FROM note_references
                 WHERE user_id = ? AND from_note_id = ? AND to_note_id = ?",
                (user_id, from_note_id, to_note_id),
            )
            .await
            .map_err(|e| DatabaseError::sql_execution(format!("Failed to delete edge: {}", e)))?;

        Ok(rows_affected)
    }

    /// Collect the distinct note IDs appearing as either endpoint of the
    /// owner's edges
    ///
    /// The orphan sweep resolves these against the Note Store; endpoint
    /// liveness is never decided inside SQL because the Note Store is an
    /// external collaborator.
    pub async fn distinct_endpoint_ids(
        &self,
        user_id: &str,
    ) -> Result<Vec<String>, DatabaseError> {
        let conn = self.db.connect_with_timeout().await?;

        let mut stmt = conn
            .prepare(
                "SELECT from_note_id FROM note_references WHERE user_id = ?
                 UNION
                 SELECT to_note_id FROM note_references WHERE user_id = ?",
            )
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to prepare endpoint query: {}", e))
            })?;

        let mut rows = stmt.query((user_id, user_id)).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute endpoint query: {}", e))
        })?;

        let mut ids = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::sql_execution(e.to_string()))?
        {
            let id: String = row
                .get(0)
                .map_err(|e| DatabaseError::sql_execution(e.to_string()))?;
            ids.push(id);
        }

        Ok(ids)
    }

    /// Delete every edge touching one of the given dead note IDs
    ///
    /// The caller guarantees the IDs were checked against the Note Store
    /// and found missing; only such edges may be deleted, which is what
    /// keeps the sweep race-safe.
    pub async fn delete_edges_touching(
        &self,
        user_id: &str,
        dead_note_ids: &[String],
    ) -> Result<u64, DatabaseError> {
        if dead_note_ids.is_empty() {
            return Ok(0);
        }

        let conn = self.db.connect_with_timeout().await?;

        let placeholders = vec!["?"; dead_note_ids.len()].join(", ");
        let sql = format!(
            "DELETE FROM note_references
             WHERE user_id = ? AND (from_note_id IN ({placeholders}) OR to_note_id IN ({placeholders}))"
        );

        let params: Vec<String> = std::iter::once(user_id.to_string())
            .chain(dead_note_ids.iter().cloned())
            .chain(dead_note_ids.iter().cloned())
            .collect();

        let rows_affected = conn
            .execute(&sql, libsql::params_from_iter(params))
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to delete orphaned edges: {}", e))
            })?;

        Ok(rows_affected)
    }

    async fn query_edges(
        &self,
        conn: &libsql::Connection,
        sql: &str,
        user_id: &str,
        note_id: &str,
    ) -> Result<Vec<ReferenceEdge>, DatabaseError> {
        let mut stmt = conn.prepare(sql).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to prepare edge query: {}", e))
        })?;

        let mut rows = stmt.query((user_id, note_id)).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute edge query: {}", e))
        })?;

        let mut edges = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::sql_execution(e.to_string()))?
        {
            edges.push(Self::edge_from_row(&row)?);
        }

        Ok(edges)
    }

    fn edge_from_row(row: &libsql::Row) -> Result<ReferenceEdge, DatabaseError> {
        let id: String = row
            .get(0)
            .map_err(|e| DatabaseError::sql_execution(e.to_string()))?;
        let from_note_id: String = row
            .get(1)
            .map_err(|e| DatabaseError::sql_execution(e.to_string()))?;
        let to_note_id: String = row
            .get(2)
            .map_err(|e| DatabaseError::sql_execution(e.to_string()))?;
        let reference_text: String = row
            .get(3)
            .map_err(|e| DatabaseError::sql_execution(e.to_string()))?;
        let user_id: String = row
            .get(4)
            .map_err(|e| DatabaseError::sql_execution(e.to_string()))?;
        let created_at: String = row
            .get(5)
            .map_err(|e| DatabaseError::sql_execution(e.to_string()))?;

        Ok(ReferenceEdge {
            id,
            from_note_id,
            to_note_id,
            reference_text,
            user_id,
            created_at: parse_timestamp(&created_at),
        })
    }
}
