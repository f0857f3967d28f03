//! Service Layer Error Types
//!
//! This module defines error types for service-layer operations, providing
//! detailed error handling for business logic failures.

use crate::db::DatabaseError;
use thiserror::Error;

/// Reference engine operation errors
///
/// Unresolvable link targets, duplicate edges, and per-target annotation
/// failures are NOT errors - they are expected states handled inside the
/// engine (dropped, ignored, and logged respectively). What surfaces here
/// is only what the caller must know about: a note-addressed operation
/// that cannot proceed, or a store failure.
#[derive(Error, Debug)]
pub enum ReferenceServiceError {
    /// Note not found by ID (for operations that must read note content)
    #[error("Note not found: {id}")]
    NoteNotFound { id: String },

    /// Database operation failed
    #[error("Database operation failed: {0}")]
    DatabaseError(#[from] DatabaseError),
}

impl ReferenceServiceError {
    /// Create a note not found error
    pub fn note_not_found(id: impl Into<String>) -> Self {
        Self::NoteNotFound { id: id.into() }
    }
}
