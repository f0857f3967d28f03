//! Note Data Structure
//!
//! This module defines the `Note` struct as the reference engine sees it.
//! Notes are owned by the Note Store (an external collaborator); this
//! subsystem only ever reads note content and rewrites the content of
//! referenced notes. It never creates or destroys notes on its own.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single note, scoped to one owner.
///
/// # Fields
///
/// - `id`: Unique identifier (UUID for app-created notes; the engine treats
///   it as an opaque token)
/// - `user_id`: Owning user. All reference operations are restricted to a
///   single owner; cross-user references do not exist.
/// - `content`: Raw note text, including any in-band markers and backlink
///   annotation lines the engine has written into it
/// - `created_at` / `modified_at`: Timestamps maintained by the Note Store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    pub user_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl Note {
    /// Create a new note with a generated UUID
    pub fn new(user_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new_with_id(Uuid::new_v4().to_string(), user_id, content)
    }

    /// Create a new note with an explicit ID
    ///
    /// Used when the app shell pre-generates IDs for optimistic UI updates,
    /// and by tests that need predictable IDs.
    pub fn new_with_id(
        id: impl Into<String>,
        user_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            user_id: user_id.into(),
            content: content.into(),
            created_at: now,
            modified_at: now,
        }
    }
}
