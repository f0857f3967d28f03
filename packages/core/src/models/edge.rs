//! Reference Edge Data Structures
//!
//! Directed edges between notes, plus the result shapes the reference
//! engine returns to callers.
//!
//! # Wire Format (JSON Serialization)
//!
//! All structs here use `#[serde(rename_all = "camelCase")]`: Rust
//! snake_case fields serialize to camelCase on the wire, following the
//! app frontend's JavaScript conventions. For example:
//! - `from_note_id` → `"fromNoteId"`
//! - `reference_text` → `"referenceText"`
//!
//! The contract tests at the bottom of this file pin that format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A directed reference from one note to another.
///
/// Edges are derived state: the full outgoing set for a note is a pure
/// function of that note's current content and is replaced wholesale on
/// every save. Edges are never authored individually.
///
/// Uniqueness: `(from_note_id, to_note_id, reference_text)`. Both
/// endpoints belong to `user_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceEdge {
    pub id: String,
    pub from_note_id: String,
    pub to_note_id: String,
    /// The link label as written by the user (bracketed text for markdown
    /// links, the URL itself for bare URLs)
    pub reference_text: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

impl ReferenceEdge {
    /// Create a new edge with a generated UUID and current timestamp
    pub fn new(
        user_id: impl Into<String>,
        from_note_id: impl Into<String>,
        to_note_id: impl Into<String>,
        reference_text: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            from_note_id: from_note_id.into(),
            to_note_id: to_note_id.into(),
            reference_text: reference_text.into(),
            user_id: user_id.into(),
            created_at: Utc::now(),
        }
    }
}

/// Both directions of the reference graph around a single note
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteReferences {
    /// Edges where the note is the source
    pub outgoing: Vec<ReferenceEdge>,
    /// Edges where the note is the target
    pub incoming: Vec<ReferenceEdge>,
}

/// Result of one reconciliation pass over a saved note
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileOutcome {
    /// Outgoing edges written for the source note in this pass
    pub created_edge_count: usize,
    /// Target notes whose content actually gained a backlink annotation
    pub annotated_target_count: usize,
    /// The source note plus every target mutated in this pass
    pub affected_note_ids: Vec<String>,
}

/// Marker counts for one note's content, for diagnostics and UI badges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkerScan {
    pub has_references: bool,
    pub has_backlinks: bool,
    pub reference_count: usize,
    pub backlink_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_edge_populates_endpoints() {
        let edge = ReferenceEdge::new("user-1", "a", "b", "my label");
        assert_eq!(edge.from_note_id, "a");
        assert_eq!(edge.to_note_id, "b");
        assert_eq!(edge.reference_text, "my label");
        assert_eq!(edge.user_id, "user-1");
        assert!(Uuid::parse_str(&edge.id).is_ok());
    }

    /// Contract test: pins the exact JSON wire format the app frontend
    /// consumes. If this fails, either the serialization or the frontend
    /// types need updating.
    #[test]
    fn test_edge_serialization_contract() {
        let edge = ReferenceEdge::new("user-1", "a", "b", "label");
        let json = serde_json::to_value(&edge).unwrap();

        assert_eq!(json.get("fromNoteId").unwrap(), "a");
        assert_eq!(json.get("toNoteId").unwrap(), "b");
        assert_eq!(json.get("referenceText").unwrap(), "label");
        assert_eq!(json.get("userId").unwrap(), "user-1");
        assert!(json.get("from_note_id").is_none());
    }

    #[test]
    fn test_outcome_serialization_contract() {
        let outcome = ReconcileOutcome {
            created_edge_count: 2,
            annotated_target_count: 1,
            affected_note_ids: vec!["a".to_string(), "b".to_string()],
        };
        let json = serde_json::to_value(&outcome).unwrap();

        assert_eq!(json.get("createdEdgeCount").unwrap(), 2);
        assert_eq!(json.get("annotatedTargetCount").unwrap(), 1);
        assert_eq!(
            json.get("affectedNoteIds").unwrap(),
            &serde_json::json!(["a", "b"])
        );
    }
}
