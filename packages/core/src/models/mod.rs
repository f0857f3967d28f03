//! Data Models
//!
//! This module contains the core data structures used throughout NoteFlow's
//! reference engine:
//!
//! - `Note` - a note as the engine sees it (content owned by the Note Store)
//! - `ReferenceEdge` - a directed reference between two notes
//! - `NoteReferences`, `ReconcileOutcome`, `MarkerScan` - result shapes
//!   returned to the route/API layer

mod edge;
mod note;

pub use edge::{MarkerScan, NoteReferences, ReconcileOutcome, ReferenceEdge};
pub use note::Note;
