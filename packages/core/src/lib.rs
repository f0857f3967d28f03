//! NoteFlow Core - Bidirectional Note-Reference Engine
//!
//! This crate provides the reference engine behind NoteFlow's note-taking
//! app: it scans note content for links to other notes, maintains a
//! directed reference graph, injects backlink annotations into referenced
//! notes, keeps both consistent across edits and deletions, and pushes
//! freshness notifications to live clients.
//!
//! # Architecture
//!
//! - **Derived state**: a note's outgoing edges are a pure function of its
//!   current content, recomputed wholesale on every save
//! - **libsql**: embedded SQLite-compatible persistence; uniqueness
//!   violations on edge insert mean "already present"
//! - **Injected collaborators**: the Note Store and Session Registry are
//!   trait seams, never globals
//!
//! # Modules
//!
//! - [`models`] - Data structures (Note, ReferenceEdge, result shapes)
//! - [`utils`] - Pure text code: link parsing and the marker codec
//! - [`services`] - Reconciliation engine, orphan sweep, notifications
//! - [`db`] - Database layer with libsql integration
//! - [`rpc`] - JSON-RPC stdio server for the app's route layer

pub mod db;
pub mod models;
pub mod rpc;
pub mod services;
pub mod utils;

// Re-export commonly used types
pub use models::*;
pub use services::*;
