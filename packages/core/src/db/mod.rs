//! Database Layer
//!
//! This module handles all database interactions using libsql:
//!
//! - Database initialization and connection management
//! - The `notes` table (Note Store backing) and `note_references` table
//!   (directed reference edges)
//! - The `NoteStore` trait seam the reference engine consumes
//!
//! # Architecture
//!
//! Services never see SQL. The `NoteStore` trait keeps note persistence
//! swappable (the app may back it with a different engine); the
//! `ReferenceStore` owns the edge table and its delete-all-then-insert
//! update discipline.

mod database;
mod error;
mod note_store;
mod reference_store;

pub use database::DatabaseService;
pub use error::DatabaseError;
pub use note_store::{LibsqlNoteStore, NoteStore};
pub use reference_store::ReferenceStore;
