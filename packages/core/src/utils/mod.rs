//! Text utilities for the reference engine
//!
//! Pure string code with no I/O: link extraction and the in-band marker
//! codec. Everything here is deterministic and safe to call on arbitrary
//! user input.

pub mod links;
pub mod markers;

pub use links::{parse_references, ParsedReference};
pub use markers::{
    detect_markers, encode_backlink, encode_forward_marker, has_backlink, strip_all_markers,
    strip_forward_markers,
};
