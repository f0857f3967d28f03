//! In-band markers for system-generated text spans
//!
//! Note content carries two kinds of system-generated spans: forward
//! markers flagging recognized outgoing links (cosmetic, detection-only)
//! and backlink annotation lines appended to referenced notes. Both are
//! tagged with invisible zero-width character sequences so they can be
//! recognized, counted, and stripped without disturbing what the user
//! actually wrote.
//!
//! Every operation here is pure and idempotent: encoding twice changes
//! nothing the second time, and stripping is stable under repetition. That
//! idempotence is what keeps markers from accumulating duplicate nesting
//! across repeated saves.

use crate::models::MarkerScan;
use regex::Regex;
use std::sync::LazyLock;

/// Invisible prefix flagging that the immediately-following span is a
/// recognized outgoing reference (ZWSP + ZWNJ)
pub const FORWARD_MARKER: &str = "\u{200B}\u{200C}";

/// Invisible prefix flagging that the rest of the line is a
/// system-generated backlink annotation (ZWSP + ZWJ)
pub const BACKLINK_MARKER: &str = "\u{200B}\u{200D}";

/// A full backlink-annotation line: marker, arrow, fixed phrase, note ID
static BACKLINK_LINE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\u{200B}\u{200D}↪ Linked from note [A-Za-z0-9._-]+\s*$").unwrap()
});

/// The visible body of a backlink annotation for one source note
fn backlink_annotation(source_note_id: &str) -> String {
    format!("{BACKLINK_MARKER}↪ Linked from note {source_note_id}")
}

/// Build the backlink annotation to append to a target note's content
///
/// Returns the marker plus a fixed-format line naming the source note,
/// with a leading newline so it can be appended directly to content.
pub fn encode_backlink(source_note_id: &str) -> String {
    format!("\n{}", backlink_annotation(source_note_id))
}

/// Check whether content already carries the backlink annotation for one
/// source note
///
/// Whole-line comparison, so note `17` never matches an annotation for
/// note `176`.
pub fn has_backlink(content: &str, source_note_id: &str) -> bool {
    let annotation = backlink_annotation(source_note_id);
    content.lines().any(|line| line.trim_end() == annotation)
}

/// Insert the forward marker immediately before a link span
///
/// `span_start` is the byte offset of the span within `text` (a char
/// boundary, as produced by the link parser). No-op when the marker is
/// already present at that position.
pub fn encode_forward_marker(text: &str, span_start: usize) -> String {
    if text[..span_start].ends_with(FORWARD_MARKER) {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len() + FORWARD_MARKER.len());
    out.push_str(&text[..span_start]);
    out.push_str(FORWARD_MARKER);
    out.push_str(&text[span_start..]);
    out
}

/// Remove every forward marker, leaving backlink annotations alone
///
/// Used to normalize a source note before re-parsing: backlink lines in
/// that note belong to *other* notes' reconciliations and must survive.
pub fn strip_forward_markers(text: &str) -> String {
    text.replace(FORWARD_MARKER, "")
}

/// Remove every marker occurrence and every backlink-annotation line
///
/// Produces the clean user-authored text. Stray markers that lost their
/// annotation line (e.g. through partial edits) are removed as well.
pub fn strip_all_markers(text: &str) -> String {
    let kept: Vec<&str> = text
        .lines()
        .filter(|line| !BACKLINK_LINE_REGEX.is_match(line))
        .collect();

    kept.join("\n")
        .replace(FORWARD_MARKER, "")
        .replace(BACKLINK_MARKER, "")
}

/// Count marker occurrences for diagnostics and UI badges
pub fn detect_markers(content: &str) -> MarkerScan {
    let reference_count = content.matches(FORWARD_MARKER).count();
    let backlink_count = content
        .lines()
        .filter(|line| BACKLINK_LINE_REGEX.is_match(line))
        .count();

    MarkerScan {
        has_references: reference_count > 0,
        has_backlinks: backlink_count > 0,
        reference_count,
        backlink_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_forward_marker_inserts_at_span() {
        let text = "see [x](http://h.io/note/1)";
        let marked = encode_forward_marker(text, 4);
        assert_eq!(marked, format!("see {FORWARD_MARKER}[x](http://h.io/note/1)"));
    }

    #[test]
    fn test_encode_forward_marker_is_idempotent() {
        let text = "see [x](http://h.io/note/1)";
        let once = encode_forward_marker(text, 4);
        // Re-encoding at the shifted span position is a no-op
        let twice = encode_forward_marker(&once, 4 + FORWARD_MARKER.len());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_strip_forward_markers_round_trip() {
        let text = "see [x](http://h.io/note/1)";
        let marked = encode_forward_marker(text, 4);
        assert_eq!(strip_forward_markers(&marked), text);
        // Stripping clean text changes nothing
        assert_eq!(strip_forward_markers(text), text);
    }

    #[test]
    fn test_encode_backlink_format() {
        let line = encode_backlink("a1");
        assert!(line.starts_with('\n'));
        assert!(line.contains(BACKLINK_MARKER));
        assert!(line.ends_with("↪ Linked from note a1"));
    }

    #[test]
    fn test_has_backlink_detects_appended_annotation() {
        let mut content = "target note body".to_string();
        assert!(!has_backlink(&content, "src"));

        content.push_str(&encode_backlink("src"));
        assert!(has_backlink(&content, "src"));
        assert!(!has_backlink(&content, "other"));
    }

    #[test]
    fn test_has_backlink_requires_exact_id() {
        let mut content = "body".to_string();
        content.push_str(&encode_backlink("176"));

        assert!(has_backlink(&content, "176"));
        // "17" is a prefix of "176" but has no annotation of its own
        assert!(!has_backlink(&content, "17"));
    }

    #[test]
    fn test_strip_forward_leaves_backlink_lines() {
        let mut content = "body".to_string();
        content.push_str(&encode_backlink("a"));
        let marked = encode_forward_marker(&content, 0);

        let stripped = strip_forward_markers(&marked);
        assert!(has_backlink(&stripped, "a"));
        assert!(!stripped.contains(FORWARD_MARKER));
    }

    #[test]
    fn test_strip_all_markers_removes_everything() {
        let mut content = "user text".to_string();
        content.push_str(&encode_backlink("a"));
        content.push_str(&encode_backlink("b"));
        let marked = encode_forward_marker(&content, 0);

        assert_eq!(strip_all_markers(&marked), "user text");
    }

    #[test]
    fn test_strip_all_markers_on_clean_text_is_identity() {
        let text = "plain text\nwith lines";
        assert_eq!(strip_all_markers(text), text);
    }

    #[test]
    fn test_detect_markers_counts() {
        let mut content = "intro [x](http://h.io/note/1)".to_string();
        content = encode_forward_marker(&content, 6);
        content.push_str(&encode_backlink("a"));
        content.push_str(&encode_backlink("b"));

        let scan = detect_markers(&content);
        assert!(scan.has_references);
        assert!(scan.has_backlinks);
        assert_eq!(scan.reference_count, 1);
        assert_eq!(scan.backlink_count, 2);
    }

    #[test]
    fn test_detect_markers_on_clean_content() {
        let scan = detect_markers("nothing special here");
        assert!(!scan.has_references);
        assert!(!scan.has_backlinks);
        assert_eq!(scan.reference_count, 0);
        assert_eq!(scan.backlink_count, 0);
    }
}
