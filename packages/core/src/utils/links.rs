//! Link extraction for note references
//!
//! This module turns raw note text into an ordered, deduplicated list of
//! candidate reference targets. It is pure pattern matching: no existence
//! checks happen here, because a link may legitimately point at a note that
//! does not exist yet (a dangling link) or was deleted later. The
//! reconciliation engine resolves candidates against the Note Store.
//!
//! # Recognized shapes, in priority order
//!
//! 1. A link with leading text ending in a delimiter character before the
//!    bracketed link: `trrr> [text](http://host/note/id)`
//! 2. A plain Markdown link `[text](http://host/note/id)`, where `text` may
//!    itself contain inline markup
//! 3. A bare note URL not already enclosed in a Markdown link
//!
//! Every shape is evaluated against spans not yet claimed by an earlier,
//! more specific shape, so each character of input is attributed to at most
//! one match. This replaces sequential overlapping regex passes, which let
//! a later generic pattern re-match text already consumed by a specific one.
//!
//! URL shape: `scheme://host[:port]/note/{id}` where `{id}` is an opaque
//! token of letters, digits, `-`, `_`, `.`.

use regex::Regex;
use std::sync::LazyLock;

// The note-URL fragment shared by all three shapes. The named `id` group
// captures the target note ID.
const NOTE_URL_FRAGMENT: &str =
    r"[A-Za-z][A-Za-z0-9+.-]*://[A-Za-z0-9.-]+(?::\d+)?/note/(?P<id>[A-Za-z0-9._-]+)";

/// Shape 1: non-space leading text ending in a delimiter, then a bracketed
/// link. The whole prefix belongs to the matched span.
static PREFIXED_LINK_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"[^\s\[\]()]+[>:;|~-]\s*\[(?P<text>[^\]]+)\]\({NOTE_URL_FRAGMENT}\)"
    ))
    .unwrap()
});

/// Shape 2: plain Markdown link
static MARKDOWN_LINK_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"\[(?P<text>[^\]]+)\]\({NOTE_URL_FRAGMENT}\)")).unwrap()
});

/// Shape 3: bare note URL
static BARE_URL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(NOTE_URL_FRAGMENT).unwrap());

/// One candidate reference extracted from note content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedReference {
    /// The target note ID captured from the URL
    pub target_note_id: String,
    /// The link label: bracketed text for Markdown shapes, the URL itself
    /// for bare URLs
    pub label: String,
    /// Byte offset of the start of the matched span within the content
    pub offset: usize,
}

/// Extract candidate note references from content
///
/// Returns candidates ordered by first occurrence, deduplicated by target
/// (first label wins), with references to `source_note_id` itself dropped.
/// Never fails; content with no reference-shaped substrings yields an empty
/// vector.
///
/// # Examples
///
/// ```
/// use noteflow_core::utils::parse_references;
///
/// let content = "trrr> [<u>111</u>](http://localhost:3000/note/176)";
/// let refs = parse_references(content, "9");
/// assert_eq!(refs.len(), 1);
/// assert_eq!(refs[0].target_note_id, "176");
/// ```
pub fn parse_references(content: &str, source_note_id: &str) -> Vec<ParsedReference> {
    let mut claimed: Vec<(usize, usize)> = Vec::new();
    let mut candidates: Vec<ParsedReference> = Vec::new();

    let passes: [&Regex; 3] = [
        &*PREFIXED_LINK_REGEX,
        &*MARKDOWN_LINK_REGEX,
        &*BARE_URL_REGEX,
    ];

    for regex in passes {
        for caps in regex.captures_iter(content) {
            let span = caps.get(0).unwrap();
            if overlaps_claimed(&claimed, span.start(), span.end()) {
                continue;
            }
            claimed.push((span.start(), span.end()));

            let target_note_id = match caps.name("id") {
                Some(id) => id.as_str().to_string(),
                None => continue,
            };
            let label = caps
                .name("text")
                .map(|t| t.as_str())
                .unwrap_or(span.as_str())
                .to_string();

            candidates.push(ParsedReference {
                target_note_id,
                label,
                offset: span.start(),
            });
        }
    }

    candidates.sort_by_key(|c| c.offset);

    // Dedup by target, first occurrence (and therefore first label) wins;
    // self-references never become candidates
    let mut seen = std::collections::HashSet::new();
    candidates
        .into_iter()
        .filter(|c| c.target_note_id != source_note_id)
        .filter(|c| seen.insert(c.target_note_id.clone()))
        .collect()
}

fn overlaps_claimed(claimed: &[(usize, usize)], start: usize, end: usize) -> bool {
    claimed.iter().any(|&(s, e)| start < e && s < end)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefixed_link_with_inline_markup() {
        let refs = parse_references(
            "trrr> [<u>111</u>](http://localhost:3000/note/176)",
            "9",
        );
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].target_note_id, "176");
        assert_eq!(refs[0].label, "<u>111</u>");
        assert_eq!(refs[0].offset, 0);
    }

    #[test]
    fn test_plain_markdown_link() {
        let refs = parse_references("see [my note](https://notes.app/note/abc-1)", "9");
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].target_note_id, "abc-1");
        assert_eq!(refs[0].label, "my note");
    }

    #[test]
    fn test_bare_url() {
        let refs = parse_references("look at http://localhost:3000/note/42 please", "9");
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].target_note_id, "42");
        assert_eq!(refs[0].label, "http://localhost:3000/note/42");
    }

    #[test]
    fn test_url_inside_markdown_link_not_double_counted() {
        let refs = parse_references("[text](http://localhost:3000/note/42)", "9");
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].label, "text");
    }

    #[test]
    fn test_prefixed_span_not_rematched_by_markdown_pass() {
        // One physical link, matchable by all three shapes; exactly one
        // candidate comes out
        let refs = parse_references("prefix> [t](http://h.io/note/5)", "9");
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].target_note_id, "5");
    }

    #[test]
    fn test_self_reference_dropped() {
        let refs = parse_references("[me](http://h.io/note/9)", "9");
        assert!(refs.is_empty());
    }

    #[test]
    fn test_dedup_first_label_wins() {
        let refs = parse_references(
            "[first](http://h.io/note/7) and [second](http://h.io/note/7)",
            "9",
        );
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].label, "first");
    }

    #[test]
    fn test_ordered_by_first_occurrence() {
        let refs = parse_references(
            "http://h.io/note/b then [x](http://h.io/note/a)",
            "9",
        );
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].target_note_id, "b");
        assert_eq!(refs[1].target_note_id, "a");
    }

    #[test]
    fn test_multiple_distinct_targets() {
        let refs = parse_references(
            "[a](http://h.io/note/a) [b](http://h.io/note/b) http://h.io/note/c",
            "9",
        );
        let targets: Vec<&str> = refs.iter().map(|r| r.target_note_id.as_str()).collect();
        assert_eq!(targets, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_no_matches_yields_empty() {
        assert!(parse_references("", "9").is_empty());
        assert!(parse_references("just some plain text", "9").is_empty());
        assert!(parse_references("[link](http://h.io/other/1)", "9").is_empty());
        assert!(parse_references("http://h.io/note/", "9").is_empty());
    }

    #[test]
    fn test_id_token_characters() {
        let refs = parse_references("http://h.io/note/a-b_c.d9", "x");
        assert_eq!(refs[0].target_note_id, "a-b_c.d9");
    }

    #[test]
    fn test_scheme_and_port_variants() {
        let refs = parse_references(
            "app://server.local:8080/note/n1 and https://h.io/note/n2",
            "9",
        );
        let targets: Vec<&str> = refs.iter().map(|r| r.target_note_id.as_str()).collect();
        assert_eq!(targets, vec!["n1", "n2"]);
    }
}
