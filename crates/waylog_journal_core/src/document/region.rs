//! Managed-region protocol.
//!
//! # Responsibility
//! - Split a document into `(prefix, body, suffix)` around a marker pair.
//! - Render the exact inverse of that split.
//! - Carry the journal's manual notes forward across regeneration.
//!
//! # Invariants
//! - Extraction uses the first `begin` and the first `end` after it.
//! - A missing marker, or an `end` only before `begin`, yields `None`.
//! - `extract(d, m)?.render() == d` for every extractable `d`.
//! - `extract(render(p, b, s, m), m)` yields `(p, b, s)` whenever `p` and
//!   `b` hold no marker; values passed through `neutralize_markers` never do.

use std::borrow::Cow;

pub const LEDGER_BEGIN: &str = "<!-- waylog-summary:begin -->";
pub const LEDGER_END: &str = "<!-- waylog-summary:end -->";
pub const JOURNAL_BEGIN: &str = "<!-- waylog-journal:begin -->";
pub const JOURNAL_END: &str = "<!-- waylog-journal:end -->";
pub const MANUAL_BEGIN: &str = "<!-- waylog-manual:begin -->";
pub const MANUAL_END: &str = "<!-- waylog-manual:end -->";

const COMMENT_OPEN: &str = "<!--";
const ESCAPED_COMMENT_OPEN: &str = "&lt;!--";

/// Marker pair delimiting one managed region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Markers {
    pub begin: &'static str,
    pub end: &'static str,
}

impl Markers {
    pub const LEDGER: Markers = Markers {
        begin: LEDGER_BEGIN,
        end: LEDGER_END,
    };
    pub const JOURNAL: Markers = Markers {
        begin: JOURNAL_BEGIN,
        end: JOURNAL_END,
    };
    pub const MANUAL: Markers = Markers {
        begin: MANUAL_BEGIN,
        end: MANUAL_END,
    };
}

/// One document split around a marker pair. Markers themselves are excluded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region<'a> {
    pub prefix: &'a str,
    pub body: &'a str,
    pub suffix: &'a str,
    pub markers: Markers,
}

impl<'a> Region<'a> {
    /// Renders this region back into a full document.
    pub fn render(&self) -> String {
        render(self.prefix, self.body, self.suffix, self.markers)
    }

    /// Renders the same prefix/suffix around a replacement body.
    pub fn render_with_body(&self, body: &str) -> String {
        render(self.prefix, body, self.suffix, self.markers)
    }
}

/// Extracts the managed region delimited by `markers`.
pub fn extract(document: &str, markers: Markers) -> Option<Region<'_>> {
    let begin_at = document.find(markers.begin)?;
    let body_start = begin_at + markers.begin.len();
    let end_offset = document[body_start..].find(markers.end)?;
    let body_end = body_start + end_offset;
    Some(Region {
        prefix: &document[..begin_at],
        body: &document[body_start..body_end],
        suffix: &document[body_end + markers.end.len()..],
        markers,
    })
}

/// Renders `prefix + begin + body + end + suffix`.
pub fn render(prefix: &str, body: &str, suffix: &str, markers: Markers) -> String {
    let mut out = String::with_capacity(
        prefix.len() + body.len() + suffix.len() + markers.begin.len() + markers.end.len(),
    );
    out.push_str(prefix);
    out.push_str(markers.begin);
    out.push_str(body);
    out.push_str(markers.end);
    out.push_str(suffix);
    out
}

/// Formats managed content as the region body: one line break after the
/// begin marker, one before the end marker, nothing when empty.
pub fn managed_body(content: &str) -> String {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        "\n".to_string()
    } else {
        format!("\n{trimmed}\n")
    }
}

/// Escapes every comment opener in `text` so it cannot start or close a
/// managed region, or pose as entry metadata, once written into a body.
pub fn neutralize_markers(text: &str) -> Cow<'_, str> {
    if text.contains(COMMENT_OPEN) {
        Cow::Owned(text.replace(COMMENT_OPEN, ESCAPED_COMMENT_OPEN))
    } else {
        Cow::Borrowed(text)
    }
}

/// Returns the raw manual-notes body of `document`, if the region exists.
pub fn extract_manual_notes(document: &str) -> Option<&str> {
    extract(document, Markers::MANUAL).map(|region| region.body)
}

/// Writes `notes` verbatim into the manual-notes region of `document`.
///
/// Returns `document` unchanged when it has no manual-notes region.
pub fn reinsert_manual_notes(document: &str, notes: &str) -> String {
    match extract(document, Markers::MANUAL) {
        Some(region) => region.render_with_body(notes),
        None => document.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::{
        extract, extract_manual_notes, managed_body, neutralize_markers, reinsert_manual_notes,
        render, Markers,
    };

    #[test]
    fn end_marker_before_begin_is_rejected() {
        let doc = format!("{}\n{}", Markers::LEDGER.end, Markers::LEDGER.begin);
        assert!(extract(&doc, Markers::LEDGER).is_none());
    }

    #[test]
    fn extract_then_render_is_identity() {
        let doc = format!(
            "intro\n{}\nbody {} again\n{}\ntail {}",
            Markers::JOURNAL.begin,
            Markers::JOURNAL.begin,
            Markers::JOURNAL.end,
            Markers::JOURNAL.end
        );
        let region = extract(&doc, Markers::JOURNAL).expect("markers");
        assert_eq!(region.prefix, "intro\n");
        assert!(region.suffix.starts_with("\ntail "));
        assert_eq!(region.render(), doc);
    }

    #[test]
    fn render_then_extract_returns_the_parts() {
        let markers = Markers::LEDGER;
        let raw_bodies = [
            "\nplain entry\n".to_string(),
            format!("\nentry mentions {}\n", Markers::LEDGER.end),
            format!("\n{}\n{}\n", Markers::MANUAL.begin, Markers::JOURNAL.end),
            "\n<!-- just a comment -->\n".to_string(),
        ];
        for raw in &raw_bodies {
            let body = neutralize_markers(raw);
            let doc = render("p\n", &body, "\ns", markers);
            let region = extract(&doc, markers).expect("markers");
            assert_eq!(region.prefix, "p\n");
            assert_eq!(region.body, body);
            assert_eq!(region.suffix, "\ns");
        }
    }

    #[test]
    fn neutralized_text_holds_no_marker() {
        let text = format!("see {} and {}", Markers::LEDGER.end, Markers::MANUAL.begin);
        let clean = neutralize_markers(&text);
        assert!(!clean.contains("<!--"));
        assert_eq!(clean, "see &lt;!-- waylog-summary:end --> and &lt;!-- waylog-manual:begin -->");
        assert_eq!(neutralize_markers(&clean), clean);
        assert!(matches!(neutralize_markers("no comments"), std::borrow::Cow::Borrowed(_)));
    }

    #[test]
    fn managed_body_is_newline_framed() {
        assert_eq!(managed_body(""), "\n");
        assert_eq!(managed_body("  \n"), "\n");
        assert_eq!(managed_body("\nblock\n\n"), "\nblock\n");
    }

    #[test]
    fn manual_notes_move_between_documents_verbatim() {
        let old = format!("x\n{}\n\n  keep *this*\n\n{}\n", Markers::MANUAL.begin, Markers::MANUAL.end);
        let fresh = format!("y\n{}\n{}\nz", Markers::MANUAL.begin, Markers::MANUAL.end);
        let notes = extract_manual_notes(&old).expect("notes region");
        let merged = reinsert_manual_notes(&fresh, notes);
        assert_eq!(extract_manual_notes(&merged), Some("\n\n  keep *this*\n\n"));
        assert!(merged.starts_with("y\n") && merged.ends_with("\nz"));
        assert_eq!(reinsert_manual_notes("no region", notes), "no region");
    }
}
