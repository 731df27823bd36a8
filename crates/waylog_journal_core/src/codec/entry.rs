//! Ledger entry block codec.
//!
//! # Responsibility
//! - Render one source item summary as a self-describing Markdown block.
//! - Scan a ledger managed body back into entries keyed by relative path.
//!
//! # Invariants
//! - A block is a `## ` header, immediately followed by a metadata comment
//!   carrying at least `file` and `sha256`, ending at the entry sentinel.
//! - Anything else inside the managed body is skipped, never fatal.
//! - Every free-text value written into a block passes through `sanitize`,
//!   and no value can carry a comment opener into the managed body.
//! - A block missing its sentinel ends where the next block starts.
//!
//! # Block layout
//! ```text
//! ## <started> — <provider> — <title>
//! <!-- waylog-entry: file=<path> sha256=<hex> updated_at=<ts> status=ok ... -->
//! - Source: `<path>`
//! **Highlights**
//! - ...
//! <!-- waylog-entry:end -->
//! ```

use crate::document::region::neutralize_markers;
use crate::fingerprint::Fingerprint;
use crate::model::entry::{Entry, EntryStatus, Provenance};
use crate::model::source_item::SourceItem;
use crate::model::summary::{ItemSummary, RelevanceLabel, FALLBACK_HIGHLIGHT};
use crate::redact::sanitize;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

/// Terminating line of every entry block.
pub const ENTRY_END: &str = "<!-- waylog-entry:end -->";
/// Separator between header fields.
pub const HEADER_SEPARATOR: &str = " — ";
pub(crate) const MAX_AREAS: usize = 12;

static ENTRY_META_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^<!--\s*waylog-entry:\s*(?P<body>.*?)\s*-->$").expect("valid entry meta regex")
});

/// Section headings in render order, paired with their summary field.
pub(crate) const SECTIONS: [(&str, SectionKey); 5] = [
    ("Highlights", SectionKey::Highlights),
    ("Decisions", SectionKey::Decisions),
    ("Implementation", SectionKey::ImplementationDetails),
    ("Open Questions", SectionKey::OpenQuestions),
    ("Security", SectionKey::SecurityNotes),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum SectionKey {
    Highlights,
    Decisions,
    ImplementationDetails,
    OpenQuestions,
    SecurityNotes,
}

impl SectionKey {
    fn items(self, summary: &ItemSummary) -> &[String] {
        match self {
            Self::Highlights => &summary.highlights,
            Self::Decisions => &summary.decisions,
            Self::ImplementationDetails => &summary.implementation_details,
            Self::OpenQuestions => &summary.open_questions,
            Self::SecurityNotes => &summary.security_notes,
        }
    }
}

/// Renders one entry block (without trailing newline).
pub fn render_entry(
    item: &SourceItem,
    fingerprint: &Fingerprint,
    summary: &ItemSummary,
    status: EntryStatus,
    provenance: &Provenance,
) -> String {
    let started = if item.started_at.is_empty() {
        item.updated_at.as_str()
    } else {
        item.started_at.as_str()
    };
    let started = neutralize_markers(started);
    let provider = neutralize_markers(non_empty_or(&item.provider, "unknown"));
    let title = clean_text(non_empty_or(&item.title, "(untitled)"));

    let relevance = &summary.project_relevance;
    let label = relevance.label;
    let confidence = relevance.confidence;

    let mut meta = vec![
        meta_pair("file", &item.rel_path),
        meta_pair("sha256", &fingerprint.to_hex()),
        meta_pair("updated_at", &item.updated_at),
        meta_pair("status", status.as_str()),
        meta_pair("relevance", label.as_str()),
        format!("relevance_confidence={confidence:.2}"),
    ];
    if let Some(model) = provenance.model.as_deref().filter(|v| !v.is_empty()) {
        meta.push(meta_pair("model", model));
    }
    if let Some(effort) = provenance.reasoning_effort.as_deref().filter(|v| !v.is_empty()) {
        meta.push(meta_pair("reasoning_effort", effort));
    }

    let mut lines = vec![
        format!("## {started}{HEADER_SEPARATOR}{provider}{HEADER_SEPARATOR}{title}"),
        format!("<!-- waylog-entry: {} -->", meta.join(" ")),
        format!("- Source: `{}`", neutralize_markers(&item.rel_path)),
    ];
    if !item.updated_at.is_empty() {
        lines.push(format!("- Updated: {}", neutralize_markers(&item.updated_at)));
    }
    if !item.message_count.is_empty() {
        lines.push(format!("- Messages: {}", neutralize_markers(&item.message_count)));
    }
    lines.push(format!(
        "- Relevance: {} (confidence {confidence:.2})",
        label.as_str()
    ));

    let reason = relevance.reason.trim();
    if !reason.is_empty() && label != RelevanceLabel::Related {
        lines.push(format!("- Relevance Reason: {}", clean_text(reason)));
    }
    let areas: Vec<String> = relevance
        .touched_areas
        .iter()
        .map(|area| area.trim())
        .filter(|area| !area.is_empty())
        .take(MAX_AREAS)
        .map(clean_text)
        .collect();
    if !areas.is_empty() && label == RelevanceLabel::Related {
        lines.push(format!("- Areas: {}", areas.join(", ")));
    }

    for (heading, key) in SECTIONS {
        let bullets: Vec<String> = key
            .items(summary)
            .iter()
            .map(|item| item.trim())
            .filter(|item| !item.is_empty())
            .map(|item| format!("- {}", clean_text(&single_line(item))))
            .collect();
        if !bullets.is_empty() {
            lines.push(format!("**{heading}**"));
            lines.extend(bullets);
        }
    }
    lines.push(ENTRY_END.to_string());
    lines.join("\n")
}

/// Parses every well-formed entry block of a ledger managed body.
///
/// Later blocks win when a path appears twice.
pub fn parse_entries(managed_body: &str) -> BTreeMap<String, Entry> {
    scan_entries(managed_body)
        .into_iter()
        .map(|entry| (entry.rel_path.clone(), entry))
        .collect()
}

/// Returns the well-formed entry blocks of a managed body in document order.
pub fn scan_entries(managed_body: &str) -> Vec<Entry> {
    let lines: Vec<&str> = managed_body.lines().collect();
    let mut entries = Vec::new();
    let mut i = 0;
    while i < lines.len() {
        let Some(meta) = block_meta(&lines, i) else {
            i += 1;
            continue;
        };

        let mut end = None;
        let mut next_start = None;
        for j in i + 2..lines.len() {
            if lines[j].trim() == ENTRY_END {
                end = Some(j);
                break;
            }
            if block_meta(&lines, j).is_some() {
                next_start = Some(j);
                break;
            }
        }
        let end = match (end, next_start) {
            (Some(end), _) => end,
            (None, Some(next)) => {
                i = next;
                continue;
            }
            (None, None) => break,
        };

        let block = lines[i..=end].join("\n");
        let status = match meta.get("status").filter(|value| !value.is_empty()) {
            Some(value) => EntryStatus::parse(value),
            None => legacy_status(&block),
        };
        entries.push(Entry {
            rel_path: meta.get("file").cloned().unwrap_or_default(),
            fingerprint: meta.get("sha256").cloned().unwrap_or_default(),
            updated_at: meta.get("updated_at").cloned().unwrap_or_default(),
            status,
            block,
        });
        i = end + 1;
    }
    entries
}

// A block starts at a `## ` header directly followed by a metadata comment.
fn block_meta(lines: &[&str], at: usize) -> Option<BTreeMap<String, String>> {
    if !lines.get(at)?.starts_with("## ") {
        return None;
    }
    parse_entry_meta(lines.get(at + 1)?)
}

/// Parses an entry metadata comment line into its key/value pairs.
///
/// Returns `None` unless the line is a metadata comment with `file` and
/// `sha256` keys.
pub fn parse_entry_meta(line: &str) -> Option<BTreeMap<String, String>> {
    let caps = ENTRY_META_RE.captures(line.trim())?;
    let body = caps.name("body")?.as_str();
    let meta: BTreeMap<String, String> = body
        .split_whitespace()
        .filter_map(|token| token.split_once('='))
        .map(|(key, value)| (key.to_string(), decode_meta_value(value)))
        .collect();
    if meta.contains_key("file") && meta.contains_key("sha256") {
        Some(meta)
    } else {
        None
    }
}

/// Joins blocks in the given order into one managed body (trimmed).
pub fn render_entries<'a>(blocks: impl IntoIterator<Item = &'a str>) -> String {
    blocks
        .into_iter()
        .collect::<Vec<_>>()
        .join("\n\n")
        .trim()
        .to_string()
}

/// Status for blocks written before `status` was recorded.
///
/// Heuristic: such blocks count as failed only when they carry the fallback
/// highlight text. Do not rely on this for blocks that record `status`.
fn legacy_status(block: &str) -> EntryStatus {
    if block.contains(FALLBACK_HIGHLIGHT) {
        EntryStatus::Error
    } else {
        EntryStatus::Ok
    }
}

fn meta_pair(key: &str, value: &str) -> String {
    format!("{key}={}", encode_meta_value(value))
}

// Metadata is whitespace-separated inside a comment; spaces, `%` and angle
// brackets inside values are escaped.
fn encode_meta_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '%' => out.push_str("%25"),
            '<' => out.push_str("%3C"),
            '>' => out.push_str("%3E"),
            c if c.is_whitespace() => out.push_str("%20"),
            c => out.push(c),
        }
    }
    out
}

fn decode_meta_value(value: &str) -> String {
    value
        .replace("%20", " ")
        .replace("%3C", "<")
        .replace("%3E", ">")
        .replace("%25", "%")
}

fn clean_text(value: &str) -> String {
    neutralize_markers(&sanitize(value)).into_owned()
}

fn non_empty_or<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.trim().is_empty() {
        fallback
    } else {
        value
    }
}

fn single_line(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::{decode_meta_value, encode_meta_value, parse_entry_meta, scan_entries, ENTRY_END};

    #[test]
    fn meta_values_with_spaces_survive() {
        let encoded = encode_meta_value("notes/a b%.md");
        assert_eq!(encoded, "notes/a%20b%25.md");
        assert_eq!(decode_meta_value(&encoded), "notes/a b%.md");

        let encoded = encode_meta_value("odd <!-- x --> %3C.md");
        assert!(!encoded.contains('<') && !encoded.contains('>'));
        assert_eq!(decode_meta_value(&encoded), "odd <!-- x --> %3C.md");
    }

    #[test]
    fn block_without_sentinel_stops_at_next_block() {
        let body = format!(
            "## t — p — broken\n<!-- waylog-entry: file=a.md sha256=1 -->\n- cut short\n\n\
             ## t — p — whole\n<!-- waylog-entry: file=b.md sha256=2 -->\n- fine\n{ENTRY_END}\n"
        );
        let entries = scan_entries(&body);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].rel_path, "b.md");
        assert!(entries[0].block.starts_with("## t — p — whole\n"));
        assert!(!entries[0].block.contains("cut short"));
    }

    #[test]
    fn meta_without_required_keys_is_rejected() {
        assert!(parse_entry_meta("<!-- waylog-entry: file=a.md -->").is_none());
        assert!(parse_entry_meta("<!-- other: file=a.md sha256=x -->").is_none());
        let meta = parse_entry_meta("  <!-- waylog-entry: file=a.md sha256=x junk -->  ")
            .expect("meta with required keys");
        assert_eq!(meta.get("file").map(String::as_str), Some("a.md"));
        assert!(!meta.contains_key("junk"));
    }
}
