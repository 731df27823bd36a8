//! Source item (transcript) loading.
//!
//! # Responsibility
//! - Discover transcript files in deterministic name order.
//! - Parse the optional front-matter preamble, title and start time.
//! - Tail-truncate transcript text for collaborator prompts.
//!
//! # Invariants
//! - Source items are read-only; nothing here writes to the history dir.
//! - `rel_path` is `/`-separated and stable across platforms.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

const UNTITLED: &str = "(untitled)";
const TRANSCRIPT_EXTENSION: &str = "md";

static FILENAME_STARTED_AT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{4}-\d{2}-\d{2})_(\d{2})-(\d{2})-(\d{2})Z").expect("valid filename regex")
});

/// One immutable transcript as seen by the merge engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceItem {
    /// Identity key: path relative to the repository root.
    pub rel_path: String,
    pub abs_path: PathBuf,
    pub provider: String,
    pub started_at: String,
    pub updated_at: String,
    pub message_count: String,
    pub title: String,
    /// Full raw text (lossy UTF-8), used for sensitive-category detection.
    pub raw: String,
    /// Prompt transcript; the tail of `raw` when `max_chars` applies.
    pub content: String,
}

impl SourceItem {
    /// Loads one transcript file.
    ///
    /// `max_chars` keeps only the last N characters of the transcript, with a
    /// marker line noting the truncation. `None` or `0` disables truncation.
    pub fn load(repo_root: &Path, path: &Path, max_chars: Option<usize>) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let raw = String::from_utf8_lossy(&bytes).into_owned();
        Ok(Self::from_text(
            relative_path(repo_root, path),
            path.to_path_buf(),
            raw,
            max_chars,
        ))
    }

    /// Builds an item from already-read text.
    pub fn from_text(
        rel_path: String,
        abs_path: PathBuf,
        raw: String,
        max_chars: Option<usize>,
    ) -> Self {
        let (front_matter, body) = parse_front_matter(&raw);
        let title = extract_title(body);
        let file_name = abs_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let started_at = front_matter
            .get("started_at")
            .filter(|value| !value.is_empty())
            .cloned()
            .unwrap_or_else(|| started_at_from_file_name(&file_name));
        let field = |key: &str| front_matter.get(key).cloned().unwrap_or_default();
        let content = truncate_tail(&raw, max_chars);

        Self {
            rel_path,
            provider: field("provider"),
            updated_at: field("updated_at"),
            message_count: field("message_count"),
            started_at,
            title,
            abs_path,
            content,
            raw,
        }
    }
}

/// Lists `*.md` transcripts in `dir`, sorted by file name.
pub fn discover_source_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_transcript = path
            .extension()
            .is_some_and(|ext| ext == TRANSCRIPT_EXTENSION);
        if is_transcript && path.is_file() {
            files.push(path);
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// Renders `path` relative to `root` with `/` separators.
///
/// Paths outside `root` keep their full form.
pub fn relative_path(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            Component::RootDir => Some(String::new()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Splits an optional `---` fenced `key: value` preamble from the body.
///
/// Without a closing fence the whole text is treated as body.
pub fn parse_front_matter(text: &str) -> (BTreeMap<String, String>, &str) {
    let mut lines = text.split_inclusive('\n');
    let fence = match lines.next() {
        Some(first) if first.trim() == "---" => first,
        _ => return (BTreeMap::new(), text),
    };

    let mut fields = BTreeMap::new();
    let mut consumed = fence.len();
    for line in lines {
        consumed += line.len();
        let trimmed = line.trim();
        if trimmed == "---" {
            return (fields, &text[consumed..]);
        }
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once(':') {
            fields.insert(key.trim().to_string(), value.trim().to_string());
        }
    }
    (BTreeMap::new(), text)
}

/// Returns the first `# ` heading of `body`, or `(untitled)`.
pub fn extract_title(body: &str) -> String {
    body.lines()
        .find_map(|line| line.strip_prefix("# "))
        .map(|title| title.trim().to_string())
        .unwrap_or_else(|| UNTITLED.to_string())
}

/// Derives `YYYY-MM-DD HH:MM:SSZ` from a `YYYY-MM-DD_HH-MM-SSZ...` file name.
pub fn started_at_from_file_name(name: &str) -> String {
    FILENAME_STARTED_AT_RE
        .captures(name)
        .map(|caps| format!("{} {}:{}:{}Z", &caps[1], &caps[2], &caps[3], &caps[4]))
        .unwrap_or_default()
}

fn truncate_tail(raw: &str, max_chars: Option<usize>) -> String {
    let max_chars = match max_chars {
        Some(limit) if limit > 0 => limit,
        _ => return raw.to_string(),
    };
    let total = raw.chars().count();
    if total <= max_chars {
        return raw.to_string();
    }
    let start = raw
        .char_indices()
        .nth(total - max_chars)
        .map_or(raw.len(), |(index, _)| index);
    format!(
        "[...truncated to last {max_chars} chars...]\n\n{}",
        &raw[start..]
    )
}
