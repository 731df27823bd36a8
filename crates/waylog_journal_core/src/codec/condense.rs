//! Entry block to condensation record projection.
//!
//! # Responsibility
//! - Read rendered entry blocks back into compact, sanitized records that
//!   feed the journal collaborator prompt.
//!
//! # Invariants
//! - Each section is capped independently to bound prompt size.
//! - Every string in a record is sanitized, even if the block already was.

use super::entry::{parse_entry_meta, SectionKey, ENTRY_END, HEADER_SEPARATOR, MAX_AREAS, SECTIONS};
use crate::redact::sanitize;
use serde::Serialize;
use std::collections::BTreeMap;

const HIGHLIGHTS_CAP: usize = 25;
const DECISIONS_CAP: usize = 25;
const IMPLEMENTATION_CAP: usize = 25;
const OPEN_QUESTIONS_CAP: usize = 15;
const SECURITY_CAP: usize = 10;

/// Compact view of one entry for the condensation prompt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CondensationRecord {
    pub started_at: String,
    pub provider: String,
    pub title: String,
    pub file: String,
    pub status: String,
    pub relevance_label: String,
    pub relevance_confidence: Option<f64>,
    pub relevance_reason: String,
    pub areas: Vec<String>,
    pub highlights: Vec<String>,
    pub decisions: Vec<String>,
    pub implementation_details: Vec<String>,
    pub open_questions: Vec<String>,
    pub security_notes: Vec<String>,
}

/// Parses one rendered entry block. Returns `None` unless it starts with a
/// `## ` header.
pub fn parse_block_for_condensation(block: &str) -> Option<CondensationRecord> {
    let mut lines = block.lines();
    let header = lines.next()?.strip_prefix("## ")?.trim();
    let parts: Vec<&str> = header.splitn(3, HEADER_SEPARATOR).collect();
    let (started_at, header_provider, title) = match parts.as_slice() {
        [started, provider, title] => (*started, *provider, *title),
        _ => (header, "", ""),
    };

    let meta = lines
        .next()
        .and_then(parse_entry_meta)
        .unwrap_or_default();
    let mut relevance_label = meta.get("relevance").cloned().unwrap_or_default();
    let relevance_confidence = meta
        .get("relevance_confidence")
        .and_then(|value| value.parse::<f64>().ok());
    let mut relevance_reason = String::new();
    let mut areas: Vec<String> = Vec::new();

    let mut current: Option<SectionKey> = None;
    let mut sections: BTreeMap<SectionKey, Vec<String>> = BTreeMap::new();
    for line in lines {
        if line.trim() == ENTRY_END {
            break;
        }
        if let Some(value) = line.strip_prefix("- Relevance Reason:") {
            relevance_reason = value.trim().to_string();
        } else if let Some(value) = line.strip_prefix("- Relevance:") {
            let label = value.split('(').next().unwrap_or("").trim();
            if !label.is_empty() {
                relevance_label = label.to_string();
            }
        } else if let Some(value) = line.strip_prefix("- Areas:") {
            areas = value
                .split(',')
                .map(str::trim)
                .filter(|area| !area.is_empty())
                .map(str::to_string)
                .collect();
        } else if line.len() > 4 && line.starts_with("**") && line.ends_with("**") {
            let heading = line.trim_matches('*');
            current = SECTIONS
                .iter()
                .find(|(name, _)| *name == heading)
                .map(|(_, key)| *key);
        } else if let (Some(key), Some(item)) = (current, line.strip_prefix("- ")) {
            sections.entry(key).or_default().push(item.trim().to_string());
        }
    }

    let mut take = |key: SectionKey, cap: usize| -> Vec<String> {
        sections
            .remove(&key)
            .unwrap_or_default()
            .iter()
            .filter(|item| !item.trim().is_empty())
            .take(cap)
            .map(|item| sanitize(item))
            .collect()
    };

    let provider = if header_provider.is_empty() {
        meta.get("provider").cloned().unwrap_or_default()
    } else {
        header_provider.to_string()
    };

    Some(CondensationRecord {
        started_at: started_at.to_string(),
        provider,
        title: sanitize(title),
        file: meta.get("file").cloned().unwrap_or_default(),
        status: meta.get("status").cloned().unwrap_or_default(),
        relevance_label: sanitize(&relevance_label),
        relevance_confidence,
        relevance_reason: sanitize(&relevance_reason),
        areas: areas.iter().take(MAX_AREAS).map(|area| sanitize(area)).collect(),
        highlights: take(SectionKey::Highlights, HIGHLIGHTS_CAP),
        decisions: take(SectionKey::Decisions, DECISIONS_CAP),
        implementation_details: take(SectionKey::ImplementationDetails, IMPLEMENTATION_CAP),
        open_questions: take(SectionKey::OpenQuestions, OPEN_QUESTIONS_CAP),
        security_notes: take(SectionKey::SecurityNotes, SECURITY_CAP),
    })
}
