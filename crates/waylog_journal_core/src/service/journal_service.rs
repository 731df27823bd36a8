//! Journal condensation use-case service.
//!
//! # Responsibility
//! - Decide whether the journal is stale relative to the ledger.
//! - Condense ledger entries into journal prose via the collaborator.
//! - Rewrite only the journal's managed region, keeping manual notes.
//!
//! # Invariants
//! - Regeneration happens iff the recorded ledger fingerprint differs from
//!   the current one, or it is forced.
//! - Condensation input follows ledger order; entries without a parseable
//!   header are skipped.
//! - The manual-notes region survives regeneration byte-for-byte.
//! - The recorded ledger fingerprint is read from the managed region only.
//! - A collaborator failure here is fatal to the journal step only; the
//!   journal file is left untouched.

use super::ledger_service::{ledger_body_fingerprint, read_ledger_body};
use crate::codec::condense::{parse_block_for_condensation, CondensationRecord};
use crate::codec::entry::scan_entries;
use crate::collaborator::prompt::build_journal_prompt;
use crate::collaborator::{condense_journal, CollaboratorError, Summarizer};
use crate::config::JournalOptions;
use crate::document::region::{
    extract, extract_manual_notes, managed_body, neutralize_markers, reinsert_manual_notes,
    Markers, JOURNAL_BEGIN, JOURNAL_END, MANUAL_BEGIN, MANUAL_END,
};
use crate::document::{read_optional, write_atomic, DocumentError};
use crate::fingerprint::Fingerprint;
use crate::redact::sanitize;
use log::{error, info};
use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;
use std::time::Instant;

static JOURNAL_META_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^<!--\s*waylog-journal-meta:\s*sessions_sha256=(?P<sha256>[0-9a-f]{64})\s*-->$")
        .expect("valid journal meta regex")
});

pub type JournalResult<T> = Result<T, JournalError>;

/// Journal step failure.
#[derive(Debug)]
pub enum JournalError {
    /// Ledger or journal document could not be read, parsed or written.
    Document(DocumentError),
    /// Collaborator call or decoding failed.
    Collaborator(CollaboratorError),
    /// Condensation payload could not be serialized.
    Payload(serde_json::Error),
}

impl Display for JournalError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Document(err) => write!(f, "{err}"),
            Self::Collaborator(err) => write!(f, "journal generation failed: {err}"),
            Self::Payload(err) => write!(f, "cannot encode journal input: {err}"),
        }
    }
}

impl Error for JournalError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Document(err) => Some(err),
            Self::Collaborator(err) => Some(err),
            Self::Payload(err) => Some(err),
        }
    }
}

impl From<DocumentError> for JournalError {
    fn from(value: DocumentError) -> Self {
        Self::Document(value)
    }
}

impl From<CollaboratorError> for JournalError {
    fn from(value: CollaboratorError) -> Self {
        Self::Collaborator(value)
    }
}

impl From<serde_json::Error> for JournalError {
    fn from(value: serde_json::Error) -> Self {
        Self::Payload(value)
    }
}

/// Returns the document used when no journal exists yet.
pub fn default_journal_document() -> String {
    format!(
        "# Waylog Summary\n\nCondensed journal of project decisions and implementation evolution (sanitized).\n\n{JOURNAL_BEGIN}\n{JOURNAL_END}\n\n## Manual Notes\n{MANUAL_BEGIN}\n{MANUAL_END}\n"
    )
}

/// Reads the ledger fingerprint recorded in the journal's managed region.
pub fn recorded_fingerprint(journal: &str) -> Option<String> {
    let region = extract(journal, Markers::JOURNAL)?;
    JOURNAL_META_RE
        .captures(region.body)
        .and_then(|caps| caps.name("sha256"))
        .map(|m| m.as_str().to_string())
}

/// Formats the journal metadata comment for `fingerprint`.
pub fn journal_meta_line(fingerprint: &Fingerprint) -> String {
    format!("<!-- waylog-journal-meta: sessions_sha256={fingerprint} -->")
}

/// Staleness verdict for the journal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalCheck {
    pub ledger_fingerprint: Fingerprint,
    pub recorded: Option<String>,
    pub needs_regeneration: bool,
}

/// Compares the current ledger body against the journal's recorded value.
pub fn check_journal(
    ledger_file: &Path,
    journal_file: &Path,
    force: bool,
) -> JournalResult<JournalCheck> {
    let body = read_ledger_body(ledger_file)?;
    let ledger_fingerprint = ledger_body_fingerprint(&body);
    let recorded = read_optional(journal_file)?
        .as_deref()
        .and_then(recorded_fingerprint);
    let unchanged = recorded
        .as_deref()
        .is_some_and(|value| ledger_fingerprint.matches(value));
    Ok(JournalCheck {
        needs_regeneration: force || !unchanged,
        ledger_fingerprint,
        recorded,
    })
}

/// Renders the journal document for `prose`.
///
/// `previous` is updated in place when given; otherwise the default template
/// is filled. Manual notes from `previous` are copied forward verbatim.
pub fn render_journal(
    journal_file: &Path,
    previous: Option<&str>,
    prose: &str,
    fingerprint: &Fingerprint,
) -> JournalResult<String> {
    let template = default_journal_document();
    let base = previous.unwrap_or(&template);
    let region =
        extract(base, Markers::JOURNAL).ok_or_else(|| DocumentError::MissingMarkers {
            path: journal_file.to_path_buf(),
            markers: Markers::JOURNAL,
        })?;

    let mut content = journal_meta_line(fingerprint);
    let prose = neutralize_markers(prose.trim());
    if !prose.is_empty() {
        content.push('\n');
        content.push_str(&prose);
    }
    let rendered = region.render_with_body(&managed_body(&content));
    Ok(match previous.and_then(extract_manual_notes) {
        Some(notes) => reinsert_manual_notes(&rendered, notes),
        None => rendered,
    })
}

/// Collects condensation records from a ledger body, in ledger order.
pub fn condensation_records(ledger_body: &str) -> Vec<CondensationRecord> {
    scan_entries(ledger_body)
        .iter()
        .filter_map(|entry| parse_block_for_condensation(&entry.block))
        .collect()
}

/// Result of one journal step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JournalOutcome {
    /// Journal rewritten for this ledger fingerprint.
    Regenerated { fingerprint: Fingerprint, entries: usize },
    /// Journal already matched this ledger fingerprint.
    UpToDate { fingerprint: Fingerprint },
}

/// Journal condensation driver over a summarizer.
pub struct JournalService<S: Summarizer> {
    summarizer: S,
    options: JournalOptions,
}

impl<S: Summarizer> JournalService<S> {
    pub fn new(summarizer: S, options: JournalOptions) -> Self {
        Self {
            summarizer,
            options,
        }
    }

    /// Regenerates the journal when stale (or forced).
    ///
    /// # Errors
    /// - `Document` when either document lacks its markers or IO fails.
    /// - `Collaborator` when the condensation call fails; nothing is written.
    pub fn run(&self, ledger_file: &Path, journal_file: &Path) -> JournalResult<JournalOutcome> {
        let started_at = Instant::now();
        let check = check_journal(ledger_file, journal_file, self.options.force)?;
        if !check.needs_regeneration {
            info!(
                "event=journal_check module=service status=up_to_date sessions_sha256={}",
                check.ledger_fingerprint
            );
            return Ok(JournalOutcome::UpToDate {
                fingerprint: check.ledger_fingerprint,
            });
        }

        let previous = read_optional(journal_file)?;
        if let Some(text) = previous.as_deref() {
            if extract(text, Markers::JOURNAL).is_none() {
                return Err(DocumentError::MissingMarkers {
                    path: journal_file.to_path_buf(),
                    markers: Markers::JOURNAL,
                }
                .into());
            }
        }

        let body = read_ledger_body(ledger_file)?;
        let records = condensation_records(&body);
        let prompt = build_journal_prompt(&self.options.repo_name, &records)?;
        let prose = condense_journal(&self.summarizer, &prompt).map_err(|err| {
            error!("event=journal_generate module=service status=error error={err}");
            err
        })?;

        let document = render_journal(
            journal_file,
            previous.as_deref(),
            &sanitize(&prose),
            &check.ledger_fingerprint,
        )?;
        write_atomic(journal_file, &document)?;
        info!(
            "event=journal_generate module=service status=ok entries={} sessions_sha256={} duration_ms={}",
            records.len(),
            check.ledger_fingerprint,
            started_at.elapsed().as_millis()
        );
        Ok(JournalOutcome::Regenerated {
            fingerprint: check.ledger_fingerprint,
            entries: records.len(),
        })
    }
}
