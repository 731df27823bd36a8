//! Ledger merge use-case service.
//!
//! # Responsibility
//! - Decide, per source item, whether its ledger entry is reused or recomputed.
//! - Drive the collaborator for stale items and persist after every item.
//!
//! # Invariants
//! - Entries are emitted in source discovery order; stale paths are dropped.
//! - An entry is reused only when `status == ok` and the fingerprint matches.
//! - The ledger on disk is always a fully-formed document: each write
//!   replaces the managed body in one atomic rename.
//! - A collaborator failure never aborts the run; it records an `error`
//!   entry that the next run retries.
//! - A source that cannot be read at apply time is skipped with a warning;
//!   it has no entry, so the next run retries it.
//! - Text outside the managed region is preserved byte-for-byte.

use crate::codec::entry::{parse_entries, render_entries, render_entry};
use crate::collaborator::prompt::{build_item_prompt, RepoContext};
use crate::collaborator::{summarize_item, Summarizer};
use crate::config::{JournalPaths, LedgerOptions};
use crate::document::region::{extract, managed_body, Markers, LEDGER_BEGIN, LEDGER_END};
use crate::document::{read_optional, write_atomic, DocumentError};
use crate::fingerprint::{fingerprint_file, fingerprint_text, Fingerprint};
use crate::model::entry::{Entry, EntryStatus};
use crate::model::source_item::{discover_source_files, relative_path, SourceItem};
use crate::model::summary::ItemSummary;
use crate::redact::detect_categories;
use log::{info, warn};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

pub type LedgerResult<T> = Result<T, LedgerError>;

/// Ledger merge failure. Only structural problems surface here.
#[derive(Debug)]
pub enum LedgerError {
    /// Ledger document could not be read, parsed or written.
    Document(DocumentError),
    /// History dir or a source item could not be read while planning.
    Source { path: PathBuf, source: std::io::Error },
}

impl Display for LedgerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Document(err) => write!(f, "{err}"),
            Self::Source { path, source } => {
                write!(f, "cannot read source `{}`: {source}", path.display())
            }
        }
    }
}

impl Error for LedgerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Document(err) => Some(err),
            Self::Source { source, .. } => Some(source),
        }
    }
}

impl From<DocumentError> for LedgerError {
    fn from(value: DocumentError) -> Self {
        Self::Document(value)
    }
}

/// Returns the document used when no ledger exists yet.
pub fn default_ledger_document() -> String {
    format!(
        "# Waylog Sessions\n\nInternal, auto-generated per-session summaries (sanitized).\n\n{LEDGER_BEGIN}\n{LEDGER_END}\n"
    )
}

/// Returns the managed body of the ledger at `path`.
///
/// A missing file yields an empty body; a file without markers is an error.
pub fn read_ledger_body(path: &Path) -> Result<String, DocumentError> {
    match read_optional(path)? {
        Some(text) => extract(&text, Markers::LEDGER)
            .map(|region| region.body.to_string())
            .ok_or_else(|| DocumentError::MissingMarkers {
                path: path.to_path_buf(),
                markers: Markers::LEDGER,
            }),
        None => Ok(String::new()),
    }
}

/// Fingerprint of a ledger managed body, as recorded in the journal.
pub fn ledger_body_fingerprint(body: &str) -> Fingerprint {
    fingerprint_text(body.trim())
}

/// Per-item decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemAction {
    /// Existing entry is current; its block is re-emitted verbatim.
    Keep,
    /// Entry is missing, stale, failed, or recomputation was forced.
    Update,
}

/// One discovered source item with its decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedItem {
    pub path: PathBuf,
    pub rel_path: String,
    pub fingerprint: Fingerprint,
    pub action: ItemAction,
}

/// Result of comparing the history dir against the ledger.
#[derive(Debug, Clone)]
pub struct LedgerPlan {
    ledger_file: PathBuf,
    document: String,
    on_disk: Option<String>,
    existing: BTreeMap<String, Entry>,
    /// Items in discovery order.
    pub items: Vec<PlannedItem>,
}

impl LedgerPlan {
    pub fn to_update(&self) -> impl Iterator<Item = &PlannedItem> {
        self.items
            .iter()
            .filter(|item| item.action == ItemAction::Update)
    }

    pub fn update_count(&self) -> usize {
        self.to_update().count()
    }

    pub fn keep_count(&self) -> usize {
        self.items.len() - self.update_count()
    }

    /// Body fingerprint of the ledger as it is on disk right now.
    pub fn current_body_fingerprint(&self) -> Fingerprint {
        let body = extract(&self.document, Markers::LEDGER)
            .map(|region| region.body)
            .unwrap_or_default();
        ledger_body_fingerprint(body)
    }
}

/// Loads the ledger and decides the action for every source item.
///
/// # Errors
/// - `Document` when an existing ledger lacks its markers.
/// - `Source` when the history dir or a source file cannot be read.
pub fn plan_ledger(paths: &JournalPaths, options: &LedgerOptions) -> LedgerResult<LedgerPlan> {
    let on_disk = read_optional(&paths.ledger_file)?;
    let document = on_disk.clone().unwrap_or_else(default_ledger_document);
    let region =
        extract(&document, Markers::LEDGER).ok_or_else(|| DocumentError::MissingMarkers {
            path: paths.ledger_file.clone(),
            markers: Markers::LEDGER,
        })?;
    let existing = parse_entries(region.body);

    let files = discover_source_files(&paths.history_dir).map_err(|source| LedgerError::Source {
        path: paths.history_dir.clone(),
        source,
    })?;
    let mut items = Vec::with_capacity(files.len());
    for path in files {
        let fingerprint = fingerprint_file(&path).map_err(|source| LedgerError::Source {
            path: path.clone(),
            source,
        })?;
        let rel_path = relative_path(&paths.repo_root, &path);
        let current = existing
            .get(&rel_path)
            .is_some_and(|entry| entry.is_current(&fingerprint));
        let action = if current && !options.force {
            ItemAction::Keep
        } else {
            ItemAction::Update
        };
        items.push(PlannedItem {
            path,
            rel_path,
            fingerprint,
            action,
        });
    }

    info!(
        "event=ledger_plan module=service status=ok items={} update={} existing_entries={} force={}",
        items.len(),
        items
            .iter()
            .filter(|item| item.action == ItemAction::Update)
            .count(),
        existing.len(),
        options.force
    );

    Ok(LedgerPlan {
        ledger_file: paths.ledger_file.clone(),
        document,
        on_disk,
        existing,
        items,
    })
}

/// Progress notification for one recomputed item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemProgress<'a> {
    /// 1-based position among the items being recomputed.
    pub index: usize,
    pub total: usize,
    pub rel_path: &'a str,
}

/// Summary of one merge run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerOutcome {
    pub updated: usize,
    pub failed: usize,
    pub kept: usize,
    /// Items whose source could not be read; none of them has an entry.
    pub skipped: usize,
    /// Run stopped early on request; completed items are already persisted.
    pub interrupted: bool,
    /// Fingerprint of the managed body as last written (or found).
    pub body_fingerprint: Fingerprint,
}

/// Ledger merge engine over a summarizer.
pub struct LedgerService<S: Summarizer> {
    summarizer: S,
    repo_root: PathBuf,
    repo: RepoContext,
    options: LedgerOptions,
}

impl<S: Summarizer> LedgerService<S> {
    pub fn new(summarizer: S, repo_root: &Path, options: LedgerOptions) -> Self {
        Self {
            summarizer,
            repo_root: repo_root.to_path_buf(),
            repo: RepoContext::from_root(repo_root),
            options,
        }
    }

    /// Applies `plan`, without progress reporting.
    pub fn apply(&self, plan: &LedgerPlan, cancel: &AtomicBool) -> LedgerResult<LedgerOutcome> {
        self.apply_with_progress(plan, cancel, |_| {})
    }

    /// Applies `plan`, recomputing stale items in order.
    ///
    /// `cancel` is checked before each item and after each collaborator
    /// call; an item whose call finishes after cancellation is not written.
    pub fn apply_with_progress(
        &self,
        plan: &LedgerPlan,
        cancel: &AtomicBool,
        mut on_item: impl FnMut(ItemProgress<'_>),
    ) -> LedgerResult<LedgerOutcome> {
        let started_at = Instant::now();
        let mut blocks: BTreeMap<&str, String> = plan
            .items
            .iter()
            .filter(|item| item.action == ItemAction::Keep)
            .filter_map(|item| {
                plan.existing
                    .get(&item.rel_path)
                    .map(|entry| (item.rel_path.as_str(), entry.block.clone()))
            })
            .collect();
        let mut writer = LedgerWriter::new(plan);
        let total = plan.update_count();
        let mut outcome = LedgerOutcome {
            updated: 0,
            failed: 0,
            kept: plan.keep_count(),
            skipped: 0,
            interrupted: false,
            body_fingerprint: plan.current_body_fingerprint(),
        };

        for (offset, item) in plan.to_update().enumerate() {
            if cancel.load(Ordering::SeqCst) {
                outcome.interrupted = true;
                break;
            }
            on_item(ItemProgress {
                index: offset + 1,
                total,
                rel_path: &item.rel_path,
            });

            let summarized = self.summarize(item);
            if cancel.load(Ordering::SeqCst) {
                outcome.interrupted = true;
                break;
            }
            let Some((block, status)) = summarized else {
                outcome.skipped += 1;
                continue;
            };
            blocks.insert(item.rel_path.as_str(), block);
            outcome.updated += 1;
            if status == EntryStatus::Error {
                outcome.failed += 1;
            }
            outcome.body_fingerprint = writer.write(plan, &blocks)?;
        }

        if !outcome.interrupted && !writer.in_sync(plan, &blocks) {
            outcome.body_fingerprint = writer.write(plan, &blocks)?;
        }

        info!(
            "event=ledger_merge module=service status={} updated={} failed={} kept={} skipped={} duration_ms={}",
            if outcome.interrupted { "interrupted" } else { "ok" },
            outcome.updated,
            outcome.failed,
            outcome.kept,
            outcome.skipped,
            started_at.elapsed().as_millis()
        );
        Ok(outcome)
    }

    /// Renders the entry block for `item`; `None` when its source is unreadable.
    fn summarize(&self, item: &PlannedItem) -> Option<(String, EntryStatus)> {
        let source = match SourceItem::load(&self.repo_root, &item.path, self.options.max_chars) {
            Ok(source) => source,
            Err(err) => {
                warn!(
                    "event=item_load module=service status=skipped rel_path={} error={err}",
                    item.rel_path
                );
                return None;
            }
        };
        let categories = detect_categories(&source.raw);
        let prompt = build_item_prompt(&self.repo, &source, &categories);

        let started_at = Instant::now();
        let (summary, status) = match summarize_item(&self.summarizer, &prompt) {
            Ok(summary) => {
                info!(
                    "event=item_summary module=service status=ok rel_path={} duration_ms={}",
                    item.rel_path,
                    started_at.elapsed().as_millis()
                );
                (summary, EntryStatus::Ok)
            }
            Err(err) => {
                warn!(
                    "event=item_summary module=service status=error rel_path={} error={err}",
                    item.rel_path
                );
                (ItemSummary::fallback(), EntryStatus::Error)
            }
        };
        let block = render_entry(
            &source,
            &item.fingerprint,
            &summary,
            status,
            &self.options.provenance,
        );
        Some((block, status))
    }
}

/// Renders and persists the ledger document around a fixed prefix/suffix.
struct LedgerWriter {
    last_written: Option<String>,
}

impl LedgerWriter {
    fn new(plan: &LedgerPlan) -> Self {
        Self {
            last_written: plan.on_disk.clone(),
        }
    }

    fn render(plan: &LedgerPlan, blocks: &BTreeMap<&str, String>) -> String {
        let ordered = plan
            .items
            .iter()
            .filter_map(|item| blocks.get(item.rel_path.as_str()))
            .map(String::as_str);
        let body = managed_body(&render_entries(ordered));
        match extract(&plan.document, Markers::LEDGER) {
            Some(region) => region.render_with_body(&body),
            None => plan.document.clone(),
        }
    }

    /// Whether the file already holds what `blocks` render to. A missing
    /// ledger with nothing to record counts as in sync.
    fn in_sync(&self, plan: &LedgerPlan, blocks: &BTreeMap<&str, String>) -> bool {
        match self.last_written.as_deref() {
            Some(text) => text == with_trailing_newline(&Self::render(plan, blocks)),
            None => plan.items.is_empty(),
        }
    }

    fn write(
        &mut self,
        plan: &LedgerPlan,
        blocks: &BTreeMap<&str, String>,
    ) -> LedgerResult<Fingerprint> {
        let document = with_trailing_newline(&Self::render(plan, blocks));
        write_atomic(&plan.ledger_file, &document)?;
        let body = extract(&document, Markers::LEDGER)
            .map(|region| region.body)
            .unwrap_or_default();
        let fingerprint = ledger_body_fingerprint(body);
        self.last_written = Some(document);
        Ok(fingerprint)
    }
}

fn with_trailing_newline(text: &str) -> String {
    format!("{}\n", text.trim_end_matches('\n'))
}

#[cfg(test)]
mod tests {
    use super::{default_ledger_document, ledger_body_fingerprint, read_ledger_body};
    use crate::document::region::{extract, Markers};
    use crate::document::DocumentError;

    #[test]
    fn default_document_has_empty_managed_region() {
        let doc = default_ledger_document();
        let region = extract(&doc, Markers::LEDGER).expect("markers");
        assert_eq!(region.body, "\n");
        assert!(region.prefix.starts_with("# Waylog Sessions\n"));
        assert_eq!(region.suffix, "\n");
    }

    #[test]
    fn body_fingerprint_ignores_framing_whitespace() {
        assert_eq!(
            ledger_body_fingerprint("\nblock\n"),
            ledger_body_fingerprint("block")
        );
    }

    #[test]
    fn ledger_body_requires_markers_when_file_exists() {
        let dir = tempfile::tempdir().expect("temp dir");
        let missing = dir.path().join("missing.md");
        assert_eq!(read_ledger_body(&missing).expect("absent is empty"), "");

        let broken = dir.path().join("broken.md");
        std::fs::write(&broken, "# no markers here\n").expect("write");
        let err = read_ledger_body(&broken).expect_err("markers required");
        assert!(matches!(err, DocumentError::MissingMarkers { .. }));
    }
}
