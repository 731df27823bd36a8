//! Core domain logic for waylog journal.
//! Incremental, resumable merge of chat transcripts into a summary ledger
//! and a condensed journal.

pub mod codec;
pub mod collaborator;
pub mod config;
pub mod document;
pub mod fingerprint;
pub mod logging;
pub mod model;
pub mod redact;
pub mod service;

pub use collaborator::codex::{CodexCollaborator, CodexConfig, HistoryPersistence, McpMode};
pub use collaborator::{CollaboratorError, CollaboratorRequest, CollaboratorResult, Summarizer};
pub use config::{JournalOptions, JournalPaths, LedgerOptions, PathOverrides};
pub use document::{DocumentError, DocumentResult};
pub use fingerprint::Fingerprint;
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::entry::{EntryStatus, Provenance};
pub use service::journal_service::{
    check_journal, JournalCheck, JournalError, JournalOutcome, JournalService,
};
pub use service::ledger_service::{
    plan_ledger, ItemAction, ItemProgress, LedgerError, LedgerOutcome, LedgerPlan, LedgerService,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
