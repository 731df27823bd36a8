//! Ledger entry model.
//!
//! # Responsibility
//! - Describe the durable per-item record kept in the ledger.
//!
//! # Invariants
//! - `fingerprint` equals the digest of the source content that produced the
//!   block, unless `status == Error`, in which case the entry is always
//!   eligible for retry.
//! - `block` is the verbatim rendered text; kept entries are re-emitted as-is.

use crate::fingerprint::Fingerprint;
use std::fmt::{Display, Formatter};

/// Processing outcome recorded for one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryStatus {
    Ok,
    Error,
}

impl EntryStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Error => "error",
        }
    }

    /// Parses a recorded status. Anything but `ok` is retried, so unknown
    /// values map to `Error`.
    pub fn parse(value: &str) -> Self {
        if value == "ok" {
            Self::Ok
        } else {
            Self::Error
        }
    }
}

impl Display for EntryStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Collaborator settings recorded alongside a generated entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Provenance {
    pub model: Option<String>,
    pub reasoning_effort: Option<String>,
}

/// One parsed ledger entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub rel_path: String,
    /// Recorded digest text; not validated, so malformed values never match.
    pub fingerprint: String,
    pub updated_at: String,
    pub status: EntryStatus,
    pub block: String,
}

impl Entry {
    /// Whether this entry can be reused for a source with `fingerprint`.
    pub fn is_current(&self, fingerprint: &Fingerprint) -> bool {
        self.status == EntryStatus::Ok && fingerprint.matches(&self.fingerprint)
    }
}
