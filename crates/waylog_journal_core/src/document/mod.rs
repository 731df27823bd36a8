//! Markdown document plumbing shared by the ledger and the journal.
//!
//! # Responsibility
//! - Locate machine-managed regions inside human-owned documents.
//! - Read and atomically replace document files.
//!
//! # Invariants
//! - Text outside managed regions is never rewritten.
//! - A document whose markers are missing is never auto-repaired.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

mod atomic;
pub mod region;

pub use atomic::write_atomic;
pub use region::{Markers, Region};

pub type DocumentResult<T> = Result<T, DocumentError>;

/// Document-level failure.
#[derive(Debug)]
pub enum DocumentError {
    /// Filesystem failure at `path`.
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Existing document lacks a valid `begin ... end` marker pair.
    MissingMarkers { path: PathBuf, markers: Markers },
}

impl DocumentError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl Display for DocumentError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "{}: {source}", path.display()),
            Self::MissingMarkers { path, markers } => write!(
                f,
                "{} exists but is missing managed markers `{}` / `{}`; refusing to overwrite",
                path.display(),
                markers.begin,
                markers.end
            ),
        }
    }
}

impl Error for DocumentError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::MissingMarkers { .. } => None,
        }
    }
}

/// Reads a document as text, replacing invalid UTF-8.
///
/// Returns `None` when the file does not exist.
pub fn read_optional(path: &Path) -> DocumentResult<Option<String>> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(DocumentError::io(path, err)),
    }
}
