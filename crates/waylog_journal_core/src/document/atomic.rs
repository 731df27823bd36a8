//! Crash-safe single-file replacement.
//!
//! # Invariants
//! - Content lands in a temp file in the target directory, then one rename.
//! - Written content ends with exactly one trailing `\n`.
//! - A failure before the rename leaves the previous file intact.

use super::{DocumentError, DocumentResult};
use log::{debug, error};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Atomically replaces `path` with `content`.
///
/// Parent directories are created when missing.
pub fn write_atomic(path: &Path, content: &str) -> DocumentResult<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent).map_err(|err| DocumentError::io(parent, err))?;

    let normalized = with_single_trailing_newline(content);
    let mut tmp = NamedTempFile::new_in(parent).map_err(|err| DocumentError::io(parent, err))?;
    tmp.write_all(normalized.as_bytes())
        .and_then(|()| tmp.as_file().sync_all())
        .map_err(|err| DocumentError::io(tmp.path(), err))?;

    match tmp.persist(path) {
        Ok(_) => {
            debug!(
                "event=atomic_write module=document status=ok bytes={} path={}",
                normalized.len(),
                path.display()
            );
            Ok(())
        }
        Err(err) => {
            error!(
                "event=atomic_write module=document status=error path={} error={}",
                path.display(),
                err.error
            );
            Err(DocumentError::io(path, err.error))
        }
    }
}

fn with_single_trailing_newline(content: &str) -> String {
    let trimmed = content.trim_end_matches(['\n', '\r']);
    let mut out = String::with_capacity(trimmed.len() + 1);
    out.push_str(trimmed);
    out.push('\n');
    out
}
