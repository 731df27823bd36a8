//! Run configuration: file locations and engine options.
//!
//! # Responsibility
//! - Resolve the repository root, history dir and document paths.
//! - Hold explicit per-run options for the ledger and journal services.
//!
//! # Invariants
//! - Resolution only inspects the filesystem; it never creates anything.

use crate::model::entry::Provenance;
use std::path::{Path, PathBuf};

/// Default transcript character budget per collaborator prompt.
pub const DEFAULT_MAX_CHARS: usize = 200_000;

const HISTORY_PARENT_DIR: &str = ".waylog";
const HISTORY_DIR: &str = "history";
const OUTPUT_DIR: &str = ".waylog-journal";
const LEDGER_FILE_NAME: &str = "sessions.md";
const JOURNAL_FILE_NAME: &str = "summary.md";

/// Locations used by one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalPaths {
    pub repo_root: PathBuf,
    pub history_dir: PathBuf,
    pub ledger_file: PathBuf,
    pub journal_file: PathBuf,
}

/// Optional path overrides, usually from the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathOverrides {
    pub history_dir: Option<PathBuf>,
    pub ledger_file: Option<PathBuf>,
    pub journal_file: Option<PathBuf>,
}

impl JournalPaths {
    /// Resolves paths starting from `cwd`.
    ///
    /// Root selection:
    /// - an explicit `.../.waylog/history` dir implies its grandparent;
    /// - otherwise the nearest ancestor containing `.waylog/history`;
    /// - otherwise the nearest ancestor containing `.git`;
    /// - otherwise `cwd`.
    pub fn resolve(cwd: &Path, overrides: &PathOverrides) -> Self {
        let (repo_root, history_dir) = match overrides.history_dir.as_deref() {
            Some(history_dir) => {
                let root = implied_root(history_dir)
                    .or_else(|| find_git_root(cwd))
                    .unwrap_or_else(|| cwd.to_path_buf());
                (root, history_dir.to_path_buf())
            }
            None => {
                let root = find_history_root(cwd)
                    .or_else(|| find_git_root(cwd))
                    .unwrap_or_else(|| cwd.to_path_buf());
                let history_dir = root.join(HISTORY_PARENT_DIR).join(HISTORY_DIR);
                (root, history_dir)
            }
        };

        let output_dir = repo_root.join(OUTPUT_DIR);
        Self {
            ledger_file: overrides
                .ledger_file
                .clone()
                .unwrap_or_else(|| output_dir.join(LEDGER_FILE_NAME)),
            journal_file: overrides
                .journal_file
                .clone()
                .unwrap_or_else(|| output_dir.join(JOURNAL_FILE_NAME)),
            repo_root,
            history_dir,
        }
    }
}

/// Options for one ledger merge run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerOptions {
    /// Recompute every entry regardless of fingerprints.
    pub force: bool,
    /// Transcript tail budget; `None` disables truncation.
    pub max_chars: Option<usize>,
    pub provenance: Provenance,
}

impl Default for LedgerOptions {
    fn default() -> Self {
        Self {
            force: false,
            max_chars: Some(DEFAULT_MAX_CHARS),
            provenance: Provenance::default(),
        }
    }
}

/// Options for one journal condensation run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JournalOptions {
    /// Regenerate even when the ledger fingerprint is unchanged.
    pub force: bool,
    pub repo_name: String,
}

fn implied_root(history_dir: &Path) -> Option<PathBuf> {
    let parent = history_dir.parent()?;
    let is_history = history_dir.file_name().is_some_and(|name| name == HISTORY_DIR)
        && parent
            .file_name()
            .is_some_and(|name| name == HISTORY_PARENT_DIR);
    if is_history {
        parent.parent().map(Path::to_path_buf)
    } else {
        None
    }
}

fn find_history_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|candidate| candidate.join(HISTORY_PARENT_DIR).join(HISTORY_DIR).is_dir())
        .map(Path::to_path_buf)
}

fn find_git_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|candidate| candidate.join(".git").exists())
        .map(Path::to_path_buf)
}

#[cfg(test)]
mod tests {
    use super::{JournalPaths, PathOverrides};
    use std::path::PathBuf;

    #[test]
    fn history_root_is_found_from_nested_dir() {
        let dir = tempfile::tempdir().expect("temp dir");
        let root = dir.path().join("repo");
        std::fs::create_dir_all(root.join(".waylog/history")).expect("history dir");
        std::fs::create_dir_all(root.join("src/deep")).expect("nested dir");

        let paths = JournalPaths::resolve(&root.join("src/deep"), &PathOverrides::default());
        assert_eq!(paths.repo_root, root);
        assert_eq!(paths.history_dir, root.join(".waylog/history"));
        assert_eq!(paths.ledger_file, root.join(".waylog-journal/sessions.md"));
        assert_eq!(paths.journal_file, root.join(".waylog-journal/summary.md"));
    }

    #[test]
    fn explicit_history_dir_implies_root() {
        let overrides = PathOverrides {
            history_dir: Some(PathBuf::from("/work/app/.waylog/history")),
            ledger_file: Some(PathBuf::from("/tmp/ledger.md")),
            journal_file: None,
        };
        let paths = JournalPaths::resolve(&PathBuf::from("/elsewhere"), &overrides);
        assert_eq!(paths.repo_root, PathBuf::from("/work/app"));
        assert_eq!(paths.ledger_file, PathBuf::from("/tmp/ledger.md"));
        assert_eq!(
            paths.journal_file,
            PathBuf::from("/work/app/.waylog-journal/summary.md")
        );
    }

    #[test]
    fn fallback_root_is_cwd() {
        let dir = tempfile::tempdir().expect("temp dir");
        let paths = JournalPaths::resolve(dir.path(), &PathOverrides::default());
        assert_eq!(paths.repo_root, dir.path());
    }
}
