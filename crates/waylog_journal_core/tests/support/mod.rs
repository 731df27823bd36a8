#![allow(dead_code)]

use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use waylog_journal_core::{
    CollaboratorError, CollaboratorRequest, CollaboratorResult, JournalPaths, PathOverrides,
    Summarizer,
};

/// Repository layout under a temp dir: `<root>/.waylog/history`.
pub struct Fixture {
    _dir: TempDir,
    pub root: PathBuf,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("demo-repo");
        std::fs::create_dir_all(root.join(".waylog/history")).unwrap();
        Self { _dir: dir, root }
    }

    pub fn paths(&self) -> JournalPaths {
        JournalPaths::resolve(&self.root, &PathOverrides::default())
    }

    pub fn write_transcript(&self, name: &str, title: &str, body: &str) -> PathBuf {
        let path = self.root.join(".waylog/history").join(name);
        let text = format!(
            "---\nprovider: claude\nupdated_at: 2025-01-02T03:04:05Z\nmessage_count: 4\n---\n# {title}\n\n{body}\n"
        );
        std::fs::write(&path, text).unwrap();
        path
    }

    pub fn remove_transcript(&self, name: &str) {
        std::fs::remove_file(self.root.join(".waylog/history").join(name)).unwrap();
    }

    pub fn ledger_text(&self) -> String {
        std::fs::read_to_string(self.paths().ledger_file).unwrap()
    }

    pub fn journal_text(&self) -> String {
        std::fs::read_to_string(self.paths().journal_file).unwrap()
    }
}

/// Deterministic in-process summarizer.
///
/// Item responses are keyed by the `- file:` line of the prompt; journal
/// responses list the files found in the condensation payload.
#[derive(Default)]
pub struct ScriptedSummarizer {
    calls: Mutex<Vec<String>>,
    failing: Mutex<BTreeSet<String>>,
    fail_journal: AtomicBool,
    cancel_after: Mutex<Option<(usize, Arc<AtomicBool>)>>,
    extra_text: Mutex<Option<String>>,
}

pub const JOURNAL_CALL: &str = "<journal>";

impl ScriptedSummarizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_item(&self, rel_path: &str) {
        self.failing.lock().unwrap().insert(rel_path.to_string());
    }

    pub fn recover_item(&self, rel_path: &str) {
        self.failing.lock().unwrap().remove(rel_path);
    }

    pub fn fail_journal(&self, fail: bool) {
        self.fail_journal.store(fail, Ordering::SeqCst);
    }

    /// Raises `flag` once `calls` collaborator calls have completed.
    pub fn cancel_after(&self, calls: usize, flag: Arc<AtomicBool>) {
        *self.cancel_after.lock().unwrap() = Some((calls, flag));
    }

    /// Appends `text` as one more highlight and one more journal line.
    pub fn append_text(&self, text: &str) {
        *self.extra_text.lock().unwrap() = Some(text.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn reset_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn record(&self, call: String) {
        let mut calls = self.calls.lock().unwrap();
        calls.push(call);
        if let Some((limit, flag)) = self.cancel_after.lock().unwrap().as_ref() {
            if calls.len() >= *limit {
                flag.store(true, Ordering::SeqCst);
            }
        }
    }
}

impl Summarizer for ScriptedSummarizer {
    fn complete(&self, request: &CollaboratorRequest<'_>) -> CollaboratorResult<Value> {
        let extra = self.extra_text.lock().unwrap().clone();
        let is_journal = request.schema["properties"].get("journal_markdown").is_some();
        if is_journal {
            self.record(JOURNAL_CALL.to_string());
            if self.fail_journal.load(Ordering::SeqCst) {
                return Err(CollaboratorError::NonZeroExit {
                    code: Some(1),
                    stderr: "journal backend down".to_string(),
                });
            }
            let mut journal = journal_for(request.prompt);
            if let Some(extra) = &extra {
                journal.push_str(&format!("- {extra}\n"));
            }
            return Ok(json!({ "journal_markdown": journal }));
        }

        let file = request
            .prompt
            .lines()
            .find_map(|line| line.strip_prefix("- file: "))
            .unwrap_or_default()
            .to_string();
        self.record(file.clone());
        if self.failing.lock().unwrap().contains(&file) {
            return Err(CollaboratorError::InvalidJson("no object in output".to_string()));
        }
        let mut highlights = vec![format!("Worked on {file}")];
        highlights.extend(extra);
        Ok(json!({
            "project_relevance": {
                "label": "related",
                "confidence": 0.9,
                "reason": "touches the repo",
                "touched_areas": ["cli"]
            },
            "highlights": highlights,
            "decisions": ["Keep it incremental"],
            "implementation_details": [],
            "open_questions": [],
            "security_notes": []
        }))
    }
}

fn journal_for(prompt: &str) -> String {
    let payload = prompt
        .lines()
        .skip_while(|line| !line.starts_with("Per-session summaries"))
        .nth(1)
        .unwrap_or("[]");
    let records: Vec<Value> = serde_json::from_str(payload).unwrap_or_default();
    let mut out = String::from("## 2025-01-02\n");
    for record in records {
        out.push_str(&format!("- [cli] {}\n", record["file"].as_str().unwrap_or("?")));
    }
    out
}

pub fn history_rel(name: &str) -> String {
    format!(".waylog/history/{name}")
}
