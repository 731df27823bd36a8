mod support;

use std::sync::atomic::AtomicBool;
use support::{history_rel, Fixture, ScriptedSummarizer, JOURNAL_CALL};
use waylog_journal_core::document::region::{extract, extract_manual_notes, Markers};
use waylog_journal_core::document::DocumentError;
use waylog_journal_core::fingerprint::fingerprint_text;
use waylog_journal_core::service::journal_service::recorded_fingerprint;
use waylog_journal_core::{
    check_journal, plan_ledger, JournalError, JournalOptions, JournalOutcome, JournalService,
    LedgerOptions, LedgerService,
};

fn merge(fx: &Fixture, summarizer: &ScriptedSummarizer) {
    let paths = fx.paths();
    let plan = plan_ledger(&paths, &LedgerOptions::default()).unwrap();
    LedgerService::new(summarizer, &paths.repo_root, LedgerOptions::default())
        .apply(&plan, &AtomicBool::new(false))
        .unwrap();
}

fn condense(
    fx: &Fixture,
    summarizer: &ScriptedSummarizer,
    force: bool,
) -> Result<JournalOutcome, JournalError> {
    let paths = fx.paths();
    let options = JournalOptions {
        force,
        repo_name: "demo-repo".to_string(),
    };
    JournalService::new(summarizer, options).run(&paths.ledger_file, &paths.journal_file)
}

fn ledger_fingerprint_hex(fx: &Fixture) -> String {
    let text = fx.ledger_text();
    let body = extract(&text, Markers::LEDGER).unwrap().body;
    fingerprint_text(body.trim()).to_hex()
}

#[test]
fn end_to_end_three_items() {
    let fx = Fixture::new();
    fx.write_transcript("a.md", "Alpha", "first");
    fx.write_transcript("b.md", "Beta", "second");
    fx.write_transcript("c.md", "Gamma", "third");
    let summarizer = ScriptedSummarizer::new();

    merge(&fx, &summarizer);
    let outcome = condense(&fx, &summarizer, false).unwrap();
    assert!(matches!(outcome, JournalOutcome::Regenerated { entries: 3, .. }));
    assert_eq!(
        summarizer.calls(),
        vec![
            history_rel("a.md"),
            history_rel("b.md"),
            history_rel("c.md"),
            JOURNAL_CALL.to_string()
        ]
    );

    let journal = fx.journal_text();
    assert_eq!(
        recorded_fingerprint(&journal),
        Some(ledger_fingerprint_hex(&fx))
    );
    assert!(journal.starts_with("# Waylog Summary\n"));
    let prose = extract(&journal, Markers::JOURNAL).unwrap().body;
    let a = prose.find(".waylog/history/a.md").unwrap();
    let b = prose.find(".waylog/history/b.md").unwrap();
    let c = prose.find(".waylog/history/c.md").unwrap();
    assert!(a < b && b < c);

    summarizer.reset_calls();
    let ledger_before = fx.ledger_text();
    merge(&fx, &summarizer);
    let outcome = condense(&fx, &summarizer, false).unwrap();
    assert!(matches!(outcome, JournalOutcome::UpToDate { .. }));
    assert!(summarizer.calls().is_empty());
    assert_eq!(fx.ledger_text(), ledger_before);
    assert_eq!(fx.journal_text(), journal);
}

#[test]
fn ledger_change_marks_the_journal_stale() {
    let fx = Fixture::new();
    fx.write_transcript("a.md", "Alpha", "first");
    let summarizer = ScriptedSummarizer::new();
    merge(&fx, &summarizer);
    condense(&fx, &summarizer, false).unwrap();
    let paths = fx.paths();
    assert!(
        !check_journal(&paths.ledger_file, &paths.journal_file, false)
            .unwrap()
            .needs_regeneration
    );

    fx.write_transcript("b.md", "Beta", "second");
    merge(&fx, &summarizer);
    let check = check_journal(&paths.ledger_file, &paths.journal_file, false).unwrap();
    assert!(check.needs_regeneration);
    assert_ne!(check.recorded, Some(check.ledger_fingerprint.to_hex()));
}

#[test]
fn forced_regeneration_keeps_manual_notes_verbatim() {
    let fx = Fixture::new();
    fx.write_transcript("a.md", "Alpha", "first");
    let summarizer = ScriptedSummarizer::new();
    merge(&fx, &summarizer);
    condense(&fx, &summarizer, false).unwrap();

    let paths = fx.paths();
    let notes = "\n- ask infra about quotas\n\n  > indented quote\n";
    let edited = fx.journal_text().replace(
        &format!("{}\n{}", Markers::MANUAL.begin, Markers::MANUAL.end),
        &format!("{}{notes}{}", Markers::MANUAL.begin, Markers::MANUAL.end),
    );
    std::fs::write(&paths.journal_file, &edited).unwrap();
    summarizer.reset_calls();

    let outcome = condense(&fx, &summarizer, true).unwrap();
    assert!(matches!(outcome, JournalOutcome::Regenerated { .. }));
    assert_eq!(summarizer.calls(), vec![JOURNAL_CALL.to_string()]);
    let journal = fx.journal_text();
    assert_eq!(extract_manual_notes(&journal), Some(notes));
    assert_eq!(
        recorded_fingerprint(&journal),
        Some(ledger_fingerprint_hex(&fx))
    );
}

#[test]
fn journal_without_markers_fails_before_calling_the_collaborator() {
    let fx = Fixture::new();
    fx.write_transcript("a.md", "Alpha", "first");
    let summarizer = ScriptedSummarizer::new();
    merge(&fx, &summarizer);
    summarizer.reset_calls();

    let paths = fx.paths();
    std::fs::write(&paths.journal_file, "# handwritten journal\n").unwrap();
    let err = condense(&fx, &summarizer, false).unwrap_err();
    assert!(matches!(
        err,
        JournalError::Document(DocumentError::MissingMarkers { .. })
    ));
    assert!(summarizer.calls().is_empty());
    assert_eq!(fx.journal_text(), "# handwritten journal\n");
}

#[test]
fn collaborator_failure_leaves_the_journal_untouched() {
    let fx = Fixture::new();
    fx.write_transcript("a.md", "Alpha", "first");
    let summarizer = ScriptedSummarizer::new();
    merge(&fx, &summarizer);
    condense(&fx, &summarizer, false).unwrap();
    let before = fx.journal_text();

    fx.write_transcript("b.md", "Beta", "second");
    merge(&fx, &summarizer);
    summarizer.fail_journal(true);
    let err = condense(&fx, &summarizer, false).unwrap_err();
    assert!(matches!(err, JournalError::Collaborator(_)));
    assert_eq!(fx.journal_text(), before);
}

#[test]
fn failed_entries_are_still_condensed_with_their_status() {
    let fx = Fixture::new();
    fx.write_transcript("a.md", "Alpha", "first");
    let summarizer = ScriptedSummarizer::new();
    summarizer.fail_item(&history_rel("a.md"));
    merge(&fx, &summarizer);

    let outcome = condense(&fx, &summarizer, false).unwrap();
    assert!(matches!(outcome, JournalOutcome::Regenerated { entries: 1, .. }));
    assert!(fx.journal_text().contains(".waylog/history/a.md"));
}

#[test]
fn marker_text_in_journal_prose_stays_inside_the_region() {
    let fx = Fixture::new();
    fx.write_transcript("a.md", "Alpha", "first");
    let summarizer = ScriptedSummarizer::new();
    merge(&fx, &summarizer);
    summarizer.append_text(&format!(
        "closing {} early, then {}",
        Markers::JOURNAL.end,
        Markers::MANUAL.begin
    ));

    condense(&fx, &summarizer, false).unwrap();
    let journal = fx.journal_text();
    assert_eq!(extract_manual_notes(&journal), Some("\n"));
    assert_eq!(
        recorded_fingerprint(&journal),
        Some(ledger_fingerprint_hex(&fx))
    );
    assert!(extract(&journal, Markers::JOURNAL)
        .unwrap()
        .body
        .contains("closing &lt;!-- waylog-journal:end --> early"));

    summarizer.reset_calls();
    let outcome = condense(&fx, &summarizer, false).unwrap();
    assert!(matches!(outcome, JournalOutcome::UpToDate { .. }));
    assert!(summarizer.calls().is_empty());
    assert_eq!(fx.journal_text(), journal);
}
