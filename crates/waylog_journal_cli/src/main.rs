//! `waylog-journal` command-line entry point.
//!
//! # Responsibility
//! - Parse flags, resolve paths and wire the Codex collaborator.
//! - Run the ledger merge, then the journal step, on a blocking worker.
//! - Translate Ctrl-C into a cooperative cancel and map outcomes to exit codes.
//!
//! # Invariants
//! - Exit codes: 0 success, 1 journal failure, 2 structural error, 130
//!   interrupted.
//! - Dry runs never write files and never call the collaborator.

use clap::Parser;
use log::{error, info};
use std::io::{BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use waylog_journal_core::collaborator::codex::resolve_config_overrides;
use waylog_journal_core::collaborator::prompt::RepoContext;
use waylog_journal_core::document::DocumentError;
use waylog_journal_core::{
    check_journal, default_log_level, init_logging, plan_ledger, CodexCollaborator, CodexConfig,
    HistoryPersistence, JournalOptions, JournalOutcome, JournalPaths, JournalService, LedgerError,
    LedgerOptions, LedgerPlan, LedgerService, McpMode, PathOverrides, Provenance,
};

const EXIT_JOURNAL_FAILED: u8 = 1;
const EXIT_STRUCTURAL: u8 = 2;
const EXIT_INTERRUPTED: u8 = 130;

#[derive(Parser, Debug)]
#[command(name = "waylog-journal")]
#[command(about = "Summarize .waylog/history transcripts into a session ledger and a condensed journal")]
#[command(version)]
struct Args {
    /// Transcript directory (default: <repo>/.waylog/history)
    #[arg(long)]
    history_dir: Option<PathBuf>,

    /// Per-session ledger file (default: <repo>/.waylog-journal/sessions.md)
    #[arg(long)]
    sessions_file: Option<PathBuf>,

    /// Condensed journal file (default: <repo>/.waylog-journal/summary.md)
    #[arg(long, alias = "summary-file")]
    journal_file: Option<PathBuf>,

    /// Codex executable
    #[arg(long, env = "CODEX_BIN", default_value = "codex")]
    codex_bin: String,

    /// Codex history persistence for these runs (save-all|none)
    #[arg(long, default_value = "none")]
    codex_history_persistence: HistoryPersistence,

    /// Directory Codex runs in (default: a temp dir)
    #[arg(long)]
    codex_cd: Option<PathBuf>,

    /// MCP server handling for Codex runs (disable-all|inherit)
    #[arg(long, default_value = "disable-all")]
    codex_mcp: McpMode,

    /// Extra `codex -c` override (repeatable)
    #[arg(long = "codex-config")]
    codex_config: Vec<String>,

    /// Codex model (default: Codex config)
    #[arg(long, env = "CODEX_MODEL")]
    model: Option<String>,

    /// Reasoning effort, e.g. low|medium|high|xhigh (default: Codex config)
    #[arg(long, env = "CODEX_REASONING_EFFORT")]
    reasoning_effort: Option<String>,

    /// Never prompt for missing model/effort
    #[arg(long)]
    no_prompt: bool,

    /// Only update the ledger
    #[arg(long)]
    no_journal: bool,

    /// Regenerate the journal even if the ledger is unchanged
    #[arg(long)]
    force_journal: bool,

    /// Recompute every ledger entry
    #[arg(long)]
    force: bool,

    /// Report planned work without writing or calling Codex
    #[arg(long)]
    dry_run: bool,

    /// Max transcript chars sent per session (0 disables truncation)
    #[arg(long, default_value_t = waylog_journal_core::config::DEFAULT_MAX_CHARS)]
    max_chars: usize,

    /// Log level (trace|debug|info|warn|error)
    #[arg(long, env = "WAYLOG_JOURNAL_LOG")]
    log_level: Option<String>,

    /// Write rolling log files here instead of stderr
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

/// Everything the blocking worker needs.
struct Job {
    paths: JournalPaths,
    plan: LedgerPlan,
    ledger_options: LedgerOptions,
    journal_options: JournalOptions,
    no_journal: bool,
    collaborator: CodexCollaborator,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();
    let level = args.log_level.as_deref().unwrap_or(default_log_level());
    if let Err(err) = init_logging(level, args.log_dir.as_deref()) {
        eprintln!("logging setup failed: {err}");
        return ExitCode::from(EXIT_STRUCTURAL);
    }

    let cwd = match std::env::current_dir() {
        Ok(cwd) => cwd,
        Err(err) => {
            eprintln!("cannot determine current directory: {err}");
            return ExitCode::from(EXIT_STRUCTURAL);
        }
    };
    let paths = JournalPaths::resolve(
        &cwd,
        &PathOverrides {
            history_dir: args.history_dir.clone(),
            ledger_file: args.sessions_file.clone(),
            journal_file: args.journal_file.clone(),
        },
    );
    info!(
        "event=paths_resolved module=cli status=ok repo_root={} history_dir={}",
        paths.repo_root.display(),
        paths.history_dir.display()
    );

    if !paths.history_dir.is_dir() {
        eprintln!("Missing history dir: {}", paths.history_dir.display());
        eprintln!("Try running `waylog pull` in your repo to populate `.waylog/history/`.");
        return ExitCode::from(EXIT_STRUCTURAL);
    }

    let mut ledger_options = LedgerOptions {
        force: args.force,
        max_chars: Some(args.max_chars).filter(|max| *max > 0),
        provenance: Provenance::default(),
    };
    let plan = match plan_ledger(&paths, &ledger_options) {
        Ok(plan) => plan,
        Err(err) => {
            report_structural(&err);
            return ExitCode::from(EXIT_STRUCTURAL);
        }
    };
    if plan.items.is_empty() {
        eprintln!(
            "{} has no transcripts; run `waylog pull` to recover history.",
            paths.history_dir.display()
        );
    }

    if args.dry_run {
        return dry_run_report(&paths, &plan, &args);
    }

    eprintln!(
        "History files: {}. To update: {}. Unchanged: {}.",
        plan.items.len(),
        plan.update_count(),
        plan.keep_count()
    );

    let journal_pending = !args.no_journal
        && check_journal(&paths.ledger_file, &paths.journal_file, args.force_journal)
            .map(|check| check.needs_regeneration)
            .unwrap_or(true);
    let mut model = args.model.clone().filter(|value| !value.trim().is_empty());
    let mut effort = args
        .reasoning_effort
        .clone()
        .filter(|value| !value.trim().is_empty());
    let will_generate = plan.update_count() > 0 || journal_pending;
    if will_generate && !args.no_prompt && std::io::stdin().is_terminal() {
        if model.is_none() {
            model = prompt_line("Codex model (blank = use default): ");
        }
        if effort.is_none() {
            effort =
                prompt_line("Reasoning effort (blank = use default; e.g. low|medium|high|xhigh): ");
        }
    }
    if will_generate {
        eprintln!(
            "Codex settings: model={}, reasoning_effort={}",
            model.as_deref().unwrap_or("(default)"),
            effort.as_deref().unwrap_or("(default)")
        );
    }
    ledger_options.provenance = Provenance {
        model: model.clone(),
        reasoning_effort: effort.clone(),
    };

    // Keeps the scratch dir alive until the worker finishes.
    let scratch = match tempfile::tempdir() {
        Ok(dir) => dir,
        Err(err) => {
            eprintln!("cannot create temp dir: {err}");
            return ExitCode::from(EXIT_STRUCTURAL);
        }
    };
    let working_dir = match prepare_codex_dir(args.codex_cd.as_deref(), scratch.path()) {
        Ok(dir) => dir,
        Err(err) => {
            eprintln!("cannot prepare codex working dir: {err}");
            return ExitCode::from(EXIT_STRUCTURAL);
        }
    };

    let mut codex = CodexConfig::new(args.codex_bin.clone(), working_dir);
    codex.model = model;
    codex.reasoning_effort = effort;
    codex.history_persistence = args.codex_history_persistence;
    codex.config_overrides =
        resolve_config_overrides(&args.codex_bin, args.codex_mcp, &args.codex_config);

    let job = Job {
        journal_options: JournalOptions {
            force: args.force_journal,
            repo_name: RepoContext::from_root(&paths.repo_root).name,
        },
        paths,
        plan,
        ledger_options,
        no_journal: args.no_journal,
        collaborator: CodexCollaborator::new(codex),
    };

    let cancel = Arc::new(AtomicBool::new(false));
    let worker_cancel = Arc::clone(&cancel);
    let mut handle = tokio::task::spawn_blocking(move || run_job(job, &worker_cancel));

    let joined = tokio::select! {
        joined = &mut handle => joined,
        _ = tokio::signal::ctrl_c() => {
            cancel.store(true, Ordering::SeqCst);
            info!("event=interrupt module=cli status=requested");
            handle.await
        }
    };
    drop(scratch);

    match joined {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            error!("event=worker_join module=cli status=error error={err}");
            ExitCode::from(EXIT_JOURNAL_FAILED)
        }
    }
}

fn run_job(job: Job, cancel: &AtomicBool) -> u8 {
    let ledger = LedgerService::new(
        &job.collaborator,
        &job.paths.repo_root,
        job.ledger_options.clone(),
    );
    let outcome = match ledger.apply_with_progress(&job.plan, cancel, |progress| {
        eprintln!(
            "[{}/{}] Summarizing {}",
            progress.index, progress.total, progress.rel_path
        );
    }) {
        Ok(outcome) => outcome,
        Err(err) => {
            report_structural(&err);
            return EXIT_STRUCTURAL;
        }
    };
    if outcome.interrupted || cancel.load(Ordering::SeqCst) {
        eprintln!("Interrupted; partial progress is saved. Re-run to continue.");
        return EXIT_INTERRUPTED;
    }
    if outcome.failed > 0 {
        eprintln!(
            "[warn] {} entries failed to summarize; they will be retried on the next run.",
            outcome.failed
        );
    }
    if outcome.skipped > 0 {
        eprintln!(
            "[warn] {} history files could not be read; they will be retried on the next run.",
            outcome.skipped
        );
    }
    if outcome.updated > 0 {
        eprintln!(
            "Updated {} ({} updated, {} unchanged).",
            job.paths.ledger_file.display(),
            outcome.updated,
            outcome.kept
        );
    } else {
        eprintln!(
            "No session updates needed ({}).",
            job.paths.ledger_file.display()
        );
    }

    if job.no_journal {
        eprintln!("Skipped journal generation (--no-journal).");
        return 0;
    }

    if check_journal(
        &job.paths.ledger_file,
        &job.paths.journal_file,
        job.journal_options.force,
    )
    .is_ok_and(|check| check.needs_regeneration)
    {
        eprintln!("Generating condensed journal...");
    }
    let journal = JournalService::new(&job.collaborator, job.journal_options.clone());
    let result = journal.run(&job.paths.ledger_file, &job.paths.journal_file);
    if cancel.load(Ordering::SeqCst) {
        eprintln!("Interrupted; partial progress is saved. Re-run to continue.");
        return EXIT_INTERRUPTED;
    }
    match result {
        Ok(JournalOutcome::Regenerated { .. }) => {
            eprintln!("Updated {}.", job.paths.journal_file.display());
            0
        }
        Ok(JournalOutcome::UpToDate { .. }) => {
            eprintln!("Journal up-to-date ({}).", job.paths.journal_file.display());
            0
        }
        Err(err) => {
            eprintln!("{err}");
            match err {
                waylog_journal_core::JournalError::Document(_) => EXIT_STRUCTURAL,
                _ => EXIT_JOURNAL_FAILED,
            }
        }
    }
}

fn dry_run_report(paths: &JournalPaths, plan: &LedgerPlan, args: &Args) -> ExitCode {
    eprintln!(
        "Would update {} entries; keep {} unchanged.",
        plan.update_count(),
        plan.keep_count()
    );
    for item in plan.to_update() {
        eprintln!("- {}", item.rel_path);
    }
    if !args.no_journal {
        match check_journal(&paths.ledger_file, &paths.journal_file, args.force_journal) {
            Ok(check) if check.needs_regeneration => eprintln!("Would regenerate journal."),
            Ok(_) => eprintln!("Journal up-to-date."),
            Err(err) => {
                eprintln!("{err}");
                return ExitCode::from(EXIT_STRUCTURAL);
            }
        }
    }
    ExitCode::SUCCESS
}

fn report_structural(err: &LedgerError) {
    eprintln!("{err}");
    if matches!(
        err,
        LedgerError::Document(DocumentError::MissingMarkers { .. })
    ) {
        eprintln!("Add markers or move the file aside, then re-run.");
    }
}

fn prepare_codex_dir(explicit: Option<&Path>, scratch: &Path) -> std::io::Result<PathBuf> {
    let dir = match explicit {
        Some(dir) => dir.to_path_buf(),
        None => scratch.join("codex-cd"),
    };
    std::fs::create_dir_all(&dir)?;
    dir.canonicalize()
}

fn prompt_line(label: &str) -> Option<String> {
    eprint!("{label}");
    std::io::stderr().flush().ok()?;
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line).ok()?;
    Some(line.trim().to_string()).filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::Args;
    use clap::Parser;
    use waylog_journal_core::{HistoryPersistence, McpMode};

    #[test]
    fn defaults_match_documented_behavior() {
        let args = Args::try_parse_from(["waylog-journal"]).expect("parse");
        assert_eq!(args.codex_history_persistence, HistoryPersistence::None);
        assert_eq!(args.codex_mcp, McpMode::DisableAll);
        assert_eq!(args.max_chars, 200_000);
        assert!(!args.force && !args.dry_run && !args.no_journal);
    }

    #[test]
    fn summary_file_alias_and_repeated_config() {
        let args = Args::try_parse_from([
            "waylog-journal",
            "--summary-file",
            "out.md",
            "--codex-config",
            "a=1",
            "--codex-config",
            "b=2",
            "--codex-mcp",
            "inherit",
        ])
        .expect("parse");
        assert_eq!(args.journal_file.as_deref(), Some(std::path::Path::new("out.md")));
        assert_eq!(args.codex_config, vec!["a=1", "b=2"]);
        assert_eq!(args.codex_mcp, McpMode::Inherit);
    }

    #[test]
    fn unknown_history_persistence_is_rejected() {
        assert!(Args::try_parse_from([
            "waylog-journal",
            "--codex-history-persistence",
            "sometimes"
        ])
        .is_err());
    }
}
