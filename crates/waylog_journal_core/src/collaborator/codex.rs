//! Codex CLI collaborator adapter.
//!
//! # Responsibility
//! - Run `codex exec` as a blocking subprocess with a schema-constrained
//!   output file.
//! - Build `-c` overrides that disable configured MCP servers.
//!
//! # Invariants
//! - The prompt is passed on stdin, never on the command line.
//! - Schema and output files are temp files removed after each call.
//! - Codex runs read-only with approvals disabled.

use super::{
    parse_loose_json, CollaboratorError, CollaboratorRequest, CollaboratorResult, Summarizer,
};
use crate::redact::sanitize;
use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::str::FromStr;
use std::time::Instant;
use tempfile::NamedTempFile;

const MAX_STDERR_CHARS: usize = 2000;

static MCP_SERVER_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("valid mcp name regex"));

/// Whether Codex keeps its own session history for these runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HistoryPersistence {
    SaveAll,
    #[default]
    None,
}

impl HistoryPersistence {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SaveAll => "save-all",
            Self::None => "none",
        }
    }
}

impl FromStr for HistoryPersistence {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "save-all" => Ok(Self::SaveAll),
            "none" => Ok(Self::None),
            other => Err(format!(
                "unsupported history persistence `{other}`; expected save-all|none"
            )),
        }
    }
}

/// MCP server handling for collaborator runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum McpMode {
    #[default]
    DisableAll,
    Inherit,
}

impl FromStr for McpMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "disable-all" => Ok(Self::DisableAll),
            "inherit" => Ok(Self::Inherit),
            other => Err(format!(
                "unsupported mcp mode `{other}`; expected disable-all|inherit"
            )),
        }
    }
}

/// Explicit Codex invocation settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodexConfig {
    /// Executable name or path.
    pub bin: String,
    pub model: Option<String>,
    pub reasoning_effort: Option<String>,
    pub history_persistence: HistoryPersistence,
    /// Directory Codex runs in (`--cd` and process cwd).
    pub working_dir: PathBuf,
    /// Extra `-c key=value` overrides, applied in order.
    pub config_overrides: Vec<String>,
}

impl CodexConfig {
    pub fn new(bin: impl Into<String>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            bin: bin.into(),
            model: None,
            reasoning_effort: None,
            history_persistence: HistoryPersistence::default(),
            working_dir: working_dir.into(),
            config_overrides: Vec::new(),
        }
    }

    /// Full argument list for one `codex exec` call.
    pub fn exec_args(&self, schema_path: &str, output_path: &str) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(model) = self.model.as_deref().filter(|v| !v.is_empty()) {
            args.extend(["-m".to_string(), model.to_string()]);
        }
        args.extend([
            "-c".to_string(),
            format!(
                "history.persistence=\"{}\"",
                self.history_persistence.as_str()
            ),
        ]);
        if let Some(effort) = self.reasoning_effort.as_deref().filter(|v| !v.is_empty()) {
            args.extend([
                "-c".to_string(),
                format!("model_reasoning_effort=\"{effort}\""),
            ]);
        }
        for override_value in &self.config_overrides {
            args.extend(["-c".to_string(), override_value.clone()]);
        }
        args.extend(["--cd".to_string(), self.working_dir.display().to_string()]);
        args.extend(
            [
                "-a",
                "never",
                "-s",
                "read-only",
                "exec",
                "--skip-git-repo-check",
                "--color",
                "never",
                "--output-schema",
                schema_path,
                "--output-last-message",
                output_path,
                "-",
            ]
            .map(str::to_string),
        );
        args
    }
}

/// `Summarizer` backed by the Codex CLI.
#[derive(Debug, Clone)]
pub struct CodexCollaborator {
    config: CodexConfig,
}

impl CodexCollaborator {
    pub fn new(config: CodexConfig) -> Self {
        Self { config }
    }
}

impl Summarizer for CodexCollaborator {
    fn complete(&self, request: &CollaboratorRequest<'_>) -> CollaboratorResult<Value> {
        let started_at = Instant::now();
        let mut schema_file = NamedTempFile::new()?;
        serde_json::to_writer_pretty(&mut schema_file, request.schema)
            .map_err(|err| CollaboratorError::Io(err.into()))?;
        schema_file.flush()?;
        let output_file = NamedTempFile::new()?;

        let args = self.config.exec_args(
            &schema_file.path().display().to_string(),
            &output_file.path().display().to_string(),
        );
        let mut child = Command::new(&self.config.bin)
            .args(&args)
            .current_dir(&self.config.working_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| match err.kind() {
                std::io::ErrorKind::NotFound => {
                    CollaboratorError::ExecutableNotFound(self.config.bin.clone())
                }
                _ => CollaboratorError::Io(err),
            })?;

        let stdin = child.stdin.take();
        let prompt = request.prompt.as_bytes();
        let (output, write_result) = std::thread::scope(|scope| {
            let writer = scope.spawn(move || match stdin {
                Some(mut stdin) => stdin.write_all(prompt),
                None => Ok(()),
            });
            let output = child.wait_with_output();
            let write_result = writer
                .join()
                .unwrap_or_else(|_| Err(std::io::Error::other("stdin writer panicked")));
            (output, write_result)
        });
        let output = output?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CollaboratorError::NonZeroExit {
                code: output.status.code(),
                stderr: cap_chars(&sanitize(stderr.trim()), MAX_STDERR_CHARS),
            });
        }
        write_result?;

        let raw = std::fs::read(output_file.path())?;
        let text = String::from_utf8_lossy(&raw);
        let value = parse_loose_json(&text)?;
        debug!(
            "event=collaborator_call module=collaborator status=ok duration_ms={} prompt_bytes={}",
            started_at.elapsed().as_millis(),
            request.prompt.len()
        );
        Ok(value)
    }
}

/// One entry of `codex mcp list --json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct McpServer {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub enabled: bool,
}

/// Lists configured MCP servers. Any failure degrades to an empty list.
pub fn list_mcp_servers(bin: &str) -> Vec<McpServer> {
    let output = match Command::new(bin).args(["mcp", "list", "--json"]).output() {
        Ok(output) => output,
        Err(err) => {
            warn!("event=mcp_list module=collaborator status=error error_code=spawn_failed bin={bin} error={err}");
            return Vec::new();
        }
    };
    if !output.status.success() {
        warn!(
            "event=mcp_list module=collaborator status=error error_code=non_zero_exit code={:?}",
            output.status.code()
        );
        return Vec::new();
    }
    match serde_json::from_slice::<Vec<Value>>(&output.stdout) {
        Ok(items) => items
            .into_iter()
            .filter(Value::is_object)
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        Err(err) => {
            warn!("event=mcp_list module=collaborator status=error error_code=invalid_json error={err}");
            Vec::new()
        }
    }
}

/// Builds `mcp_servers.<name>.enabled=false` overrides.
///
/// Servers with empty or unsupported names are skipped.
pub fn mcp_disable_overrides(servers: &[McpServer], only_enabled: bool) -> Vec<String> {
    servers
        .iter()
        .filter(|server| !only_enabled || server.enabled)
        .filter_map(|server| {
            let name = server.name.trim();
            if name.is_empty() {
                return None;
            }
            if !MCP_SERVER_NAME_RE.is_match(name) {
                warn!("event=mcp_override module=collaborator status=skip reason=unsupported_name");
                return None;
            }
            Some(format!("mcp_servers.{name}.enabled=false"))
        })
        .collect()
}

/// Resolves the full `-c` override list for a run.
pub fn resolve_config_overrides(bin: &str, mode: McpMode, extra: &[String]) -> Vec<String> {
    let mut overrides = match mode {
        McpMode::DisableAll => mcp_disable_overrides(&list_mcp_servers(bin), false),
        McpMode::Inherit => Vec::new(),
    };
    overrides.extend(
        extra
            .iter()
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
            .map(str::to_string),
    );
    overrides
}

fn cap_chars(value: &str, max_chars: usize) -> String {
    let mut capped: String = value.chars().take(max_chars).collect();
    if value.chars().count() > max_chars {
        capped.push_str("...");
    }
    capped
}

#[cfg(test)]
mod tests {
    use super::{
        mcp_disable_overrides, CodexCollaborator, CodexConfig, HistoryPersistence, McpServer,
    };
    use crate::collaborator::{CollaboratorError, CollaboratorRequest, Summarizer};
    use serde_json::json;

    fn server(name: &str, enabled: bool) -> McpServer {
        McpServer {
            name: name.to_string(),
            enabled,
        }
    }

    #[test]
    fn exec_args_carry_overrides_in_order() {
        let mut config = CodexConfig::new("codex", "/tmp/cd");
        config.model = Some("gpt-x".to_string());
        config.reasoning_effort = Some("high".to_string());
        config.config_overrides = vec!["a=1".to_string()];
        let args = config.exec_args("/tmp/schema.json", "/tmp/out.txt");

        assert_eq!(&args[..2], ["-m", "gpt-x"]);
        assert_eq!(args[3], "history.persistence=\"none\"");
        assert_eq!(args[5], "model_reasoning_effort=\"high\"");
        assert_eq!(args[7], "a=1");
        assert_eq!(&args[8..10], ["--cd", "/tmp/cd"]);
        assert_eq!(args.last().map(String::as_str), Some("-"));
        assert!(args.windows(2).any(|w| w == ["--output-schema", "/tmp/schema.json"]));
    }

    #[test]
    fn history_persistence_parses_known_values() {
        assert_eq!(
            "save-all".parse::<HistoryPersistence>(),
            Ok(HistoryPersistence::SaveAll)
        );
        assert!("sometimes".parse::<HistoryPersistence>().is_err());
    }

    #[test]
    fn mcp_overrides_skip_invalid_names() {
        let servers = vec![
            server("docs", true),
            server("bad name", true),
            server("", true),
            server("off", false),
        ];
        assert_eq!(
            mcp_disable_overrides(&servers, false),
            vec!["mcp_servers.docs.enabled=false", "mcp_servers.off.enabled=false"]
        );
        assert_eq!(
            mcp_disable_overrides(&servers, true),
            vec!["mcp_servers.docs.enabled=false"]
        );
    }

    #[test]
    fn missing_executable_is_reported() {
        let dir = tempfile::tempdir().expect("temp dir");
        let collaborator = CodexCollaborator::new(CodexConfig::new(
            "waylog-journal-test-missing-codex-binary",
            dir.path(),
        ));
        let schema = json!({});
        let err = collaborator
            .complete(&CollaboratorRequest {
                prompt: "p",
                schema: &schema,
            })
            .expect_err("missing binary must fail");
        assert!(matches!(err, CollaboratorError::ExecutableNotFound(_)));
    }
}
