//! Summarization collaborator boundary.
//!
//! # Responsibility
//! - Define the request/response contract with the external summarizer.
//! - Decode schema-constrained JSON into typed summaries.
//!
//! # Invariants
//! - Collaborator calls are blocking and sequential; no streaming.
//! - Every failure, including a response missing required fields, surfaces
//!   as `CollaboratorError`; callers decide whether it is fatal.
//! - Configuration is passed explicitly; there is no process-wide state.

use crate::model::summary::{ItemSummary, JournalSummary};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod codex;
mod json;
pub mod prompt;
pub mod schema;

pub use json::parse_loose_json;

pub type CollaboratorResult<T> = Result<T, CollaboratorError>;

/// One collaborator round-trip request.
#[derive(Debug, Clone, Copy)]
pub struct CollaboratorRequest<'a> {
    /// Free-text instructions plus payload.
    pub prompt: &'a str,
    /// JSON Schema the response must satisfy.
    pub schema: &'a Value,
}

/// Collaborator failure modes.
#[derive(Debug)]
pub enum CollaboratorError {
    /// Collaborator executable could not be found.
    ExecutableNotFound(String),
    /// Local IO around the invocation failed.
    Io(std::io::Error),
    /// Collaborator exited unsuccessfully.
    NonZeroExit { code: Option<i32>, stderr: String },
    /// Output contained no parseable JSON object.
    InvalidJson(String),
    /// JSON parsed but does not match the requested shape.
    InvalidShape(String),
}

impl Display for CollaboratorError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ExecutableNotFound(program) => {
                write!(f, "collaborator executable not found: `{program}`")
            }
            Self::Io(err) => write!(f, "collaborator io failure: {err}"),
            Self::NonZeroExit { code, stderr } => match code {
                Some(code) => write!(f, "collaborator failed (exit {code}): {stderr}"),
                None => write!(f, "collaborator terminated by signal: {stderr}"),
            },
            Self::InvalidJson(message) => write!(f, "collaborator returned invalid json: {message}"),
            Self::InvalidShape(message) => {
                write!(f, "collaborator response has unexpected shape: {message}")
            }
        }
    }
}

impl Error for CollaboratorError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CollaboratorError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

/// External summarization service.
pub trait Summarizer {
    /// Sends `request` and returns the response JSON object.
    fn complete(&self, request: &CollaboratorRequest<'_>) -> CollaboratorResult<Value>;
}

impl<T: Summarizer + ?Sized> Summarizer for &T {
    fn complete(&self, request: &CollaboratorRequest<'_>) -> CollaboratorResult<Value> {
        (**self).complete(request)
    }
}

/// Requests a per-item summary.
pub fn summarize_item(
    summarizer: &(impl Summarizer + ?Sized),
    prompt: &str,
) -> CollaboratorResult<ItemSummary> {
    let request = CollaboratorRequest {
        prompt,
        schema: &schema::SUMMARY_SCHEMA,
    };
    decode(summarizer.complete(&request)?)
}

/// Requests the condensed journal prose.
pub fn condense_journal(
    summarizer: &(impl Summarizer + ?Sized),
    prompt: &str,
) -> CollaboratorResult<String> {
    let request = CollaboratorRequest {
        prompt,
        schema: &schema::JOURNAL_SCHEMA,
    };
    let journal: JournalSummary = decode(summarizer.complete(&request)?)?;
    Ok(journal.journal_markdown)
}

fn decode<T: DeserializeOwned>(value: Value) -> CollaboratorResult<T> {
    serde_json::from_value(value).map_err(|err| CollaboratorError::InvalidShape(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::{
        condense_journal, summarize_item, CollaboratorError, CollaboratorRequest,
        CollaboratorResult, Summarizer,
    };
    use serde_json::{json, Value};

    struct Fixed(Value);

    impl Summarizer for Fixed {
        fn complete(&self, _request: &CollaboratorRequest<'_>) -> CollaboratorResult<Value> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn journal_response_without_markdown_is_shape_error() {
        let err = condense_journal(&Fixed(json!({"journal": "x"})), "p")
            .expect_err("missing field must fail");
        assert!(matches!(err, CollaboratorError::InvalidShape(_)));
    }

    #[test]
    fn item_summary_decodes_complete_response() {
        let summary = summarize_item(
            &Fixed(json!({
                "project_relevance": {"label": "unrelated", "confidence": 0.1, "reason": "math", "touched_areas": []},
                "highlights": ["h"], "decisions": [], "implementation_details": [],
                "open_questions": [], "security_notes": []
            })),
            "p",
        )
        .expect("complete response decodes");
        assert_eq!(summary.highlights, vec!["h"]);
    }
}
