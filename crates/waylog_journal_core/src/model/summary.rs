//! Collaborator response shapes.
//!
//! # Invariants
//! - Every field listed as required by the output schema is required here;
//!   a response missing one fails deserialization.

use serde::{Deserialize, Serialize};

/// Highlight used for entries whose summary could not be generated.
pub const FALLBACK_HIGHLIGHT: &str = "Summary generation failed (see stderr).";

/// How a transcript relates to the current repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelevanceLabel {
    Related,
    Unrelated,
    Unclear,
}

impl RelevanceLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Related => "related",
            Self::Unrelated => "unrelated",
            Self::Unclear => "unclear",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectRelevance {
    pub label: RelevanceLabel,
    /// Expected within `0..=1`.
    pub confidence: f64,
    pub reason: String,
    pub touched_areas: Vec<String>,
}

/// Per-item summary returned by the collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemSummary {
    pub project_relevance: ProjectRelevance,
    pub highlights: Vec<String>,
    pub decisions: Vec<String>,
    pub implementation_details: Vec<String>,
    pub open_questions: Vec<String>,
    pub security_notes: Vec<String>,
}

impl ItemSummary {
    /// Placeholder summary recorded when the collaborator fails.
    pub fn fallback() -> Self {
        Self {
            project_relevance: ProjectRelevance {
                label: RelevanceLabel::Unclear,
                confidence: 0.0,
                reason: "Summary generation failed.".to_string(),
                touched_areas: Vec::new(),
            },
            highlights: vec![FALLBACK_HIGHLIGHT.to_string()],
            decisions: Vec::new(),
            implementation_details: Vec::new(),
            open_questions: Vec::new(),
            security_notes: vec!["No sensitive data included in this entry.".to_string()],
        }
    }
}

/// Condensed journal returned by the collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalSummary {
    pub journal_markdown: String,
}

#[cfg(test)]
mod tests {
    use super::{ItemSummary, RelevanceLabel};
    use serde_json::json;

    #[test]
    fn summary_requires_every_section() {
        let missing = json!({
            "project_relevance": {"label": "related", "confidence": 0.5, "reason": "r", "touched_areas": []},
            "highlights": [],
        });
        assert!(serde_json::from_value::<ItemSummary>(missing).is_err());
    }

    #[test]
    fn unknown_relevance_label_is_rejected() {
        let value = json!({
            "project_relevance": {"label": "maybe", "confidence": 0.5, "reason": "r", "touched_areas": []},
            "highlights": [], "decisions": [], "implementation_details": [],
            "open_questions": [], "security_notes": []
        });
        assert!(serde_json::from_value::<ItemSummary>(value).is_err());
        assert_eq!(RelevanceLabel::Unclear.as_str(), "unclear");
    }
}
