//! JSON Schemas handed to the collaborator as output contracts.

use once_cell::sync::Lazy;
use serde_json::{json, Value};

/// Per-item summary schema.
pub static SUMMARY_SCHEMA: Lazy<Value> = Lazy::new(|| {
    let string_list = json!({"type": "array", "items": {"type": "string"}});
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "type": "object",
        "additionalProperties": false,
        "properties": {
            "project_relevance": {
                "type": "object",
                "additionalProperties": false,
                "properties": {
                    "label": {"type": "string", "enum": ["related", "unrelated", "unclear"]},
                    "confidence": {"type": "number", "minimum": 0, "maximum": 1},
                    "reason": {"type": "string"},
                    "touched_areas": string_list,
                },
                "required": ["label", "confidence", "reason", "touched_areas"],
            },
            "highlights": string_list,
            "decisions": string_list,
            "implementation_details": string_list,
            "open_questions": string_list,
            "security_notes": string_list,
        },
        "required": [
            "project_relevance",
            "highlights",
            "decisions",
            "implementation_details",
            "open_questions",
            "security_notes",
        ],
    })
});

/// Condensed journal schema.
pub static JOURNAL_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "type": "object",
        "additionalProperties": false,
        "properties": {"journal_markdown": {"type": "string"}},
        "required": ["journal_markdown"],
    })
});
