//! Two-stage JSON extraction from collaborator output.
//!
//! Stage one parses the whole text strictly. Stage two locates the outermost
//! balanced `{ ... }` span (string-literal aware) and parses only that.

use super::{CollaboratorError, CollaboratorResult};
use serde_json::Value;

/// Parses a JSON object, tolerating non-JSON wrapper text around it.
pub fn parse_loose_json(text: &str) -> CollaboratorResult<Value> {
    let trimmed = text.trim();
    let value = match serde_json::from_str::<Value>(trimmed) {
        Ok(value) => value,
        Err(strict_err) => {
            let span = outermost_object_span(trimmed).ok_or_else(|| {
                CollaboratorError::InvalidJson(format!("no json object found: {strict_err}"))
            })?;
            serde_json::from_str::<Value>(span)
                .map_err(|err| CollaboratorError::InvalidJson(err.to_string()))?
        }
    };
    if value.is_object() {
        Ok(value)
    } else {
        Err(CollaboratorError::InvalidShape(
            "top-level json value is not an object".to_string(),
        ))
    }
}

/// Returns the first balanced `{ ... }` span, ignoring braces inside strings.
fn outermost_object_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}
