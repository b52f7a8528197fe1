//! Deterministic cleanup of malformed LLM replies.
//!
//! Bounded set of mutations, applied in order: strip markdown fences,
//! extract the outermost JSON object or array, delete line and block
//! comments, delete trailing commas. Valid input passes through untouched.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static FENCE_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"```(?:json)?\s*").unwrap());
static LINE_COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\s*//[^\n]*$").unwrap());
static BLOCK_COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)/\*.*?\*/").unwrap());
static TRAILING_COMMA_OBJ: Lazy<Regex> = Lazy::new(|| Regex::new(r",\s*\}").unwrap());
static TRAILING_COMMA_ARR: Lazy<Regex> = Lazy::new(|| Regex::new(r",\s*\]").unwrap());

/// Parse `text` as JSON, repairing the common malformations on the way.
/// Returns `None` when no parsable document can be recovered.
pub fn sanitize_json(text: &str) -> Option<Value> {
    if let Ok(value) = serde_json::from_str::<Value>(text) {
        return Some(value);
    }

    let stripped = FENCE_OPEN.replace_all(text, "");
    let stripped = stripped.trim().trim_end_matches("```").trim();

    let candidate = extract_document(stripped)?;
    if let Ok(value) = serde_json::from_str::<Value>(&candidate) {
        return Some(value);
    }

    let cleaned = LINE_COMMENT.replace_all(&candidate, "");
    let cleaned = BLOCK_COMMENT.replace_all(&cleaned, "");
    let cleaned = TRAILING_COMMA_OBJ.replace_all(&cleaned, "}");
    let cleaned = TRAILING_COMMA_ARR.replace_all(&cleaned, "]");

    serde_json::from_str::<Value>(&cleaned).ok()
}

/// Slice out the outermost `{...}` or `[...]` span.
fn extract_document(text: &str) -> Option<String> {
    let object = span(text, '{', '}');
    let array = span(text, '[', ']');
    match (object, array) {
        (Some(o), Some(a)) => Some(if o.0 <= a.0 {
            text[o.0..=o.1].to_string()
        } else {
            text[a.0..=a.1].to_string()
        }),
        (Some(o), None) => Some(text[o.0..=o.1].to_string()),
        (None, Some(a)) => Some(text[a.0..=a.1].to_string()),
        (None, None) => None,
    }
}

fn span(text: &str, open: char, close: char) -> Option<(usize, usize)> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    (end > start).then_some((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn valid_json_is_identity() {
        let text = r#"{"page_type":"form_page","confidence":0.9}"#;
        let value = sanitize_json(text).unwrap();
        assert_eq!(value, serde_json::from_str::<Value>(text).unwrap());
    }

    #[test]
    fn strips_markdown_fences() {
        let text = "```json\n{\"a\": 1}\n```";
        assert_eq!(sanitize_json(text).unwrap(), json!({"a": 1}));
    }

    #[test]
    fn removes_trailing_commas_and_comments() {
        let text = r#"Here you go:
        {
            // classification
            "page_type": "form_page",
            "cta_candidates": [1, 2,],
        }"#;
        let value = sanitize_json(text).unwrap();
        assert_eq!(value["page_type"], "form_page");
        assert_eq!(value["cta_candidates"], json!([1, 2]));
    }

    #[test]
    fn extracts_array_documents() {
        let text = "actions below\n[{\"selector\": \"#a\"}]\nthanks";
        let value = sanitize_json(text).unwrap();
        assert!(value.is_array());
    }

    #[test]
    fn irrecoverable_input_is_none() {
        assert!(sanitize_json("no json here").is_none());
        assert!(sanitize_json("{\"unterminated\": ").is_none());
    }
}
