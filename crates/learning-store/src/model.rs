//! Knowledge-base document model. Forward-compatible: unknown keys are
//! captured in flattened maps and preserved on rewrite.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use applyflow_core_types::ElementRecord;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct KnowledgeBase {
    #[serde(default)]
    pub field_mappings: BTreeMap<String, FieldMapping>,
    #[serde(default)]
    pub platform_specific: BTreeMap<String, BTreeMap<String, FieldMapping>>,
    #[serde(default)]
    pub learning_history: Vec<HistoryEntry>,
    #[serde(default)]
    pub confidence_scores: BTreeMap<String, f64>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FieldMapping {
    pub semantic: String,
    pub data_path: String,
    #[serde(default)]
    pub patterns: Vec<String>,
    #[serde(default)]
    pub examples: Vec<MappingExample>,
    pub confidence: f64,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MappingExample {
    pub value: String,
    #[serde(default)]
    pub context: Value,
    pub timestamp: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub field_key: String,
    pub semantic: String,
    pub value: String,
    #[serde(default)]
    pub context: Value,
    pub timestamp: String,
}

static WORDS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[a-z0-9]+").unwrap());
static KEY_ILLEGAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9_]+").unwrap());
static KEY_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"_+").unwrap());

/// Text features of a control, used to fingerprint it across sites.
#[derive(Clone, Debug, Default)]
pub struct FieldFeatures {
    pub label: String,
    pub placeholder: String,
    pub id: String,
    pub name: String,
    pub aria_label: String,
    pub patterns: Vec<String>,
}

impl FieldFeatures {
    pub fn extract(element: &ElementRecord) -> Self {
        let label = element.label.to_lowercase();
        let placeholder = element.placeholder.to_lowercase();
        let aria_label = element.aria_label.to_lowercase();

        let mut patterns: Vec<String> = Vec::new();
        for text in [&label, &placeholder, &aria_label] {
            for word in WORDS.find_iter(text) {
                let word = word.as_str().to_string();
                if !patterns.contains(&word) {
                    patterns.push(word);
                }
            }
        }

        Self {
            label,
            placeholder,
            id: element.id.to_lowercase(),
            name: element.name.to_lowercase(),
            aria_label,
            patterns,
        }
    }

    /// Stable fingerprint: the most distinctive of label, placeholder, id,
    /// falling back to the first three pattern tokens; normalized to
    /// `[a-z0-9_]+`.
    pub fn field_key(&self) -> String {
        let source = if !self.label.is_empty() {
            self.label.clone()
        } else if !self.placeholder.is_empty() {
            self.placeholder.clone()
        } else if !self.id.is_empty() {
            self.id.clone()
        } else {
            self.patterns.iter().take(3).cloned().collect::<Vec<_>>().join("_")
        };

        let key = KEY_ILLEGAL.replace_all(&source, "_");
        let key = KEY_RUNS.replace_all(&key, "_");
        key.trim_matches('_').to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_key_prefers_label() {
        let el = ElementRecord {
            label: "First Name *".into(),
            placeholder: "given".into(),
            id: "f1".into(),
            ..Default::default()
        };
        assert_eq!(FieldFeatures::extract(&el).field_key(), "first_name");
    }

    #[test]
    fn field_key_falls_back_to_placeholder_then_id() {
        let el = ElementRecord {
            placeholder: "Email address".into(),
            id: "q_77".into(),
            ..Default::default()
        };
        assert_eq!(FieldFeatures::extract(&el).field_key(), "email_address");

        let el = ElementRecord {
            id: "question_123".into(),
            ..Default::default()
        };
        assert_eq!(FieldFeatures::extract(&el).field_key(), "question_123");
    }

    #[test]
    fn patterns_are_deduplicated_word_tokens() {
        let el = ElementRecord {
            label: "Phone number".into(),
            placeholder: "phone".into(),
            ..Default::default()
        };
        let features = FieldFeatures::extract(&el);
        assert_eq!(features.patterns, vec!["phone", "number"]);
    }
}
