//! Field-mapping knowledge base.
//!
//! Append-only store of (field fingerprint → semantic, data path, examples,
//! confidence) with a per-platform overlay. The writer is serialized behind a
//! lock, readers get snapshot copies, and the document is persisted at
//! session end or on explicit flush - never mid-fill.

mod model;

use std::path::{Path, PathBuf};

use chrono::Utc;
use parking_lot::RwLock;
use thiserror::Error;
use tracing::{debug, info};

use applyflow_core_types::{ElementRecord, Platform};

pub use model::{FieldFeatures, FieldMapping, HistoryEntry, KnowledgeBase, MappingExample};

/// Learning history is capped so the document stays prompt-sized; newest
/// entries are kept.
const HISTORY_CAP: usize = 500;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read knowledge base {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse knowledge base: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Process-wide learning store. Cheap to share behind an `Arc`.
pub struct LearningStore {
    inner: RwLock<KnowledgeBase>,
    path: Option<PathBuf>,
}

impl LearningStore {
    /// In-memory store with no backing file.
    pub fn in_memory() -> Self {
        Self {
            inner: RwLock::new(KnowledgeBase::default()),
            path: None,
        }
    }

    /// Load from `path`, starting empty when the file does not exist yet.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let base = if path.exists() {
            let text = std::fs::read_to_string(&path).map_err(|source| StoreError::Io {
                path: path.display().to_string(),
                source,
            })?;
            serde_json::from_str(&text)?
        } else {
            KnowledgeBase::default()
        };
        Ok(Self {
            inner: RwLock::new(base),
            path: Some(path),
        })
    }

    /// Snapshot copy of the whole document for readers.
    pub fn snapshot(&self) -> KnowledgeBase {
        self.inner.read().clone()
    }

    /// Look up a learned mapping for an element.
    ///
    /// Order: exact field-key match above 0.6 confidence, then the platform
    /// overlay, then pattern-token match above 0.7, then miss.
    pub fn lookup(&self, element: &ElementRecord, platform: Option<Platform>) -> Option<FieldMapping> {
        let features = FieldFeatures::extract(element);
        let key = features.field_key();
        let base = self.inner.read();

        if let Some(mapping) = base.field_mappings.get(&key) {
            if mapping.confidence > 0.6 {
                return Some(mapping.clone());
            }
        }

        if let Some(platform) = platform {
            if let Some(overlay) = base.platform_specific.get(platform.as_str()) {
                if let Some(mapping) = overlay.get(&key) {
                    return Some(mapping.clone());
                }
            }
        }

        for pattern in &features.patterns {
            for mapping in base.field_mappings.values() {
                if mapping.confidence > 0.7 && mapping.patterns.iter().any(|p| p == pattern) {
                    return Some(mapping.clone());
                }
            }
        }

        None
    }

    /// Record one observed (element, value) pair and update confidence.
    ///
    /// Confidence grows with example count and value consistency:
    /// `min(0.95, 0.5 + 0.1 * n + 0.3 * consistency)` where consistency is
    /// `1 - (unique - 1) / n` once there is more than one example.
    pub fn record(
        &self,
        element: &ElementRecord,
        semantic: &str,
        data_path: &str,
        value: &str,
        context: serde_json::Value,
    ) -> FieldMapping {
        let features = FieldFeatures::extract(element);
        let key = features.field_key();
        let mut base = self.inner.write();

        let mapping = base
            .field_mappings
            .entry(key.clone())
            .or_insert_with(|| FieldMapping {
                semantic: semantic.to_string(),
                data_path: data_path.to_string(),
                patterns: features.patterns.clone(),
                examples: Vec::new(),
                confidence: 0.5,
                extra: Default::default(),
            });

        mapping.examples.push(MappingExample {
            value: value.to_string(),
            context: context.clone(),
            timestamp: Utc::now().to_rfc3339(),
        });

        let n = mapping.examples.len();
        let unique = mapping
            .examples
            .iter()
            .map(|e| e.value.as_str())
            .collect::<std::collections::BTreeSet<_>>()
            .len();
        let consistency = if n > 1 {
            1.0 - (unique as f64 - 1.0) / n as f64
        } else {
            0.5
        };
        mapping.confidence = (0.5 + 0.1 * n as f64 + 0.3 * consistency).min(0.95);
        mapping.confidence = (mapping.confidence * 100.0).round() / 100.0;
        let updated = mapping.clone();

        base.confidence_scores.insert(key.clone(), updated.confidence);
        base.learning_history.push(HistoryEntry {
            field_key: key.clone(),
            semantic: semantic.to_string(),
            value: value.to_string(),
            context,
            timestamp: Utc::now().to_rfc3339(),
        });
        if base.learning_history.len() > HISTORY_CAP {
            let overflow = base.learning_history.len() - HISTORY_CAP;
            base.learning_history.drain(..overflow);
        }

        debug!(field_key = %key, confidence = updated.confidence, "recorded field mapping");
        updated
    }

    /// Persist to the backing file (or `path` when given one explicitly).
    pub fn export(&self, path: Option<&Path>) -> Result<(), StoreError> {
        let target = match path.or(self.path.as_deref()) {
            Some(p) => p.to_path_buf(),
            None => return Ok(()),
        };
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: target.display().to_string(),
                source,
            })?;
        }
        let base = self.inner.read();
        let text = serde_json::to_string_pretty(&*base)?;
        std::fs::write(&target, text).map_err(|source| StoreError::Io {
            path: target.display().to_string(),
            source,
        })?;
        info!(path = %target.display(), mappings = base.field_mappings.len(), "knowledge base exported");
        Ok(())
    }

    /// Known field names and operator tips for a platform.
    pub fn platform_insights(&self, platform: Platform) -> PlatformInsights {
        let known_fields: Vec<&'static str> = match platform {
            Platform::Greenhouse => vec![
                "resume",
                "cover_letter",
                "linkedin",
                "github",
                "portfolio",
                "work_authorization",
                "sponsorship",
                "salary",
                "start_date",
            ],
            Platform::Lever => vec![
                "resume",
                "full_name",
                "email",
                "phone",
                "current_company",
                "linkedin",
                "website",
                "additional_info",
            ],
            Platform::Workday => vec![
                "legal_name",
                "preferred_name",
                "country",
                "state",
                "city",
                "postal_code",
                "education_level",
                "field_of_study",
                "gpa",
            ],
            _ => Vec::new(),
        };
        let tips: Vec<&'static str> = match platform {
            Platform::Greenhouse => vec![
                "Greenhouse often uses custom question ids like 'question_XXXXXXX'",
                "Resume upload is usually required",
                "Look for work authorization questions",
            ],
            Platform::Lever => vec![
                "Lever typically groups fields by section",
                "Additional information field is common",
                "URLs section may include multiple links",
            ],
            Platform::Workday => vec![
                "Workday has multi-step forms",
                "Legal name vs preferred name distinction",
                "Detailed address requirements",
            ],
            _ => Vec::new(),
        };
        PlatformInsights {
            platform,
            known_fields: known_fields.into_iter().map(String::from).collect(),
            tips: tips.into_iter().map(String::from).collect(),
        }
    }
}

/// Platform-specific knowledge surfaced to prompts and logs.
#[derive(Clone, Debug, serde::Serialize)]
pub struct PlatformInsights {
    pub platform: Platform,
    pub known_fields: Vec<String>,
    pub tips: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn element(label: &str, id: &str) -> ElementRecord {
        ElementRecord {
            label: label.into(),
            id: id.into(),
            ..Default::default()
        }
    }

    #[test]
    fn confidence_is_monotonic_and_bounded_for_consistent_examples() {
        let store = LearningStore::in_memory();
        let el = element("First Name", "first_name");
        let mut last = 0.0;
        for _ in 0..12 {
            let mapping = store.record(&el, "first_name", "basic_info.first_name", "Ada", json!({}));
            assert!(mapping.confidence >= last);
            assert!(mapping.confidence <= 0.95);
            last = mapping.confidence;
        }
        assert_eq!(last, 0.95);
    }

    #[test]
    fn inconsistent_examples_lower_consistency() {
        let store = LearningStore::in_memory();
        let el = element("Nickname", "nick");
        store.record(&el, "nickname", "custom.nick", "Ada", json!({}));
        let spread = store.record(&el, "nickname", "custom.nick", "Grace", json!({}));
        let consistent_store = LearningStore::in_memory();
        consistent_store.record(&el, "nickname", "custom.nick", "Ada", json!({}));
        let consistent = consistent_store.record(&el, "nickname", "custom.nick", "Ada", json!({}));
        assert!(spread.confidence < consistent.confidence);
    }

    #[test]
    fn lookup_requires_confidence_threshold() {
        let store = LearningStore::in_memory();
        let el = element("Obscure Question", "q1");
        store.record(&el, "custom", "custom.q1", "x", json!({}));
        // one example: confidence 0.5 + 0.1 + 0.15 = 0.75 > 0.6
        assert!(store.lookup(&el, None).is_some());

        let weak = LearningStore::in_memory();
        assert!(weak.lookup(&el, None).is_none());
    }

    #[test]
    fn export_then_open_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kb.json");
        let store = LearningStore::open(&path).unwrap();
        let el = element("Email", "email");
        let recorded = store.record(&el, "email", "basic_info.email", "a@b.c", json!({"platform": "lever"}));
        store.export(None).unwrap();

        let reopened = LearningStore::open(&path).unwrap();
        let found = reopened.lookup(&el, None).expect("mapping survives reload");
        assert_eq!(found.semantic, "email");
        assert_eq!(found.confidence, recorded.confidence);
    }

    #[test]
    fn unknown_keys_survive_a_rewrite() {
        let text = r#"{
            "field_mappings": {},
            "platform_specific": {},
            "learning_history": [],
            "confidence_scores": {},
            "vendor_extension": {"keep": true}
        }"#;
        let base: KnowledgeBase = serde_json::from_str(text).unwrap();
        let rewritten = serde_json::to_value(&base).unwrap();
        assert_eq!(rewritten["vendor_extension"]["keep"], true);
    }

    #[test]
    fn history_is_capped_newest_last() {
        let store = LearningStore::in_memory();
        let el = element("Field", "f");
        for i in 0..(HISTORY_CAP + 10) {
            store.record(&el, "custom", "custom.f", &format!("v{i}"), json!({}));
        }
        let snapshot = store.snapshot();
        assert_eq!(snapshot.learning_history.len(), HISTORY_CAP);
        assert_eq!(
            snapshot.learning_history.last().unwrap().value,
            format!("v{}", HISTORY_CAP + 9)
        );
    }

    #[test]
    fn platform_insights_list_known_fields() {
        let store = LearningStore::in_memory();
        let insights = store.platform_insights(Platform::Workday);
        assert!(insights.known_fields.contains(&"legal_name".to_string()));
        assert!(!insights.tips.is_empty());
        assert!(store
            .platform_insights(Platform::Unknown)
            .known_fields
            .is_empty());
    }
}
