//! Semantic field mapping.
//!
//! For each logical group the mapper short-circuits through the learning
//! store, sends the remaining elements with a projected candidate profile
//! to the LLM, validates the returned actions against the schema layer, and
//! falls back to the keyword rule table when the model is unavailable.
//! Large groups are chunked; results are union-merged by selector, first
//! mapping wins.

mod rules;

use std::collections::HashSet;

use serde_json::{json, Value};
use tracing::{debug, info, warn};

use applyflow_core_types::{Action, ControlKind, ElementRecord, LogicalGroup, Platform};
use learning_store::LearningStore;
use llm_gateway::{actions_from_value, field_mapping_user, LlmProvider, FIELD_MAPPING_SYSTEM};
use profile_store::CandidateProfile;

pub use rules::{fallback_actions, FALLBACK_CONFIDENCE};

/// Above this element count a group is sent in chunks.
const CHUNK_THRESHOLD: usize = 30;
const CHUNK_SIZE: usize = 20;

pub struct FieldMapper<'a> {
    provider: &'a dyn LlmProvider,
    profile: &'a CandidateProfile,
    learning: &'a LearningStore,
}

impl<'a> FieldMapper<'a> {
    pub fn new(
        provider: &'a dyn LlmProvider,
        profile: &'a CandidateProfile,
        learning: &'a LearningStore,
    ) -> Self {
        Self {
            provider,
            profile,
            learning,
        }
    }

    /// Map every group to actions. Never errors: groups the LLM cannot
    /// handle degrade to rule-table mapping.
    pub async fn map_groups(&self, groups: &[LogicalGroup], platform: Platform) -> Vec<Action> {
        let mut merged: Vec<Action> = Vec::new();
        let mut taken_selectors: HashSet<String> = HashSet::new();

        for group in groups {
            let actions = self.map_group(group, platform).await;
            for action in actions {
                // Union-merge by selector: the first mapping wins.
                if taken_selectors.insert(action.selector.clone()) {
                    merged.push(action);
                }
            }
        }

        info!(
            groups = groups.len(),
            actions = merged.len(),
            "field mapping complete"
        );
        merged
    }

    async fn map_group(&self, group: &LogicalGroup, platform: Platform) -> Vec<Action> {
        let (mut actions, remaining) = self.learned_actions(&group.elements, platform);
        if !actions.is_empty() {
            debug!(
                group = %group.name,
                learned = actions.len(),
                "learned mappings short-circuited"
            );
        }
        if remaining.is_empty() {
            return actions;
        }

        if remaining.len() > CHUNK_THRESHOLD {
            info!(
                group = %group.name,
                elements = remaining.len(),
                "large group; mapping in chunks"
            );
            for chunk in remaining.chunks(CHUNK_SIZE) {
                actions.extend(self.map_elements(&group.name, chunk).await);
            }
        } else {
            actions.extend(self.map_elements(&group.name, &remaining).await);
        }
        actions
    }

    /// Resolve elements the learning store already knows with confidence.
    fn learned_actions(
        &self,
        elements: &[ElementRecord],
        platform: Platform,
    ) -> (Vec<Action>, Vec<ElementRecord>) {
        let platform = (platform != Platform::Unknown).then_some(platform);
        let mut actions = Vec::new();
        let mut remaining = Vec::new();

        for element in elements {
            let learned = self
                .learning
                .lookup(element, platform)
                .and_then(|mapping| {
                    let selector = element.selector()?;
                    let value = self.profile.get(&mapping.data_path)?;
                    Some(
                        Action::new(selector, element.control, value)
                            .with_semantic(mapping.data_path.clone())
                            .with_confidence(mapping.confidence),
                    )
                });
            match learned {
                Some(action) => actions.push(action),
                None => remaining.push(element.clone()),
            }
        }
        (actions, remaining)
    }

    async fn map_elements(&self, group_name: &str, elements: &[ElementRecord]) -> Vec<Action> {
        let prompt = field_mapping_user(
            group_name,
            &minimized_elements(elements),
            &self.profile.projection().to_value(),
        );

        let reply = match self.provider.complete_json(FIELD_MAPPING_SYSTEM, &prompt).await {
            Ok(reply) => reply,
            Err(err) => {
                warn!(group = group_name, error = %err, "LLM mapping failed; using rule fallback");
                return fallback_actions(elements, self.profile);
            }
        };

        let mut actions = actions_from_value(&reply);
        if actions.is_empty() {
            warn!(group = group_name, "LLM returned no usable actions; using rule fallback");
            return fallback_actions(elements, self.profile);
        }

        self.postprocess(&mut actions);
        actions
    }

    /// Re-inject the resume path for file actions the model left empty, and
    /// drop file actions when no resume is configured.
    fn postprocess(&self, actions: &mut Vec<Action>) {
        let resume_path = self.profile.resume_path();
        actions.retain_mut(|action| {
            if action.control != ControlKind::File {
                return true;
            }
            if action.value.trim().is_empty() || !action.value.contains('/') {
                match &resume_path {
                    Some(path) => {
                        action.value = path.clone();
                        true
                    }
                    None => false,
                }
            } else {
                true
            }
        });
    }

    /// Generate a short tailored cover letter, with a deterministic
    /// fallback when the model is unavailable.
    pub async fn generate_cover_letter(&self, job_title: &str, company: &str) -> String {
        let candidate = self.profile.projection().to_value();
        let prompt = llm_gateway::cover_letter_user(job_title, company, &candidate);
        match self
            .provider
            .complete_text(llm_gateway::COVER_LETTER_SYSTEM, &prompt)
            .await
        {
            Ok(text) if !text.trim().is_empty() => text,
            _ => {
                warn!("cover letter generation failed; using fallback template");
                let title = self
                    .profile
                    .get("work_info.current_title")
                    .unwrap_or_else(|| "software engineer".to_string());
                format!(
                    "I am writing to express my strong interest in the {job_title} position at \
                     {company}. With my experience as a {title}, I am confident in my ability to \
                     contribute to your team. I look forward to discussing how my background can \
                     benefit {company}. Thank you for your consideration."
                )
            }
        }
    }
}

/// The minimized element view the prompt carries: enough to identify the
/// field, nothing that wastes tokens.
fn minimized_elements(elements: &[ElementRecord]) -> Value {
    let list: Vec<Value> = elements
        .iter()
        .map(|el| {
            let mut entry = json!({
                "tag": el.tag,
                "control": el.control.as_str(),
                "id": el.id,
                "name": el.name,
                "label": el.label,
                "placeholder": el.placeholder,
                "aria_label": el.aria_label,
                "visible": el.visible,
            });
            if !el.options.is_empty() {
                entry["options"] = json!(el
                    .options
                    .iter()
                    .map(|o| o.text.clone())
                    .collect::<Vec<_>>());
            }
            if el.control == ControlKind::Radio || el.control == ControlKind::Checkbox {
                entry["value"] = json!(el.value);
                entry["checked"] = json!(el.checked);
            }
            if el.is_custom_dropdown {
                entry["is_custom_dropdown"] = json!(true);
            }
            entry
        })
        .collect();
    Value::Array(list)
}

#[cfg(test)]
mod tests {
    use super::*;
    use llm_gateway::MockProvider;
    use serde_json::json;

    fn profile() -> CandidateProfile {
        CandidateProfile::from_yaml_str(
            r#"
basic_info:
  first_name: Ada
  last_name: Lovelace
  email: ada@example.com
  phone: "3105551234"
files:
  resume:
    file_path: /tmp/resume.pdf
"#,
        )
        .unwrap()
    }

    fn element(id: &str, label: &str, control: ControlKind) -> ElementRecord {
        ElementRecord {
            id: id.into(),
            label: label.into(),
            control,
            ..Default::default()
        }
    }

    fn group(name: &str, elements: Vec<ElementRecord>) -> LogicalGroup {
        LogicalGroup {
            name: name.into(),
            elements,
        }
    }

    #[tokio::test]
    async fn llm_actions_pass_through_with_resume_injection() {
        let mock = MockProvider::new();
        mock.push_json(json!([
            {"selector": "#first_name", "control": "text", "value": "Ada", "semantic": "basic_info.first_name", "confidence": 0.95},
            {"selector": "#resume", "control": "file", "value": "", "semantic": "files.resume.file_path"}
        ]));
        let profile = profile();
        let learning = LearningStore::in_memory();
        let mapper = FieldMapper::new(&mock, &profile, &learning);

        let groups = vec![group(
            "default",
            vec![
                element("first_name", "First Name", ControlKind::Text),
                element("resume", "Upload Resume", ControlKind::File),
            ],
        )];
        let actions = mapper.map_groups(&groups, Platform::Greenhouse).await;
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[1].value, "/tmp/resume.pdf");
    }

    #[tokio::test]
    async fn llm_failure_falls_back_to_rules() {
        let mock = MockProvider::new();
        mock.push_failure("rate limited");
        let profile = profile();
        let learning = LearningStore::in_memory();
        let mapper = FieldMapper::new(&mock, &profile, &learning);

        let groups = vec![group(
            "default",
            vec![
                element("first_name", "First Name", ControlKind::Text),
                element("email", "Email", ControlKind::Email),
            ],
        )];
        let actions = mapper.map_groups(&groups, Platform::Unknown).await;
        assert_eq!(actions.len(), 2);
        assert!(actions.iter().all(|a| a.confidence == FALLBACK_CONFIDENCE));
    }

    #[tokio::test]
    async fn non_array_reply_falls_back_to_rules() {
        let mock = MockProvider::new();
        mock.push_json(json!({"unexpected": "shape"}));
        let profile = profile();
        let learning = LearningStore::in_memory();
        let mapper = FieldMapper::new(&mock, &profile, &learning);

        let groups = vec![group(
            "default",
            vec![element("email", "Email", ControlKind::Email)],
        )];
        let actions = mapper.map_groups(&groups, Platform::Unknown).await;
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].value, "ada@example.com");
    }

    #[tokio::test]
    async fn merge_is_first_wins_by_selector() {
        let mock = MockProvider::new();
        mock.push_json(json!([
            {"selector": "#email", "control": "email", "value": "ada@example.com", "confidence": 0.9}
        ]));
        mock.push_json(json!([
            {"selector": "#email", "control": "email", "value": "other@example.com", "confidence": 0.4}
        ]));
        let profile = profile();
        let learning = LearningStore::in_memory();
        let mapper = FieldMapper::new(&mock, &profile, &learning);

        let groups = vec![
            group("a", vec![element("email", "Email", ControlKind::Email)]),
            group("b", vec![element("email", "Email", ControlKind::Email)]),
        ];
        let actions = mapper.map_groups(&groups, Platform::Unknown).await;
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].value, "ada@example.com");
    }

    #[tokio::test]
    async fn learned_mappings_short_circuit_the_llm() {
        let mock = MockProvider::new(); // no replies queued: any LLM call would fail
        let profile = profile();
        let learning = LearningStore::in_memory();
        let el = element("email", "Email", ControlKind::Email);
        // Two consistent examples push confidence past the lookup threshold.
        learning.record(&el, "email", "basic_info.email", "ada@example.com", json!({}));
        learning.record(&el, "email", "basic_info.email", "ada@example.com", json!({}));

        let mapper = FieldMapper::new(&mock, &profile, &learning);
        let groups = vec![group("default", vec![el])];
        let actions = mapper.map_groups(&groups, Platform::Unknown).await;
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].semantic.as_deref(), Some("basic_info.email"));
        assert!(actions[0].confidence > 0.6);
    }

    #[tokio::test]
    async fn cover_letter_falls_back_without_llm() {
        let mock = MockProvider::new();
        mock.push_failure("down");
        let profile = profile();
        let learning = LearningStore::in_memory();
        let mapper = FieldMapper::new(&mock, &profile, &learning);

        let letter = mapper.generate_cover_letter("Engineer", "Acme").await;
        assert!(letter.contains("Acme"));
        assert!(letter.contains("Engineer"));
    }
}
