//! Rule-table fallback mapping.
//!
//! Used when the LLM call fails, rate-limits, or returns a non-array. An
//! ordered keyword table is applied to the union of each element's text
//! attributes; hits carry confidence 0.7.

use applyflow_core_types::{Action, ControlKind, ElementRecord};
use profile_store::CandidateProfile;
use tracing::debug;

pub const FALLBACK_CONFIDENCE: f64 = 0.7;

/// (keywords that must all appear, semantic path, forced control kind)
const RULES: &[(&[&str], &str, Option<ControlKind>)] = &[
    (&["first", "name"], "basic_info.first_name", None),
    (&["last", "name"], "basic_info.last_name", None),
    (&["email"], "basic_info.email", None),
    (&["phone"], "basic_info.phone", None),
    (&["linkedin"], "basic_info.linkedin", None),
    (&["github"], "basic_info.github", None),
    (&["portfolio"], "basic_info.portfolio", None),
    (&["website"], "basic_info.website", None),
    (
        &["authorized", "work"],
        "legal_status.work_authorization",
        None,
    ),
    (&["resume"], "files.resume.file_path", Some(ControlKind::File)),
    (&["cv"], "files.resume.file_path", Some(ControlKind::File)),
    (&["upload"], "files.resume.file_path", Some(ControlKind::File)),
];

/// Apply the keyword table to a slice of elements.
pub fn fallback_actions(elements: &[ElementRecord], profile: &CandidateProfile) -> Vec<Action> {
    let mut actions = Vec::new();
    for element in elements {
        let selector = match element.selector() {
            Some(selector) => selector,
            None => continue,
        };
        let text = element.descriptive_text();

        for (keywords, data_path, forced_kind) in RULES {
            if !keywords.iter().all(|keyword| text.contains(keyword)) {
                continue;
            }
            let value = match profile.get(data_path) {
                Some(value) => value,
                None => break,
            };
            let control = forced_kind.unwrap_or(element.control);
            debug!(selector = %selector, data_path, "rule fallback hit");
            actions.push(
                Action::new(selector, control, value)
                    .with_semantic((*data_path).to_string())
                    .with_confidence(FALLBACK_CONFIDENCE),
            );
            break;
        }
    }
    actions
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> CandidateProfile {
        CandidateProfile::from_yaml_str(
            r#"
basic_info:
  first_name: Ada
  last_name: Lovelace
  email: ada@example.com
  phone: "3105551234"
  linkedin: https://linkedin.com/in/ada
legal_status:
  work_authorization: "yes"
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

    #[test]
    fn keyword_rules_map_common_fields() {
        let elements = vec![
            element("first_name", "First Name", ControlKind::Text),
            element("last_name", "Last Name", ControlKind::Text),
            element("email", "Email Address", ControlKind::Email),
            element("phone", "Phone", ControlKind::Tel),
            element("resume", "Upload Resume", ControlKind::File),
        ];
        let actions = fallback_actions(&elements, &profile());
        assert_eq!(actions.len(), 5);
        assert_eq!(actions[0].value, "Ada");
        assert_eq!(actions[3].value, "(310) 555-1234");
        assert_eq!(actions[4].control, ControlKind::File);
        assert_eq!(actions[4].value, "/tmp/resume.pdf");
        assert!(actions.iter().all(|a| a.confidence == FALLBACK_CONFIDENCE));
    }

    #[test]
    fn authorization_rule_needs_both_keywords() {
        let elements = vec![element(
            "q1",
            "Are you authorized to work in the US?",
            ControlKind::Radio,
        )];
        let actions = fallback_actions(&elements, &profile());
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].value, "Yes");
        assert_eq!(actions[0].control, ControlKind::Radio);
    }

    #[test]
    fn elements_without_profile_values_are_skipped() {
        let elements = vec![element("github", "GitHub profile", ControlKind::Url)];
        let actions = fallback_actions(&elements, &profile());
        assert!(actions.is_empty());
    }

    #[test]
    fn unaddressable_elements_are_skipped() {
        let elements = vec![ElementRecord {
            label: "Email".into(),
            control: ControlKind::Email,
            ..Default::default()
        }];
        assert!(fallback_actions(&elements, &profile()).is_empty());
    }
}
