//! Persistence round-trips: candidate profile and learning store survive a
//! write/read cycle with values and confidences intact.

use applyflow_core_types::{ElementRecord, Platform};
use learning_store::LearningStore;
use profile_store::CandidateProfile;
use serde_json::json;

#[test]
fn profile_round_trip_is_bit_identical_for_recognized_fields() {
    let source = r#"
basic_info:
  first_name: Ada
  last_name: Lovelace
  email: ada@example.com
  phone: "3105551234"
location:
  country: United States
  state: California
legal_status:
  work_authorization: "yes"
preferences:
  salary_expectation: "120000"
files:
  resume:
    file_path: /tmp/resume.pdf
"#;
    let profile = CandidateProfile::from_yaml_str(source).unwrap();
    let reloaded = CandidateProfile::from_yaml_str(&profile.to_yaml_string()).unwrap();

    for path in [
        "basic_info.first_name",
        "basic_info.last_name",
        "basic_info.email",
        "basic_info.phone",
        "location.country",
        "location.state",
        "legal_status.work_authorization",
        "preferences.salary_expectation",
        "files.resume.file_path",
    ] {
        assert_eq!(profile.raw_string(path), reloaded.raw_string(path), "{path}");
    }
}

#[test]
fn learning_store_export_import_preserves_mappings_and_confidence() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("kb.json");

    let element = ElementRecord {
        label: "Are you authorized to work in the United States?".into(),
        id: "work_auth".into(),
        ..Default::default()
    };

    let store = LearningStore::open(&path).unwrap();
    let mut final_confidence = 0.0;
    for _ in 0..3 {
        let mapping = store.record(
            &element,
            "work_authorization",
            "legal_status.work_authorization",
            "Yes",
            json!({"platform": "greenhouse"}),
        );
        assert!(mapping.confidence >= final_confidence, "monotonic");
        final_confidence = mapping.confidence;
    }
    assert!(final_confidence <= 0.95);
    store.export(None).unwrap();

    let reloaded = LearningStore::open(&path).unwrap();
    let found = reloaded
        .lookup(&element, Some(Platform::Greenhouse))
        .expect("mapping survives reload");
    assert_eq!(found.data_path, "legal_status.work_authorization");
    assert_eq!(found.confidence, final_confidence);
    assert_eq!(found.examples.len(), 3);
}

#[test]
fn normalization_examples_from_the_contract() {
    assert_eq!(profile_store::format_phone("3105551234"), "(310) 555-1234");
    assert_eq!(profile_store::format_salary("120000"), "120,000");
    assert_eq!(profile_store::normalize_boolean("yes"), "Yes");
}
