//! Analyzer behavior against messy model output: markdown fences, trailing
//! commas, confidence on the wrong scale, inconsistent classifications, and
//! irrecoverable garbage.

use applyflow_core_types::{PageKind, RecommendedKind};
use llm_gateway::{repair_page_analysis, sanitize_json};

#[test]
fn fenced_json_with_trailing_commas_repairs_cleanly() {
    let reply = r##"```json
{
    "page_type": "form_page",
    "confidence": 0.9,
    "form_count": 1,
    "has_apply_button": false,
    "reasoning": "standalone application form",
    "cta_candidates": [],
    "recommended_action": {
        "action_type": "fill_form",
        "confidence": 0.85,
        "reasoning": "form fields present",
        "form_selector": "#application",
        "priority": 9,
    },
}
```"##;

    let value = sanitize_json(reply).expect("repairable document");
    let analysis = repair_page_analysis(&value, "https://jobs.lever.co/acme/1", "Acme - Engineer");
    assert_eq!(analysis.page_kind, PageKind::FormPage);
    assert_eq!(analysis.recommended_action.kind, RecommendedKind::FillForm);
    assert_eq!(analysis.confidence, 0.9);
}

#[test]
fn irrecoverable_reply_degrades_to_wait_for_human() {
    assert!(sanitize_json("I could not analyze this page, sorry!").is_none());

    // The caller substitutes the typed default in that case.
    let analysis = applyflow_core_types::PageAnalysis::unknown(
        "https://x",
        "t",
        "analysis failed: unusable reply",
    );
    assert_eq!(analysis.page_kind, PageKind::Unknown);
    assert_eq!(
        analysis.recommended_action.kind,
        RecommendedKind::WaitForHuman
    );
    assert_eq!(analysis.form_count, 0);
    assert!(analysis.cta_candidates.is_empty());
}

#[test]
fn job_detail_with_two_forms_is_reclassified_and_never_clicks() {
    let reply = serde_json::json!({
        "page_type": "job_detail",
        "confidence": 0.75,
        "form_count": 2,
        "has_apply_button": true,
        "reasoning": "posting with embedded application",
        "cta_candidates": [{
            "text": "Apply now",
            "selector": "#apply-button",
            "confidence": 8,
            "element_type": "button",
            "priority_score": 10
        }],
        "recommended_action": {
            "action_type": "click_cta",
            "confidence": 0.9,
            "reasoning": "apply button is prominent",
            "target_element": "#apply-button",
            "priority": 10
        }
    });

    let analysis = repair_page_analysis(&reply, "https://boards.greenhouse.io/acme/1", "Acme");
    assert_eq!(analysis.page_kind, PageKind::JobDetailWithForm);
    assert_ne!(analysis.recommended_action.kind, RecommendedKind::ClickCta);
    // Out-of-range CTA confidence was rescaled into [0, 1].
    assert_eq!(analysis.cta_candidates[0].confidence, 0.8);
}

#[test]
fn consistency_rules_hold_for_any_repaired_output() {
    let samples = [
        serde_json::json!({}),
        serde_json::json!({"page_type": "nonsense", "confidence": 42}),
        serde_json::json!({
            "page_type": "form_page",
            "form_count": 0,
            "has_apply_button": true,
            "cta_candidates": [],
            "recommended_action": {"action_type": "fill_form", "confidence": 0.9, "reasoning": "x", "priority": 3}
        }),
    ];

    for sample in samples {
        let analysis = repair_page_analysis(&sample, "https://x", "t");
        // Form-bearing kinds imply forms.
        if analysis.page_kind.expects_form() {
            assert!(analysis.form_count > 0);
        }
        // An apply button implies candidates.
        if analysis.has_apply_button {
            assert!(!analysis.cta_candidates.is_empty());
        }
        // Confidences are in range.
        assert!((0.0..=1.0).contains(&analysis.confidence));
        for cta in &analysis.cta_candidates {
            assert!((0.0..=1.0).contains(&cta.confidence));
            assert!((1..=10).contains(&cta.priority_score));
        }
        // fill_form only with forms.
        if analysis.recommended_action.kind == RecommendedKind::FillForm {
            assert!(analysis.form_count > 0);
        }
    }
}
