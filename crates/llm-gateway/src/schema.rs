//! Schema constraints for LLM outputs and the repair pass that enforces
//! them.
//!
//! The constraints mirror the prompt contracts: closed enums for page and
//! action kinds, confidence in [0, 1] (scores in [1, 10] are rescaled),
//! priority in [1, 10], a small whitelist for CTA element types, snake_case
//! semantic keys, and the page-shape consistency rules. Repairing an
//! already-valid document is the identity.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

use applyflow_core_types::{
    Action, ControlKind, CtaCandidate, PageAnalysis, PageKind, RecommendedAction, RecommendedKind,
};

static SEMANTIC_KEY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z][a-z0-9_.]*$").unwrap());

const VALID_ELEMENT_TYPES: [&str; 6] = ["button", "a", "input", "submit", "div", "span"];
const MAX_CTA_CANDIDATES: usize = 10;

/// Build a `PageAnalysis` from a raw (already JSON-parsed) LLM document,
/// repairing what can be repaired and defaulting the rest.
pub fn repair_page_analysis(raw: &Value, url: &str, title: &str) -> PageAnalysis {
    let obj = match raw.as_object() {
        Some(obj) => obj,
        None => return PageAnalysis::unknown(url, title, "analysis document is not an object"),
    };

    let page_kind = obj
        .get("page_type")
        .or_else(|| obj.get("page_kind"))
        .and_then(Value::as_str)
        .and_then(PageKind::parse)
        .unwrap_or(PageKind::Unknown);

    let confidence = repair_confidence(obj.get("confidence"));
    let form_count = obj
        .get("form_count")
        .and_then(Value::as_u64)
        .unwrap_or(0) as u32;
    let mut has_apply_button = obj
        .get("has_apply_button")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let reasoning = obj
        .get("reasoning")
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .unwrap_or("No reasoning provided")
        .to_string();

    let mut cta_candidates: Vec<CtaCandidate> = obj
        .get("cta_candidates")
        .and_then(Value::as_array)
        .map(|list| list.iter().filter_map(repair_cta_candidate).collect())
        .unwrap_or_default();
    cta_candidates.sort_by(|a, b| a.ranking(b));
    cta_candidates.truncate(MAX_CTA_CANDIDATES);

    let recommended_action = obj
        .get("recommended_action")
        .map(repair_recommended_action)
        .unwrap_or_else(|| RecommendedAction::wait_for_human("No action recommendation provided"));

    // Apply-button claim must agree with the candidate list.
    if has_apply_button && cta_candidates.is_empty() {
        debug!("repair: apply button claimed without CTA candidates");
        has_apply_button = false;
    }

    let mut analysis = PageAnalysis {
        page_kind,
        confidence,
        url: url.to_string(),
        title: title.to_string(),
        form_count,
        has_apply_button,
        cta_candidates,
        reasoning,
        recommended_action,
    };
    enforce_consistency(&mut analysis);
    analysis
}

/// Page-shape consistency rules from the analysis contract.
fn enforce_consistency(analysis: &mut PageAnalysis) {
    // A job-detail page that actually carries forms is a job detail with
    // form; a form-bearing kind without forms is just a job detail.
    if analysis.form_count > 0 && analysis.page_kind == PageKind::JobDetail {
        analysis.page_kind = PageKind::JobDetailWithForm;
    }
    if analysis.form_count == 0 && analysis.page_kind.expects_form() {
        analysis.page_kind = PageKind::JobDetail;
    }

    let action = &mut analysis.recommended_action;
    match action.kind {
        RecommendedKind::FillForm => {
            if analysis.form_count == 0 {
                warn!("repair: fill_form recommended without forms");
                *action = RecommendedAction::wait_for_human("fill_form recommended on a page without forms");
            } else {
                action.target_element = None;
            }
        }
        RecommendedKind::ClickCta => {
            // Never click past a page that already has the form.
            if analysis.form_count > 0 && analysis.page_kind.expects_form() {
                warn!("repair: click_cta recommended although a form is present");
                *action =
                    RecommendedAction::wait_for_human("click_cta recommended although a form is present");
            } else if action.target_element.is_none() {
                match analysis.cta_candidates.first() {
                    Some(best) => action.target_element = Some(best.selector.clone()),
                    None => {
                        *action = RecommendedAction::wait_for_human(
                            "click_cta recommended without any CTA candidate",
                        )
                    }
                }
            }
            if action.kind == RecommendedKind::ClickCta {
                action.form_selector = None;
            }
        }
        _ => {
            action.target_element = None;
            action.form_selector = None;
        }
    }
}

fn repair_recommended_action(raw: &Value) -> RecommendedAction {
    let obj = match raw.as_object() {
        Some(obj) => obj,
        None => return RecommendedAction::wait_for_human("invalid action recommendation"),
    };

    let kind = obj
        .get("action_type")
        .or_else(|| obj.get("kind"))
        .and_then(Value::as_str)
        .and_then(RecommendedKind::parse)
        .unwrap_or(RecommendedKind::WaitForHuman);

    RecommendedAction {
        kind,
        confidence: repair_confidence(obj.get("confidence")),
        reasoning: obj
            .get("reasoning")
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .unwrap_or("No reasoning provided")
            .to_string(),
        target_element: non_empty_string(obj.get("target_element")),
        form_selector: non_empty_string(obj.get("form_selector")),
        priority: repair_priority(obj.get("priority")),
    }
}

fn repair_cta_candidate(raw: &Value) -> Option<CtaCandidate> {
    let obj = raw.as_object()?;
    let text = non_empty_string(obj.get("text"))?;
    let selector = non_empty_string(obj.get("selector"))?;

    let element_type = obj
        .get("element_type")
        .and_then(Value::as_str)
        .filter(|t| VALID_ELEMENT_TYPES.contains(t))
        .unwrap_or("button")
        .to_string();

    Some(CtaCandidate {
        text,
        selector,
        confidence: repair_confidence(obj.get("confidence")),
        element_type,
        priority_score: repair_priority(obj.get("priority_score")),
    })
}

/// Confidence in [0, 1]; values in (1, 10] are priority-style scores the
/// model mixed up and are divided by 10; anything else collapses to 0.
fn repair_confidence(raw: Option<&Value>) -> f64 {
    let value = raw.and_then(Value::as_f64).unwrap_or(0.0);
    if (0.0..=1.0).contains(&value) {
        value
    } else if (1.0..=10.0).contains(&value) {
        value / 10.0
    } else {
        0.0
    }
}

fn repair_priority(raw: Option<&Value>) -> i32 {
    let value = raw.and_then(Value::as_i64).unwrap_or(1);
    if (1..=10).contains(&value) {
        value as i32
    } else {
        1
    }
}

fn non_empty_string(raw: Option<&Value>) -> Option<String> {
    raw.and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Extract validated actions from a mapping reply.
///
/// Accepts a bare array or an object carrying `actions`; entries failing the
/// schema (empty selector, unknown control kind, bad semantic key, missing
/// value on a non-checkbox) are discarded.
pub fn actions_from_value(raw: &Value) -> Vec<Action> {
    let list = match raw {
        Value::Array(list) => list.as_slice(),
        Value::Object(obj) => match obj.get("actions").and_then(Value::as_array) {
            Some(list) => list.as_slice(),
            None => return Vec::new(),
        },
        _ => return Vec::new(),
    };

    list.iter().filter_map(action_from_value).collect()
}

fn action_from_value(raw: &Value) -> Option<Action> {
    let obj = raw.as_object()?;
    let selector = non_empty_string(obj.get("selector"))?;
    let control = obj
        .get("control")
        .or_else(|| obj.get("control_type"))
        .and_then(Value::as_str)
        .and_then(ControlKind::parse)?;
    let value = match obj.get("value") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(b)) => if *b { "Yes" } else { "No" }.to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    };

    let semantic = non_empty_string(obj.get("semantic"))
        .filter(|s| SEMANTIC_KEY.is_match(s));
    let confidence = match obj.get("confidence") {
        Some(v) => repair_confidence(Some(v)),
        None => 0.5,
    };

    let mut action = Action::new(selector, control, value).with_confidence(confidence);
    if let Some(semantic) = semantic {
        action = action.with_semantic(semantic);
    }
    action.is_valid().then_some(action)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_analysis_doc() -> Value {
        json!({
            "page_type": "form_page",
            "confidence": 0.92,
            "form_count": 1,
            "has_apply_button": false,
            "reasoning": "application form with six fields",
            "cta_candidates": [],
            "recommended_action": {
                "action_type": "fill_form",
                "confidence": 0.9,
                "reasoning": "form present",
                "target_element": null,
                "form_selector": "#application_form",
                "priority": 9
            }
        })
    }

    #[test]
    fn repair_of_valid_document_is_identity() {
        let doc = valid_analysis_doc();
        let analysis = repair_page_analysis(&doc, "https://x/jobs/1", "Job");
        assert_eq!(analysis.page_kind, PageKind::FormPage);
        assert_eq!(analysis.confidence, 0.92);
        assert_eq!(analysis.form_count, 1);
        assert_eq!(analysis.recommended_action.kind, RecommendedKind::FillForm);
        assert_eq!(
            analysis.recommended_action.form_selector.as_deref(),
            Some("#application_form")
        );

        // Running the repaired document through again changes nothing.
        let serialized = serde_json::to_value(&analysis).unwrap();
        let again = repair_page_analysis(&serialized, "https://x/jobs/1", "Job");
        assert_eq!(serde_json::to_value(&again).unwrap(), serialized);
    }

    #[test]
    fn missing_fields_get_defaults() {
        let analysis = repair_page_analysis(&json!({}), "https://x", "t");
        assert_eq!(analysis.page_kind, PageKind::Unknown);
        assert_eq!(analysis.confidence, 0.0);
        assert_eq!(analysis.form_count, 0);
        assert_eq!(
            analysis.recommended_action.kind,
            RecommendedKind::WaitForHuman
        );
    }

    #[test]
    fn out_of_range_confidence_is_rescaled() {
        let doc = json!({
            "page_type": "job_detail",
            "confidence": 8,
            "form_count": 0,
            "has_apply_button": true,
            "reasoning": "detail page",
            "cta_candidates": [{
                "text": "Apply",
                "selector": "#apply",
                "confidence": 9,
                "element_type": "fancy-widget",
                "priority_score": 42
            }],
            "recommended_action": {
                "action_type": "click_cta",
                "confidence": 0.8,
                "reasoning": "apply button",
                "priority": 8
            }
        });
        let analysis = repair_page_analysis(&doc, "https://x", "t");
        assert_eq!(analysis.confidence, 0.8);
        let cta = analysis.best_cta().unwrap();
        assert_eq!(cta.confidence, 0.9);
        assert_eq!(cta.element_type, "button");
        assert_eq!(cta.priority_score, 1);
        // click_cta without a target borrows the best candidate.
        assert_eq!(
            analysis.recommended_action.target_element.as_deref(),
            Some("#apply")
        );
    }

    #[test]
    fn job_detail_with_forms_is_reclassified() {
        let doc = json!({
            "page_type": "job_detail",
            "confidence": 0.7,
            "form_count": 2,
            "has_apply_button": true,
            "reasoning": "posting",
            "cta_candidates": [{
                "text": "Apply now",
                "selector": "#apply",
                "confidence": 0.9,
                "element_type": "button",
                "priority_score": 10
            }],
            "recommended_action": {
                "action_type": "click_cta",
                "confidence": 0.9,
                "reasoning": "apply",
                "target_element": "#apply",
                "priority": 10
            }
        });
        let analysis = repair_page_analysis(&doc, "https://x", "t");
        assert_eq!(analysis.page_kind, PageKind::JobDetailWithForm);
        // Never click_cta when the form is already on the page.
        assert_ne!(analysis.recommended_action.kind, RecommendedKind::ClickCta);
    }

    #[test]
    fn fill_form_without_forms_degrades_to_wait() {
        let doc = json!({
            "page_type": "job_detail",
            "confidence": 0.7,
            "form_count": 0,
            "has_apply_button": false,
            "reasoning": "posting",
            "recommended_action": {
                "action_type": "fill_form",
                "confidence": 0.9,
                "reasoning": "?",
                "priority": 5
            }
        });
        let analysis = repair_page_analysis(&doc, "https://x", "t");
        assert_eq!(
            analysis.recommended_action.kind,
            RecommendedKind::WaitForHuman
        );
    }

    #[test]
    fn actions_accept_array_or_wrapper_object() {
        let array = json!([{
            "selector": "#first_name",
            "control": "text",
            "value": "Ada",
            "semantic": "basic_info.first_name",
            "confidence": 0.95
        }]);
        let from_array = actions_from_value(&array);
        assert_eq!(from_array.len(), 1);
        assert_eq!(from_array[0].semantic.as_deref(), Some("basic_info.first_name"));

        let wrapped = json!({"actions": array.clone()});
        assert_eq!(actions_from_value(&wrapped).len(), 1);
    }

    #[test]
    fn invalid_actions_are_discarded() {
        let doc = json!([
            {"selector": "", "control": "text", "value": "x"},
            {"selector": "#a", "control": "password", "value": "x"},
            {"selector": "#b", "control": "text", "value": ""},
            {"selector": "#c", "control": "checkbox", "value": ""},
            {"selector": "#d", "control": "custom-dropdown", "value": "California", "semantic": "Bad Key!"}
        ]);
        let actions = actions_from_value(&doc);
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[0].selector, "#c");
        assert_eq!(actions[1].control, ControlKind::CustomDropdown);
        assert_eq!(actions[1].semantic, None);
    }
}
