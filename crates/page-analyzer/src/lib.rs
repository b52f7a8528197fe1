//! Page classification and the proceed/stop decision.
//!
//! The extraction side collects a trimmed view of the page; the LLM
//! classifies it under a strict schema; the repair layer in `llm-gateway`
//! fixes what it can; the consistency rules are enforced before anything
//! reaches the orchestrator.

mod extract;

use tracing::{info, warn};

use applyflow_core_types::{PageAnalysis, RecommendedAction, RecommendedKind};
use llm_gateway::{page_analysis_user, repair_page_analysis, LlmProvider, PAGE_ANALYSIS_SYSTEM};

pub use extract::{capture, detect_captcha, squeeze_whitespace, PageSnapshot};

/// Default confidence floor for acting on a recommendation.
pub const MIN_ACTION_CONFIDENCE: f64 = 0.6;

pub struct PageAnalyzer<'a> {
    provider: &'a dyn LlmProvider,
}

impl<'a> PageAnalyzer<'a> {
    pub fn new(provider: &'a dyn LlmProvider) -> Self {
        Self { provider }
    }

    /// Classify a captured page. LLM trouble degrades to the typed default
    /// (`unknown` + `wait_for_human`), never to an error.
    pub async fn analyze(&self, snapshot: &PageSnapshot) -> PageAnalysis {
        let user = page_analysis_user(
            &snapshot.url,
            &snapshot.title,
            &snapshot.content,
            &snapshot.buttons,
            &snapshot.forms,
        );

        let raw = match self.provider.complete_json(PAGE_ANALYSIS_SYSTEM, &user).await {
            Ok(raw) => raw,
            Err(err) => {
                warn!(url = %snapshot.url, error = %err, "page analysis LLM call failed");
                return PageAnalysis::unknown(
                    &snapshot.url,
                    &snapshot.title,
                    &format!("analysis failed: {err}"),
                );
            }
        };

        let mut analysis = repair_page_analysis(&raw, &snapshot.url, &snapshot.title);

        // The extractor counted the real forms; prefer that count when the
        // model contradicts it.
        if analysis.form_count == 0 && snapshot.form_count > 0 {
            warn!(
                claimed = analysis.form_count,
                extracted = snapshot.form_count,
                "model undercounted forms; using extracted count"
            );
            analysis.form_count = snapshot.form_count as u32;
            analysis = repair_page_analysis(
                &serde_json::to_value(&analysis).unwrap_or_default(),
                &snapshot.url,
                &snapshot.title,
            );
        }

        info!(
            url = %snapshot.url,
            page_kind = ?analysis.page_kind,
            confidence = analysis.confidence,
            form_count = analysis.form_count,
            action = ?analysis.recommended_action.kind,
            "page analyzed"
        );
        analysis
    }

    /// Gate on the recommendation: confidence floor, page shape, and for
    /// CTA clicks at least one candidate above the floor.
    pub fn should_proceed(
        &self,
        analysis: &PageAnalysis,
        action: &RecommendedAction,
        min_confidence: f64,
    ) -> bool {
        if action.confidence < min_confidence {
            info!(
                confidence = action.confidence,
                floor = min_confidence,
                "recommendation below confidence floor"
            );
            return false;
        }

        match action.kind {
            RecommendedKind::FillForm => {
                if analysis.form_count == 0 {
                    return false;
                }
                if !analysis.page_kind.expects_form() {
                    info!(page_kind = ?analysis.page_kind, "form found but page kind does not support filling");
                    return false;
                }
                true
            }
            RecommendedKind::ClickCta => {
                if analysis.page_kind.expects_form() && analysis.form_count > 0 {
                    return false;
                }
                match analysis.best_cta() {
                    Some(best) if best.confidence >= min_confidence => true,
                    Some(best) => {
                        info!(confidence = best.confidence, "best CTA below confidence floor");
                        false
                    }
                    None => false,
                }
            }
            RecommendedKind::LoginRequired
            | RecommendedKind::WaitForHuman
            | RecommendedKind::NoAction => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use applyflow_core_types::{CtaCandidate, PageKind};
    use llm_gateway::MockProvider;
    use serde_json::json;

    fn snapshot(form_count: usize) -> PageSnapshot {
        PageSnapshot {
            url: "https://boards.greenhouse.io/acme/jobs/1".into(),
            title: "Engineer - Acme".into(),
            content: "Acme is hiring".into(),
            buttons: json!([]),
            forms: json!([]),
            form_count,
        }
    }

    fn analyzer_analysis(kind: PageKind, form_count: u32, cta_conf: Option<f64>) -> PageAnalysis {
        let mut analysis = PageAnalysis::unknown("https://x", "t", "test");
        analysis.page_kind = kind;
        analysis.form_count = form_count;
        if let Some(conf) = cta_conf {
            analysis.cta_candidates = vec![CtaCandidate {
                text: "Apply".into(),
                selector: "#apply".into(),
                confidence: conf,
                element_type: "button".into(),
                priority_score: 10,
            }];
            analysis.has_apply_button = true;
        }
        analysis
    }

    fn action(kind: RecommendedKind, confidence: f64) -> RecommendedAction {
        RecommendedAction {
            kind,
            confidence,
            reasoning: "test".into(),
            target_element: None,
            form_selector: None,
            priority: 5,
        }
    }

    #[tokio::test]
    async fn llm_failure_yields_wait_for_human() {
        let mock = MockProvider::new();
        mock.push_failure("down");
        let analyzer = PageAnalyzer::new(&mock);
        let analysis = analyzer.analyze(&snapshot(0)).await;
        assert_eq!(analysis.page_kind, PageKind::Unknown);
        assert_eq!(
            analysis.recommended_action.kind,
            RecommendedKind::WaitForHuman
        );
    }

    #[tokio::test]
    async fn extracted_form_count_overrides_model_zero() {
        let mock = MockProvider::new();
        mock.push_json(json!({
            "page_type": "job_detail",
            "confidence": 0.8,
            "form_count": 0,
            "has_apply_button": false,
            "reasoning": "posting",
            "cta_candidates": [],
            "recommended_action": {
                "action_type": "no_action",
                "confidence": 0.5,
                "reasoning": "nothing to do",
                "priority": 1
            }
        }));
        let analyzer = PageAnalyzer::new(&mock);
        let analysis = analyzer.analyze(&snapshot(2)).await;
        assert_eq!(analysis.form_count, 2);
        // Re-repair reclassifies job_detail with forms.
        assert_eq!(analysis.page_kind, PageKind::JobDetailWithForm);
    }

    #[test]
    fn should_proceed_enforces_confidence_floor() {
        let mock = MockProvider::new();
        let analyzer = PageAnalyzer::new(&mock);
        let analysis = analyzer_analysis(PageKind::FormPage, 1, None);
        assert!(!analyzer.should_proceed(
            &analysis,
            &action(RecommendedKind::FillForm, 0.5),
            MIN_ACTION_CONFIDENCE
        ));
        assert!(analyzer.should_proceed(
            &analysis,
            &action(RecommendedKind::FillForm, 0.9),
            MIN_ACTION_CONFIDENCE
        ));
    }

    #[test]
    fn cta_needs_a_confident_candidate() {
        let mock = MockProvider::new();
        let analyzer = PageAnalyzer::new(&mock);

        let weak = analyzer_analysis(PageKind::JobDetail, 0, Some(0.4));
        assert!(!analyzer.should_proceed(
            &weak,
            &action(RecommendedKind::ClickCta, 0.9),
            MIN_ACTION_CONFIDENCE
        ));

        let strong = analyzer_analysis(PageKind::JobDetail, 0, Some(0.9));
        assert!(analyzer.should_proceed(
            &strong,
            &action(RecommendedKind::ClickCta, 0.9),
            MIN_ACTION_CONFIDENCE
        ));

        // A page that already carries the form never warrants a CTA hop.
        let with_form = analyzer_analysis(PageKind::JobDetailWithForm, 1, Some(0.9));
        assert!(!analyzer.should_proceed(
            &with_form,
            &action(RecommendedKind::ClickCta, 0.9),
            MIN_ACTION_CONFIDENCE
        ));
    }

    #[test]
    fn terminal_recommendations_never_proceed() {
        let mock = MockProvider::new();
        let analyzer = PageAnalyzer::new(&mock);
        let analysis = analyzer_analysis(PageKind::LoginPage, 0, None);
        for kind in [
            RecommendedKind::LoginRequired,
            RecommendedKind::WaitForHuman,
            RecommendedKind::NoAction,
        ] {
            assert!(!analyzer.should_proceed(&analysis, &action(kind, 0.99), MIN_ACTION_CONFIDENCE));
        }
    }
}
