//! Page classification results produced by the page analyzer.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// What kind of page the browser is currently looking at.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageKind {
    /// Job posting with description but no application form on the page.
    JobDetail,
    /// Job posting with the actual application form inline.
    JobDetailWithForm,
    /// Standalone application form, minimal job description.
    FormPage,
    LoginPage,
    ExternalRedirect,
    Unknown,
}

impl PageKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "job_detail" => Some(PageKind::JobDetail),
            "job_detail_with_form" => Some(PageKind::JobDetailWithForm),
            "form_page" => Some(PageKind::FormPage),
            "login_page" => Some(PageKind::LoginPage),
            "external_redirect" => Some(PageKind::ExternalRedirect),
            "unknown" => Some(PageKind::Unknown),
            _ => None,
        }
    }

    pub fn expects_form(&self) -> bool {
        matches!(self, PageKind::JobDetailWithForm | PageKind::FormPage)
    }
}

/// The next action the analyzer recommends to the orchestrator.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendedKind {
    FillForm,
    ClickCta,
    LoginRequired,
    WaitForHuman,
    NoAction,
}

impl RecommendedKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "fill_form" => Some(RecommendedKind::FillForm),
            "click_cta" => Some(RecommendedKind::ClickCta),
            "login_required" => Some(RecommendedKind::LoginRequired),
            "wait_for_human" => Some(RecommendedKind::WaitForHuman),
            "no_action" => Some(RecommendedKind::NoAction),
            _ => None,
        }
    }
}

/// A candidate call-to-action button or link.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CtaCandidate {
    pub text: String,
    pub selector: String,
    pub confidence: f64,
    /// One of button / a / input / submit / div / span.
    pub element_type: String,
    /// Priority score in [1, 10]; "Apply" text scores highest.
    pub priority_score: i32,
}

impl CtaCandidate {
    /// Sort key: confidence descending, then priority descending. Used to
    /// keep `cta_candidates` ranked best-first.
    pub fn ranking(&self, other: &Self) -> Ordering {
        other
            .confidence
            .partial_cmp(&self.confidence)
            .unwrap_or(Ordering::Equal)
            .then(other.priority_score.cmp(&self.priority_score))
    }
}

/// The analyzer's recommendation, schema-repaired before it gets here.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RecommendedAction {
    pub kind: RecommendedKind,
    pub confidence: f64,
    pub reasoning: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_element: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form_selector: Option<String>,
    pub priority: i32,
}

impl RecommendedAction {
    /// The default used when the LLM output is beyond repair.
    pub fn wait_for_human(reason: impl Into<String>) -> Self {
        Self {
            kind: RecommendedKind::WaitForHuman,
            confidence: 0.0,
            reasoning: reason.into(),
            target_element: None,
            form_selector: None,
            priority: 1,
        }
    }
}

/// Full page analysis. Consistency invariants are enforced by the repair
/// pass: form-bearing kinds imply `form_count > 0`, an apply button implies
/// a non-empty candidate list, and the recommended action matches the page
/// shape.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PageAnalysis {
    pub page_kind: PageKind,
    pub confidence: f64,
    pub url: String,
    pub title: String,
    pub form_count: u32,
    pub has_apply_button: bool,
    pub cta_candidates: Vec<CtaCandidate>,
    pub reasoning: String,
    pub recommended_action: RecommendedAction,
}

impl PageAnalysis {
    /// The default analysis for unparseable LLM output.
    pub fn unknown(url: impl Into<String>, title: impl Into<String>, reason: &str) -> Self {
        Self {
            page_kind: PageKind::Unknown,
            confidence: 0.0,
            url: url.into(),
            title: title.into(),
            form_count: 0,
            has_apply_button: false,
            cta_candidates: Vec::new(),
            reasoning: reason.to_string(),
            recommended_action: RecommendedAction::wait_for_human(reason),
        }
    }

    pub fn best_cta(&self) -> Option<&CtaCandidate> {
        self.cta_candidates.first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cta(confidence: f64, priority: i32) -> CtaCandidate {
        CtaCandidate {
            text: "Apply".into(),
            selector: "#apply".into(),
            confidence,
            element_type: "button".into(),
            priority_score: priority,
        }
    }

    #[test]
    fn ranking_orders_by_confidence_then_priority() {
        let mut list = vec![cta(0.5, 9), cta(0.9, 2), cta(0.5, 10)];
        list.sort_by(|a, b| a.ranking(b));
        assert_eq!(list[0].confidence, 0.9);
        assert_eq!(list[1].priority_score, 10);
    }

    #[test]
    fn unknown_analysis_recommends_wait_for_human() {
        let analysis = PageAnalysis::unknown("https://x", "t", "parse failure");
        assert_eq!(analysis.page_kind, PageKind::Unknown);
        assert_eq!(
            analysis.recommended_action.kind,
            RecommendedKind::WaitForHuman
        );
    }

    #[test]
    fn form_expectation_by_kind() {
        assert!(PageKind::FormPage.expects_form());
        assert!(PageKind::JobDetailWithForm.expects_form());
        assert!(!PageKind::JobDetail.expects_form());
    }
}
