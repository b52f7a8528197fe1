//! Workflow orchestrator.
//!
//! Single-threaded step loop over one browser page:
//! load → analyze → decide → (click CTA and re-analyze | fill → validate →
//! retry failures) → done. The orchestrator is the only component that
//! escalates to a fatal state; on the way down it screenshots, logs a final
//! event, and returns a structured failure envelope.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use serde_json::json;
use tokio::time::sleep;
use tracing::{info, warn};

use action_executor::{ActionExecutor, ExecutorConfig};
use applyflow_core_types::{
    Action, ElementRecord, ErrorKind, ExecutionResult, LogicalGroup, PageAnalysis, Platform,
    RecommendedKind,
};
use browser_driver::Driver;
use dom_snapshot::Snapshotter;
use field_mapper::FieldMapper;
use page_analyzer::{capture, detect_captcha, PageAnalyzer};

use crate::session::Session;
use crate::validate::{report_context, FieldValidator, FilledField, ValidationReport};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    Start,
    Loading,
    Analyzing,
    Deciding,
    ClickingCta,
    Filling,
    Validating,
    Done,
    AbortLogin,
    AbortHuman,
    Error,
}

/// The structured envelope a session always returns, success or not.
#[derive(Clone, Debug, Serialize)]
pub struct WorkflowReport {
    pub success: bool,
    pub final_state: WorkflowState,
    pub url: String,
    pub platform: Platform,
    pub hop_count: u32,
    pub total_fields: usize,
    pub filled_fields: usize,
    pub failed_fields: usize,
    pub success_rate: f64,
    pub submit_found: bool,
    pub submit_clicked: bool,
    pub validation: Option<ValidationReport>,
    pub warnings: Vec<String>,
    pub error: Option<String>,
    pub artifacts_dir: PathBuf,
    pub final_screenshot: Option<PathBuf>,
}

impl WorkflowReport {
    fn new(url: &str, artifacts_dir: PathBuf) -> Self {
        Self {
            success: false,
            final_state: WorkflowState::Start,
            url: url.to_string(),
            platform: Platform::detect(url),
            hop_count: 0,
            total_fields: 0,
            filled_fields: 0,
            failed_fields: 0,
            success_rate: 0.0,
            submit_found: false,
            submit_clicked: false,
            validation: None,
            warnings: Vec::new(),
            error: None,
            artifacts_dir,
            final_screenshot: None,
        }
    }
}

const POST_CTA_SETTLE: Duration = Duration::from_secs(3);
const SNAPSHOT_RETRY_SETTLE: Duration = Duration::from_secs(1);

const SUBMIT_SELECTORS: &[&str] = &[
    "button[type=\"submit\"]",
    "input[type=\"submit\"]",
    "button.submit-button",
    "#submit_app",
];

pub struct Orchestrator<'a> {
    session: &'a Session,
    driver: &'a Driver,
}

impl<'a> Orchestrator<'a> {
    pub fn new(session: &'a Session, driver: &'a Driver) -> Self {
        Self { session, driver }
    }

    /// Run the whole workflow under the session deadline.
    pub async fn run(&self, url: &str) -> WorkflowReport {
        let deadline = self.session.settings.session_deadline();
        match tokio::time::timeout(deadline, self.run_inner(url)).await {
            Ok(report) => report,
            Err(_) => {
                warn!(url, "session deadline exceeded; aborting");
                let mut report =
                    WorkflowReport::new(url, self.session.sink.session_dir().to_path_buf());
                report.final_state = WorkflowState::Error;
                report.error = Some("session deadline exceeded".into());
                self.capture_failure(&mut report, ErrorKind::NavTimeout, "session deadline exceeded")
                    .await;
                report
            }
        }
    }

    async fn run_inner(&self, url: &str) -> WorkflowReport {
        let mut report = WorkflowReport::new(url, self.session.sink.session_dir().to_path_buf());
        info!(url, platform = %report.platform, "workflow started");

        // START → LOADING
        report.final_state = WorkflowState::Loading;
        if let Err(err) = self.driver.goto(url).await {
            report.final_state = WorkflowState::Error;
            report.error = Some(err.to_string());
            self.capture_failure(&mut report, err.kind(), &err.to_string()).await;
            return report;
        }

        let analyzer = PageAnalyzer::new(self.session.provider.as_ref());
        let mut snapshot_empty_strikes = 0u32;

        // Analysis / decision loop; CTA hops come back here.
        loop {
            report.final_state = WorkflowState::Analyzing;

            if detect_captcha(self.driver).await {
                report.final_state = WorkflowState::Error;
                report.error = Some("captcha detected".into());
                self.capture_failure(&mut report, ErrorKind::CaptchaDetected, "captcha detected")
                    .await;
                return report;
            }

            let page = capture(self.driver).await;
            let analysis = analyzer.analyze(&page).await;
            report.platform = Platform::detect(&page.url);

            report.final_state = WorkflowState::Deciding;
            let action = analysis.recommended_action.clone();
            let min_confidence = self.session.settings.workflow.min_action_confidence;

            match action.kind {
                RecommendedKind::LoginRequired => {
                    report.final_state = WorkflowState::AbortLogin;
                    report.error = Some("login required".into());
                    self.capture_failure(&mut report, ErrorKind::LoginRequired, "login required")
                        .await;
                    return report;
                }
                RecommendedKind::ClickCta
                    if analyzer.should_proceed(&analysis, &action, min_confidence) =>
                {
                    if report.hop_count >= self.session.settings.workflow.max_cta_hops {
                        warn!(hops = report.hop_count, "CTA hop limit reached");
                        report.final_state = WorkflowState::AbortHuman;
                        report.error = Some("CTA hop limit reached without a form".into());
                        self.finish(&mut report, false).await;
                        return report;
                    }
                    report.final_state = WorkflowState::ClickingCta;
                    if !self.click_cta(&analysis, &mut report).await {
                        report.final_state = WorkflowState::AbortHuman;
                        report.error = Some("CTA click failed".into());
                        self.finish(&mut report, false).await;
                        return report;
                    }
                    report.hop_count += 1;
                    sleep(POST_CTA_SETTLE).await;
                    // CLICKING_CTA → LOADING → ANALYZING
                    continue;
                }
                RecommendedKind::FillForm
                    if analyzer.should_proceed(&analysis, &action, min_confidence) =>
                {
                    report.final_state = WorkflowState::Filling;
                    return self
                        .fill_and_validate(&analysis, &mut snapshot_empty_strikes, report)
                        .await;
                }
                RecommendedKind::NoAction => {
                    info!("no action recommended; ending as done");
                    report.final_state = WorkflowState::Done;
                    report.success = true;
                    self.finish(&mut report, true).await;
                    return report;
                }
                _ => {
                    info!(kind = ?action.kind, "recommendation requires a human; aborting");
                    report.final_state = WorkflowState::AbortHuman;
                    report.error = Some(format!("recommendation: {:?}", action.kind));
                    self.finish(&mut report, false).await;
                    return report;
                }
            }
        }
    }

    async fn click_cta(&self, analysis: &PageAnalysis, report: &mut WorkflowReport) -> bool {
        let target = analysis
            .recommended_action
            .target_element
            .clone()
            .or_else(|| analysis.best_cta().map(|cta| cta.selector.clone()));
        let target = match target {
            Some(target) => target,
            None => return false,
        };

        info!(selector = %target, "clicking CTA");
        match self.driver.click(&target).await {
            Ok(()) => {
                self.session.sink.report_success(
                    "click_cta",
                    json!({"selector": target, "hop": report.hop_count + 1}),
                    Some(target.clone()),
                );
                true
            }
            Err(err) => {
                self.session.sink.report_error(
                    err.kind(),
                    err.to_string(),
                    json!({"phase": "click_cta"}),
                    Some(target),
                    None,
                    None,
                );
                false
            }
        }
    }

    async fn fill_and_validate(
        &self,
        analysis: &PageAnalysis,
        snapshot_empty_strikes: &mut u32,
        mut report: WorkflowReport,
    ) -> WorkflowReport {
        let snapshotter = Snapshotter::new(self.driver);
        let mut groups = snapshotter.snapshot().await;
        if groups.is_empty() {
            sleep(SNAPSHOT_RETRY_SETTLE).await;
            groups = snapshotter.snapshot().await;
        }
        if groups.is_empty() {
            *snapshot_empty_strikes += 1;
            self.session.sink.report_error(
                ErrorKind::SnapshotEmpty,
                "DOM snapshot produced no elements",
                json!({"url": report.url, "form_count": analysis.form_count}),
                None,
                None,
                None,
            );
            // One empty snapshot on a page the analyzer called a form is a
            // boundary case (forms with zero interactive fields exist);
            // repeated emptiness is a broken page.
            if *snapshot_empty_strikes >= 2 {
                report.final_state = WorkflowState::Error;
                report.error = Some("repeated empty DOM snapshot".into());
                self.capture_failure(&mut report, ErrorKind::SnapshotEmpty, "repeated empty snapshot")
                    .await;
                return report;
            }
            report.final_state = WorkflowState::Done;
            report.success = true;
            report.warnings.push("form had no interactive elements".into());
            self.finish(&mut report, true).await;
            return report;
        }

        // Custom dropdowns carry no options until opened; harvest them so
        // the mapper can pick exact values.
        for group in &mut groups {
            for element in &mut group.elements {
                if element.is_custom_dropdown && element.options.is_empty() {
                    if let Some(selector) = element.selector() {
                        let harvested = snapshotter.find_custom_dropdown_options(&selector).await;
                        element.options = harvested
                            .into_iter()
                            .map(|o| applyflow_core_types::SelectOption::new(o.value, o.text))
                            .collect();
                    }
                }
            }
        }

        let mapper = FieldMapper::new(
            self.session.provider.as_ref(),
            &self.session.profile,
            &self.session.learning,
        );
        let actions = mapper.map_groups(&groups, report.platform).await;
        report.total_fields = actions.len();
        if actions.is_empty() {
            report.final_state = WorkflowState::Done;
            report.success = true;
            report.warnings.push("no fields mapped".into());
            self.finish(&mut report, true).await;
            return report;
        }

        // Execute strictly in mapper order.
        let executor = ActionExecutor::with_config(
            self.driver,
            ExecutorConfig {
                humanize_delay: self.session.settings.humanize_delay(),
                element_timeout: self.session.settings.element_timeout(),
                ..ExecutorConfig::default()
            },
        );

        let element_index = index_elements(&groups);
        let mut results: HashMap<String, ExecutionResult> = HashMap::new();
        for action in &actions {
            let result = executor.execute(action).await;
            self.record_outcome(action, &result, &element_index, report.platform);
            results.insert(action.selector.clone(), result);
        }

        // FILLING → VALIDATING, with bounded per-field retries.
        report.final_state = WorkflowState::Validating;
        let validator = FieldValidator::new(self.driver);
        let max_retries = self.session.settings.workflow.max_field_retries;
        let mut validation = validator
            .validate_all(&filled_fields(&actions, &results))
            .await;

        let mut retries_by_field: HashMap<String, u32> = HashMap::new();
        loop {
            let failed = validation.failed_selectors();
            let retryable: Vec<&Action> = actions
                .iter()
                .filter(|action| {
                    failed.contains(&action.selector)
                        && *retries_by_field.get(&action.selector).unwrap_or(&0) < max_retries
                })
                .collect();
            if retryable.is_empty() {
                break;
            }
            for action in retryable {
                *retries_by_field.entry(action.selector.clone()).or_insert(0) += 1;
                info!(selector = %action.selector, "re-filling field that failed validation");
                let result = executor.execute(action).await;
                self.record_outcome(action, &result, &element_index, report.platform);
                results.insert(action.selector.clone(), result);
            }
            validation = validator
                .validate_all(&filled_fields(&actions, &results))
                .await;
        }

        report.filled_fields = results.values().filter(|r| r.success).count();
        report.failed_fields = report.total_fields - report.filled_fields;
        report.success_rate = report.filled_fields as f64 / report.total_fields as f64;
        self.session.sink.report_success(
            "fill_form",
            report_context(&validation),
            None,
        );
        report.validation = Some(validation);

        // Submission stays gated behind explicit opt-in.
        self.handle_submit(&mut report).await;

        let threshold = self.session.settings.workflow.success_threshold;
        report.success = report.success_rate >= threshold;
        if report.success && report.failed_fields > 0 {
            report
                .warnings
                .push(format!("{} field(s) failed", report.failed_fields));
        }
        report.final_state = if report.success {
            WorkflowState::Done
        } else {
            WorkflowState::Error
        };
        if !report.success {
            report.error = Some(format!(
                "success rate {:.2} below threshold {:.2}",
                report.success_rate, threshold
            ));
        }
        let success = report.success;
        self.finish(&mut report, success).await;
        report
    }

    /// Locate the submit button; click it only when configured to.
    async fn handle_submit(&self, report: &mut WorkflowReport) {
        for selector in SUBMIT_SELECTORS {
            if self.driver.query(selector).await.unwrap_or(false) {
                report.submit_found = true;
                if self.session.settings.workflow.submit {
                    info!(selector = %selector, "submitting application");
                    match self.driver.click(selector).await {
                        Ok(()) => {
                            report.submit_clicked = true;
                            sleep(POST_CTA_SETTLE).await;
                        }
                        Err(err) => {
                            warn!(error = %err, "submit click failed");
                            report.warnings.push(format!("submit click failed: {err}"));
                        }
                    }
                } else {
                    info!(selector = %selector, "submit button found but submission is disabled");
                }
                return;
            }
        }
        warn!("no submit button found");
    }

    /// Feed execution outcomes to telemetry and, on success, the learning
    /// store.
    fn record_outcome(
        &self,
        action: &Action,
        result: &ExecutionResult,
        element_index: &HashMap<String, ElementRecord>,
        platform: Platform,
    ) {
        if result.success {
            self.session.sink.report_success(
                "fill_field",
                json!({
                    "selector": action.selector,
                    "semantic": action.semantic,
                    "control": action.control.as_str(),
                }),
                Some(action.selector.clone()),
            );
            if let (Some(data_path), Some(element)) =
                (&action.semantic, element_index.get(&action.selector))
            {
                let semantic = data_path.rsplit('.').next().unwrap_or(data_path);
                self.session.learning.record(
                    element,
                    semantic,
                    data_path,
                    &action.value,
                    json!({"platform": platform.as_str()}),
                );
            }
        } else {
            self.session.sink.report_error(
                result.error_kind.unwrap_or(ErrorKind::FillVerifyMismatch),
                result.error.clone().unwrap_or_default(),
                json!({
                    "selector": action.selector,
                    "expected": result.expected_value,
                    "actual": result.actual_value,
                    "retries": result.retries,
                }),
                Some(action.selector.clone()),
                None,
                None,
            );
        }
    }

    /// Final screenshot and closing event for every exit path.
    async fn finish(&self, report: &mut WorkflowReport, success: bool) {
        let path = self.session.sink.screenshot_path("final_state");
        if self.driver.screenshot(&path).await.is_ok() {
            report.final_screenshot = Some(path);
        }
        self.session.sink.report_success(
            "workflow_finished",
            json!({
                "success": success,
                "state": report.final_state,
                "filled": report.filled_fields,
                "total": report.total_fields,
                "hops": report.hop_count,
            }),
            None,
        );
        self.session.flush_learning();
    }

    /// Fatal-path teardown: screenshot, final error event, learning flush.
    async fn capture_failure(&self, report: &mut WorkflowReport, kind: ErrorKind, message: &str) {
        let path = self.session.sink.screenshot_path("failure");
        let screenshot = if self.driver.screenshot(&path).await.is_ok() {
            report.final_screenshot = Some(path.clone());
            Some(path)
        } else {
            None
        };
        self.session.sink.report_error(
            kind,
            message,
            json!({"url": report.url, "state": report.final_state}),
            None,
            screenshot,
            None,
        );
        self.session.flush_learning();
    }
}

/// Selector → element record, for learning-store feedback.
fn index_elements(groups: &[LogicalGroup]) -> HashMap<String, ElementRecord> {
    let mut index = HashMap::new();
    for group in groups {
        for element in &group.elements {
            if let Some(selector) = element.selector() {
                index.entry(selector).or_insert_with(|| element.clone());
            }
        }
    }
    index
}

/// The per-field expectations the validator checks after a fill pass.
fn filled_fields(
    actions: &[Action],
    results: &HashMap<String, ExecutionResult>,
) -> Vec<FilledField> {
    actions
        .iter()
        .filter(|action| {
            results
                .get(&action.selector)
                .map(|r| r.success)
                .unwrap_or(false)
        })
        .map(|action| FilledField {
            selector: action.selector.clone(),
            control: action.control,
            expected: action.value.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use applyflow_core_types::ControlKind;

    fn action(selector: &str, value: &str) -> Action {
        Action::new(selector, ControlKind::Text, value)
    }

    fn success_result(action: &Action) -> ExecutionResult {
        ExecutionResult::pending(action).succeed(action.value.clone())
    }

    #[test]
    fn filled_fields_only_include_successes() {
        let actions = vec![action("#a", "1"), action("#b", "2")];
        let mut results = HashMap::new();
        results.insert("#a".to_string(), success_result(&actions[0]));
        results.insert(
            "#b".to_string(),
            ExecutionResult::pending(&actions[1]).fail(ErrorKind::SelectorNotFound, "missing"),
        );

        let fields = filled_fields(&actions, &results);
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].selector, "#a");
    }

    #[test]
    fn element_index_prefers_first_record_per_selector() {
        let mut first = ElementRecord {
            id: "email".into(),
            label: "Email".into(),
            ..Default::default()
        };
        first.control = ControlKind::Email;
        let duplicate = ElementRecord {
            id: "email".into(),
            label: "Shadow".into(),
            ..Default::default()
        };
        let groups = vec![LogicalGroup {
            name: "default".into(),
            elements: vec![first, duplicate],
        }];
        let index = index_elements(&groups);
        assert_eq!(index.len(), 1);
        assert_eq!(index["#email"].label, "Email");
    }
}
