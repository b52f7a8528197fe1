//! Post-fill field validation.
//!
//! After a fill sequence, each filled control gets synthetic change/blur
//! events, a read-back comparison, and the page is swept for visible error
//! sentinels. Loading spinners are given a bounded window to disappear
//! before final judgment.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use applyflow_core_types::ControlKind;
use browser_driver::{js_string, Driver};

/// Budget for spinner disappearance before judging.
const LOADING_WAIT: Duration = Duration::from_secs(3);
const LOADING_POLL: Duration = Duration::from_millis(300);

/// One filled field to verify.
#[derive(Clone, Debug)]
pub struct FilledField {
    pub selector: String,
    pub control: ControlKind,
    pub expected: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FieldValidation {
    pub selector: String,
    pub expected: String,
    pub actual: Option<String>,
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ValidationReport {
    pub total_fields: usize,
    pub valid_fields: usize,
    pub failed_fields: usize,
    pub page_errors: Vec<String>,
    pub details: Vec<FieldValidation>,
}

impl ValidationReport {
    pub fn validation_rate(&self) -> f64 {
        if self.total_fields == 0 {
            0.0
        } else {
            self.valid_fields as f64 / self.total_fields as f64
        }
    }

    pub fn failed_selectors(&self) -> Vec<String> {
        self.details
            .iter()
            .filter(|d| !d.valid)
            .map(|d| d.selector.clone())
            .collect()
    }
}

pub struct FieldValidator<'a> {
    driver: &'a Driver,
}

impl<'a> FieldValidator<'a> {
    pub fn new(driver: &'a Driver) -> Self {
        Self { driver }
    }

    /// Validate every filled field, then sweep for page-level errors.
    pub async fn validate_all(&self, fields: &[FilledField]) -> ValidationReport {
        self.wait_for_loading_quiet().await;

        let mut report = ValidationReport {
            total_fields: fields.len(),
            ..Default::default()
        };

        for field in fields {
            let detail = self.validate_field(field).await;
            if detail.valid {
                report.valid_fields += 1;
            } else {
                report.failed_fields += 1;
                warn!(
                    selector = %detail.selector,
                    expected = %detail.expected,
                    actual = %detail.actual.as_deref().unwrap_or("<none>"),
                    "field failed validation"
                );
            }
            report.details.push(detail);
        }

        report.page_errors = self.collect_page_errors().await;
        info!(
            total = report.total_fields,
            valid = report.valid_fields,
            failed = report.failed_fields,
            page_errors = report.page_errors.len(),
            "validation complete"
        );
        report
    }

    /// Fire synthetic change/blur on the element, read the value back, and
    /// compare. Listeners are attached and torn down inside one script so
    /// nothing leaks into the next action.
    async fn validate_field(&self, field: &FilledField) -> FieldValidation {
        let script = format!(
            r#"(() => {{
                const el = document.querySelector({sel});
                if (!el) return null;
                el.dispatchEvent(new Event('change', {{ bubbles: true }}));
                el.dispatchEvent(new Event('blur', {{ bubbles: true }}));
                if (el.type === 'checkbox' || el.type === 'radio') {{
                    return el.checked ? 'true' : 'false';
                }}
                if (el.tagName.toLowerCase() === 'select') {{
                    const selected = el.options[el.selectedIndex];
                    return selected ? selected.textContent.trim() : '';
                }}
                return el.value || '';
            }})()"#,
            sel = js_string(&field.selector),
        );

        let actual = match self.driver.eval_value::<Option<String>>(&script).await {
            Ok(Some(actual)) => actual,
            Ok(None) => {
                return FieldValidation {
                    selector: field.selector.clone(),
                    expected: field.expected.clone(),
                    actual: None,
                    valid: false,
                    error: Some("element disappeared before validation".into()),
                };
            }
            Err(err) => {
                return FieldValidation {
                    selector: field.selector.clone(),
                    expected: field.expected.clone(),
                    actual: None,
                    valid: false,
                    error: Some(err.to_string()),
                };
            }
        };

        let valid = values_agree(field.control, &field.expected, &actual);
        debug!(selector = %field.selector, valid, "field validated");
        FieldValidation {
            selector: field.selector.clone(),
            expected: field.expected.clone(),
            actual: Some(actual),
            valid,
            error: None,
        }
    }

    /// Visible error sentinels anywhere on the page.
    async fn collect_page_errors(&self) -> Vec<String> {
        let script = r#"(() => {
            const sentinels = [
                '.error-message', '.field-error', '.validation-error',
                '[class*="error"]', '[role="alert"]', '.invalid-feedback'
            ];
            const messages = new Set();
            for (const selector of sentinels) {
                for (const el of document.querySelectorAll(selector)) {
                    if (el.offsetParent === null) continue;
                    const text = (el.textContent || '').trim();
                    if (text) messages.add(text.substring(0, 200));
                }
            }
            return Array.from(messages);
        })()"#;
        self.driver
            .eval_value::<Vec<String>>(script)
            .await
            .unwrap_or_default()
    }

    /// Wait until known loading sentinels are gone, up to the budget.
    async fn wait_for_loading_quiet(&self) {
        let script = r#"(() => {
            const sentinels = document.querySelectorAll('.loading, .spinner, [class*="loading"], [class*="spinner"]');
            return Array.from(sentinels).every(el => {
                const style = window.getComputedStyle(el);
                return style.display === 'none' || style.visibility === 'hidden';
            });
        })()"#;
        let deadline = tokio::time::Instant::now() + LOADING_WAIT;
        loop {
            let quiet = self.driver.eval_value::<bool>(script).await.unwrap_or(true);
            if quiet || tokio::time::Instant::now() >= deadline {
                if !quiet {
                    warn!("loading sentinels still visible after wait budget");
                }
                return;
            }
            sleep(LOADING_POLL).await;
        }
    }
}

/// Read-back equality, modulo what the control kind can represent.
fn values_agree(control: ControlKind, expected: &str, actual: &str) -> bool {
    match control {
        ControlKind::Checkbox | ControlKind::Radio => {
            let expected_bool = matches!(
                expected.trim().to_ascii_lowercase().as_str(),
                "yes" | "true" | "1" | "on" | "checked"
            );
            // Radios validate as "the chosen one is checked".
            if control == ControlKind::Radio {
                actual == "true"
            } else {
                (actual == "true") == expected_bool
            }
        }
        _ => expected.trim() == actual.trim(),
    }
}

/// Summarize a validation report as JSON for telemetry.
pub fn report_context(report: &ValidationReport) -> Value {
    serde_json::json!({
        "total": report.total_fields,
        "valid": report.valid_fields,
        "failed": report.failed_fields,
        "rate": report.validation_rate(),
        "page_errors": report.page_errors,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agreement_rules() {
        assert!(values_agree(ControlKind::Text, "Ada", "Ada"));
        assert!(values_agree(ControlKind::Text, " Ada ", "Ada"));
        assert!(!values_agree(ControlKind::Text, "Ada", "Grace"));
        assert!(values_agree(ControlKind::Checkbox, "Yes", "true"));
        assert!(values_agree(ControlKind::Checkbox, "No", "false"));
        assert!(!values_agree(ControlKind::Checkbox, "Yes", "false"));
        assert!(values_agree(ControlKind::Radio, "Yes", "true"));
        assert!(!values_agree(ControlKind::Radio, "Yes", "false"));
    }

    #[test]
    fn report_rates() {
        let report = ValidationReport {
            total_fields: 4,
            valid_fields: 3,
            failed_fields: 1,
            page_errors: vec![],
            details: vec![FieldValidation {
                selector: "#x".into(),
                expected: "a".into(),
                actual: Some("b".into()),
                valid: false,
                error: None,
            }],
        };
        assert_eq!(report.validation_rate(), 0.75);
        assert_eq!(report.failed_selectors(), vec!["#x".to_string()]);

        assert_eq!(ValidationReport::default().validation_rate(), 0.0);
    }
}
