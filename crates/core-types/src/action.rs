//! Action and execution-result envelopes exchanged between the field mapper
//! and the action executor.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ControlKind;

/// Error taxonomy shared across the engine.
///
/// These are kinds, not wrapper types: each crate carries its own `thiserror`
/// enum and tags outbound events and result envelopes with one of these.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Error, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    #[error("navigation timed out")]
    NavTimeout,
    #[error("navigation failed")]
    NavFailed,
    #[error("selector not found")]
    SelectorNotFound,
    #[error("element unexpectedly hidden")]
    ElementHiddenUnexpected,
    #[error("filled value did not verify")]
    FillVerifyMismatch,
    #[error("no option matched the target value")]
    OptionNotMatched,
    #[error("LLM call failed")]
    LlmCallFailed,
    #[error("LLM output failed validation")]
    LlmOutputInvalid,
    #[error("captcha detected")]
    CaptchaDetected,
    #[error("login required")]
    LoginRequired,
    #[error("DOM snapshot produced no elements")]
    SnapshotEmpty,
}

impl ErrorKind {
    /// Fatal kinds abort the session; everything else is recorded and the
    /// loop continues.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ErrorKind::NavFailed | ErrorKind::CaptchaDetected | ErrorKind::LoginRequired
        )
    }
}

/// A single fill instruction produced by the field mapper.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Action {
    /// Stable CSS selector (id > name > structural).
    pub selector: String,
    pub control: ControlKind,
    /// Value after profile normalization. Empty only for checkboxes.
    pub value: String,
    /// Inferred semantic path, e.g. `basic_info.first_name`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic: Option<String>,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
}

fn default_confidence() -> f64 {
    0.5
}

impl Action {
    pub fn new(selector: impl Into<String>, control: ControlKind, value: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            control,
            value: value.into(),
            semantic: None,
            confidence: default_confidence(),
        }
    }

    pub fn with_semantic(mut self, semantic: impl Into<String>) -> Self {
        self.semantic = Some(semantic.into());
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    /// Structural validity: non-empty selector, confidence in range, and a
    /// value unless the control is a checkbox.
    pub fn is_valid(&self) -> bool {
        if self.selector.trim().is_empty() {
            return false;
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return false;
        }
        if self.value.trim().is_empty() && self.control != ControlKind::Checkbox {
            return false;
        }
        true
    }
}

/// Outcome of executing one action. Executors never throw across their
/// boundary; everything lands in this envelope.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub success: bool,
    pub selector: String,
    pub control: ControlKind,
    pub expected_value: String,
    pub actual_value: Option<String>,
    pub retries: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

impl ExecutionResult {
    pub fn pending(action: &Action) -> Self {
        Self {
            success: false,
            selector: action.selector.clone(),
            control: action.control,
            expected_value: action.value.clone(),
            actual_value: None,
            retries: 0,
            error: None,
            error_kind: None,
        }
    }

    pub fn succeed(mut self, actual: impl Into<String>) -> Self {
        self.success = true;
        self.actual_value = Some(actual.into());
        self.error = None;
        self.error_kind = None;
        self
    }

    pub fn fail(mut self, kind: ErrorKind, message: impl Into<String>) -> Self {
        self.success = false;
        self.error = Some(message.into());
        self.error_kind = Some(kind);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkbox_actions_may_carry_empty_value() {
        let unchecked = Action::new("#terms", ControlKind::Checkbox, "");
        assert!(unchecked.is_valid());

        let text = Action::new("#first", ControlKind::Text, "");
        assert!(!text.is_valid());
    }

    #[test]
    fn confidence_is_clamped() {
        let action = Action::new("#a", ControlKind::Text, "x").with_confidence(3.0);
        assert_eq!(action.confidence, 1.0);
    }

    #[test]
    fn result_envelope_carries_failure_kind() {
        let action = Action::new("#missing", ControlKind::Text, "x");
        let result = ExecutionResult::pending(&action)
            .fail(ErrorKind::SelectorNotFound, "no element for #missing");
        assert!(!result.success);
        assert_eq!(result.error_kind, Some(ErrorKind::SelectorNotFound));
    }

    #[test]
    fn fatal_kinds() {
        assert!(ErrorKind::CaptchaDetected.is_fatal());
        assert!(!ErrorKind::FillVerifyMismatch.is_fatal());
    }
}
