//! Dispatch and shared element-state helpers.

use std::time::Duration;

use serde::Deserialize;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use applyflow_core_types::{Action, ControlKind, ExecutionResult};
use browser_driver::{js_string, Driver};

use crate::primitives;

#[derive(Clone, Debug)]
pub struct ExecutorConfig {
    /// Retries for text-family fills.
    pub max_retries: u32,
    /// Backoff between fill retries.
    pub retry_backoff: Duration,
    /// Delay before each text input; some ATS validators only fire on
    /// human-speed input.
    pub humanize_delay: Duration,
    /// Settle time between fill and read-back.
    pub post_fill_settle: Duration,
    /// Wait budget for a missing element before giving up.
    pub element_timeout: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_backoff: Duration::from_millis(500),
            humanize_delay: Duration::from_millis(500),
            post_fill_settle: Duration::from_millis(100),
            element_timeout: Duration::from_secs(5),
        }
    }
}

/// Executes mapped actions against the live page.
pub struct ActionExecutor<'a> {
    pub(crate) driver: &'a Driver,
    pub(crate) config: ExecutorConfig,
}

impl<'a> ActionExecutor<'a> {
    pub fn new(driver: &'a Driver) -> Self {
        Self {
            driver,
            config: ExecutorConfig {
                element_timeout: driver.element_timeout(),
                ..ExecutorConfig::default()
            },
        }
    }

    pub fn with_config(driver: &'a Driver, config: ExecutorConfig) -> Self {
        Self { driver, config }
    }

    /// Execute one action and report what actually happened.
    pub async fn execute(&self, action: &Action) -> ExecutionResult {
        debug!(
            selector = %action.selector,
            control = %action.control,
            "executing action"
        );

        let result = match action.control {
            ControlKind::Select => primitives::select::select_option(self, action).await,
            ControlKind::CustomDropdown => primitives::dropdown::select_custom(self, action).await,
            ControlKind::Radio => primitives::radio::choose(self, action).await,
            ControlKind::Checkbox => primitives::checkbox::set_state(self, action).await,
            ControlKind::File => primitives::file::upload(self, action).await,
            ControlKind::Date => primitives::date::fill_date(self, action).await,
            ControlKind::Hidden => primitives::text::fill_text(self, action).await,
            // Text family: text, email, tel, url, number, textarea.
            _ => {
                sleep(self.config.humanize_delay).await;
                primitives::text::fill_text(self, action).await
            }
        };

        if result.success {
            info!(
                selector = %action.selector,
                value = %result.actual_value.as_deref().unwrap_or(""),
                "action succeeded"
            );
        } else {
            warn!(
                selector = %action.selector,
                error = %result.error.as_deref().unwrap_or("unknown"),
                "action failed"
            );
        }
        result
    }

    /// Read the element's current state, waiting for it to appear when it
    /// is not in the DOM yet.
    pub(crate) async fn element_state(&self, selector: &str) -> Option<ElementState> {
        if let Some(state) = self.read_state(selector).await {
            return Some(state);
        }
        if self
            .driver
            .wait_for(selector, self.config.element_timeout)
            .await
            .is_err()
        {
            return None;
        }
        self.read_state(selector).await
    }

    pub(crate) async fn read_state(&self, selector: &str) -> Option<ElementState> {
        let script = format!(
            r#"(() => {{
                const el = document.querySelector({sel});
                if (!el) return null;
                const style = window.getComputedStyle(el);
                return {{
                    tag: el.tagName.toLowerCase(),
                    type: el.type || '',
                    hidden: style.display === 'none' || style.visibility === 'hidden'
                        || (el.offsetParent === null && el.type !== 'hidden'),
                    value: el.value || '',
                    checked: !!el.checked
                }};
            }})()"#,
            sel = js_string(selector),
        );
        self.driver
            .eval_value::<Option<ElementState>>(&script)
            .await
            .ok()
            .flatten()
    }

    pub(crate) async fn read_value(&self, selector: &str) -> Option<String> {
        let script = format!(
            "(() => {{ const el = document.querySelector({sel}); return el ? (el.value || '') : null; }})()",
            sel = js_string(selector),
        );
        self.driver
            .eval_value::<Option<String>>(&script)
            .await
            .ok()
            .flatten()
    }

    pub(crate) async fn scroll_into_view(&self, selector: &str) {
        let script = format!(
            "(() => {{ const el = document.querySelector({sel}); if (el) el.scrollIntoView({{ block: 'center' }}); }})()",
            sel = js_string(selector),
        );
        let _ = self.driver.eval(&script).await;
    }

    /// Dispatch a synthetic blur so framework listeners run, then press Tab
    /// to move real focus along.
    pub(crate) async fn blur(&self, selector: &str) {
        let script = format!(
            r#"(() => {{
                const el = document.querySelector({sel});
                if (el) {{
                    el.blur();
                    el.dispatchEvent(new Event('blur', {{ bubbles: true }}));
                }}
            }})()"#,
            sel = js_string(selector),
        );
        let _ = self.driver.eval(&script).await;
        let _ = self.driver.press("Tab").await;
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ElementState {
    #[serde(default)]
    pub tag: String,
    #[serde(default, rename = "type")]
    pub input_type: String,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub checked: bool,
}
