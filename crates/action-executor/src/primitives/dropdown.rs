//! Custom dropdowns (React/Vue composite widgets with click-to-open
//! semantics).
//!
//! Open the trigger, search the usual option containers for the target
//! text, fall back to harvesting whatever is visible and fuzzy-matching it,
//! and press Escape when nothing fits so the widget does not swallow later
//! actions.

use std::time::Duration;

use tokio::time::sleep;
use tracing::debug;

use applyflow_core_types::{Action, ErrorKind, ExecutionResult, SelectOption};
use browser_driver::js_string;

use crate::executor::ActionExecutor;
use crate::matching::match_option;

const OPEN_ANIMATION: Duration = Duration::from_millis(300);
const CLOSE_SETTLE: Duration = Duration::from_millis(200);

pub async fn select_custom(executor: &ActionExecutor<'_>, action: &Action) -> ExecutionResult {
    let result = ExecutionResult::pending(action);
    let selector = action.selector.as_str();
    let target = action.value.as_str();

    executor.scroll_into_view(selector).await;
    if executor.driver.click(selector).await.is_err() {
        return result.fail(
            ErrorKind::SelectorNotFound,
            format!("dropdown trigger {selector} not found"),
        );
    }
    sleep(OPEN_ANIMATION).await;

    // Pass 1: direct containment search over the option containers.
    let mut clicked = click_option_containing(executor, target).await;

    // Pass 2: harvest what is visible and fuzzy-match it.
    if clicked.is_none() {
        let visible = harvest_visible_options(executor).await;
        let catalog: Vec<SelectOption> = visible
            .iter()
            .map(|text| SelectOption::new(text.clone(), text.clone()))
            .collect();
        if let Some(outcome) = match_option(target, &catalog) {
            let text = &catalog[outcome.index].text;
            debug!(target, matched = %text, rule = ?outcome.rule, "fuzzy dropdown match");
            clicked = click_option_exact(executor, text).await;
        }
    }

    if clicked.is_none() {
        let _ = executor.driver.press("Escape").await;
        return result.fail(
            ErrorKind::OptionNotMatched,
            format!("no visible option matched '{target}'"),
        );
    }

    sleep(CLOSE_SETTLE).await;
    let actual = read_trigger_text(executor, selector)
        .await
        .unwrap_or_else(|| clicked.unwrap_or_default());
    result.succeed(actual.trim().to_string())
}

/// Click the first visible element whose text contains the target, walking
/// the option-container families in fixed order.
async fn click_option_containing(executor: &ActionExecutor<'_>, target: &str) -> Option<String> {
    let script = format!(
        r#"(() => {{
            const target = {target}.toLowerCase();
            const families = ['[role="option"]', 'li', '[class*="option"]', '[class*="menu"] *'];
            for (const family of families) {{
                for (const el of document.querySelectorAll(family)) {{
                    if (el.offsetParent === null) continue;
                    const text = (el.textContent || '').trim();
                    if (text && text.toLowerCase().includes(target)) {{
                        el.click();
                        return text;
                    }}
                }}
            }}
            return null;
        }})()"#,
        target = js_string(target),
    );
    executor
        .driver
        .eval_value::<Option<String>>(&script)
        .await
        .ok()
        .flatten()
}

async fn click_option_exact(executor: &ActionExecutor<'_>, text: &str) -> Option<String> {
    let script = format!(
        r#"(() => {{
            const wanted = {wanted};
            const families = ['[role="option"]', 'li', '[class*="option"]', '[class*="menu"] *'];
            for (const family of families) {{
                for (const el of document.querySelectorAll(family)) {{
                    if (el.offsetParent === null) continue;
                    if ((el.textContent || '').trim() === wanted) {{
                        el.click();
                        return wanted;
                    }}
                }}
            }}
            return null;
        }})()"#,
        wanted = js_string(text),
    );
    executor
        .driver
        .eval_value::<Option<String>>(&script)
        .await
        .ok()
        .flatten()
}

async fn harvest_visible_options(executor: &ActionExecutor<'_>) -> Vec<String> {
    let script = r#"(() => {
        const selectors = ['[role="option"]', 'li', '[class*="option"]', '[class*="item"]'];
        const texts = new Set();
        for (const selector of selectors) {
            for (const el of document.querySelectorAll(selector)) {
                if (el.offsetParent === null) continue;
                const text = el.textContent.trim();
                if (text) texts.add(text);
            }
        }
        return Array.from(texts);
    })()"#;
    executor
        .driver
        .eval_value::<Vec<String>>(script)
        .await
        .unwrap_or_default()
}

async fn read_trigger_text(executor: &ActionExecutor<'_>, selector: &str) -> Option<String> {
    let script = format!(
        r#"(() => {{
            const el = document.querySelector({sel});
            if (!el) return null;
            return (el.value || el.textContent || '').trim();
        }})()"#,
        sel = js_string(selector),
    );
    executor
        .driver
        .eval_value::<Option<String>>(&script)
        .await
        .ok()
        .flatten()
        .filter(|text| !text.is_empty())
}
