//! Native `<select>` handling.
//!
//! Enumerate the options, pick one through the matching ladder, then try
//! selection by value, by visible text, by index - whichever sticks first -
//! and read back the selected option's text.

use serde::Deserialize;
use tracing::debug;

use applyflow_core_types::{Action, ErrorKind, ExecutionResult, SelectOption};
use browser_driver::js_string;

use crate::executor::ActionExecutor;
use crate::matching::match_option;

use super::dropdown;

#[derive(Debug, Deserialize)]
struct EnumeratedOption {
    value: String,
    text: String,
}

pub async fn select_option(executor: &ActionExecutor<'_>, action: &Action) -> ExecutionResult {
    let result = ExecutionResult::pending(action);
    let selector = action.selector.as_str();

    let state = match executor.element_state(selector).await {
        Some(state) => state,
        None => {
            return result.fail(
                ErrorKind::SelectorNotFound,
                format!("no element for {selector}"),
            );
        }
    };

    // Custom widgets routinely masquerade as selects in mapper output.
    if state.tag != "select" {
        debug!(selector, tag = %state.tag, "not a native select; using dropdown path");
        return dropdown::select_custom(executor, action).await;
    }

    let options = match enumerate_options(executor, selector).await {
        Some(options) => options,
        None => {
            return result.fail(
                ErrorKind::SelectorNotFound,
                format!("could not enumerate options of {selector}"),
            );
        }
    };

    let catalog: Vec<SelectOption> = options
        .iter()
        .map(|o| SelectOption::new(o.value.clone(), o.text.clone()))
        .collect();
    let outcome = match match_option(&action.value, &catalog) {
        Some(outcome) => outcome,
        None => {
            return result.fail(
                ErrorKind::OptionNotMatched,
                format!("no option of {selector} matched '{}'", action.value),
            );
        }
    };
    let chosen = &options[outcome.index];

    // Selection attempts: by value, then by index.
    let read_back = apply_by_value(executor, selector, &chosen.value).await;
    let read_back = match read_back {
        Some(text) if text == chosen.text.trim() => Some(text),
        _ => apply_by_index(executor, selector, outcome.index).await,
    };

    match read_back {
        Some(text) if text == chosen.text.trim() => result.succeed(text),
        Some(text) => result.fail(
            ErrorKind::FillVerifyMismatch,
            format!("selected '{}' but read back '{}'", chosen.text, text),
        ),
        None => result.fail(
            ErrorKind::FillVerifyMismatch,
            format!("selection on {selector} could not be verified"),
        ),
    }
}

async fn enumerate_options(
    executor: &ActionExecutor<'_>,
    selector: &str,
) -> Option<Vec<EnumeratedOption>> {
    let script = format!(
        r#"(() => {{
            const el = document.querySelector({sel});
            if (!el || !el.options) return null;
            return Array.from(el.options).map(opt => ({{
                value: opt.value,
                text: opt.textContent.trim()
            }}));
        }})()"#,
        sel = js_string(selector),
    );
    executor
        .driver
        .eval_value::<Option<Vec<EnumeratedOption>>>(&script)
        .await
        .ok()
        .flatten()
}

async fn apply_by_value(
    executor: &ActionExecutor<'_>,
    selector: &str,
    value: &str,
) -> Option<String> {
    let script = format!(
        r#"(() => {{
            const el = document.querySelector({sel});
            if (!el) return null;
            el.value = {val};
            el.dispatchEvent(new Event('change', {{ bubbles: true }}));
            const selected = el.options[el.selectedIndex];
            return selected ? selected.textContent.trim() : '';
        }})()"#,
        sel = js_string(selector),
        val = js_string(value),
    );
    executor
        .driver
        .eval_value::<Option<String>>(&script)
        .await
        .ok()
        .flatten()
}

async fn apply_by_index(
    executor: &ActionExecutor<'_>,
    selector: &str,
    index: usize,
) -> Option<String> {
    let script = format!(
        r#"(() => {{
            const el = document.querySelector({sel});
            if (!el) return null;
            el.selectedIndex = {index};
            el.dispatchEvent(new Event('change', {{ bubbles: true }}));
            const selected = el.options[el.selectedIndex];
            return selected ? selected.textContent.trim() : '';
        }})()"#,
        sel = js_string(selector),
    );
    executor
        .driver
        .eval_value::<Option<String>>(&script)
        .await
        .ok()
        .flatten()
}
