//! Radio groups.
//!
//! From the mapped selector, read the group name, fetch every radio sharing
//! it, resolve each one's label, then match the target value against value
//! and label using the Yes/No and gender equivalence classes. The winning
//! radio is clicked and its `checked` state confirmed.

use serde::Deserialize;
use tracing::debug;

use applyflow_core_types::{Action, ErrorKind, ExecutionResult};
use browser_driver::js_string;

use crate::executor::ActionExecutor;
use crate::matching::radio_equivalent;

#[derive(Debug, Deserialize)]
struct RadioEntry {
    index: usize,
    value: String,
    label: String,
}

pub async fn choose(executor: &ActionExecutor<'_>, action: &Action) -> ExecutionResult {
    let result = ExecutionResult::pending(action);
    let selector = action.selector.as_str();
    let target = action.value.as_str();

    let group_name = match read_group_name(executor, selector).await {
        Some(name) if !name.is_empty() => name,
        Some(_) => {
            return result.fail(
                ErrorKind::OptionNotMatched,
                format!("radio {selector} has no name attribute"),
            );
        }
        None => {
            return result.fail(
                ErrorKind::SelectorNotFound,
                format!("no element for {selector}"),
            );
        }
    };

    let radios = enumerate_group(executor, &group_name).await;
    if radios.is_empty() {
        return result.fail(
            ErrorKind::SelectorNotFound,
            format!("radio group '{group_name}' is empty"),
        );
    }

    let chosen = radios
        .iter()
        .find(|radio| radio_equivalent(target, &radio.value, &radio.label));
    let chosen = match chosen {
        Some(radio) => radio,
        None => {
            return result.fail(
                ErrorKind::OptionNotMatched,
                format!("no radio in '{group_name}' matched '{target}'"),
            );
        }
    };
    debug!(group = %group_name, value = %chosen.value, label = %chosen.label, "radio selected");

    match click_and_confirm(executor, &group_name, chosen.index).await {
        Some(true) => {
            let actual = if chosen.value.is_empty() {
                chosen.label.clone()
            } else {
                chosen.value.clone()
            };
            result.succeed(actual)
        }
        _ => result.fail(
            ErrorKind::FillVerifyMismatch,
            format!("radio '{}' did not report checked", chosen.value),
        ),
    }
}

async fn read_group_name(executor: &ActionExecutor<'_>, selector: &str) -> Option<String> {
    let script = format!(
        "(() => {{ const el = document.querySelector({sel}); return el ? (el.name || '') : null; }})()",
        sel = js_string(selector),
    );
    executor
        .driver
        .eval_value::<Option<String>>(&script)
        .await
        .ok()
        .flatten()
}

async fn enumerate_group(executor: &ActionExecutor<'_>, name: &str) -> Vec<RadioEntry> {
    let script = format!(
        r#"(() => {{
            const radios = document.querySelectorAll('input[type="radio"][name=' + JSON.stringify({name}) + ']');
            return Array.from(radios).map((el, index) => {{
                let label = '';
                if (el.id) {{
                    const forLabel = document.querySelector('label[for="' + CSS.escape(el.id) + '"]');
                    if (forLabel) label = forLabel.textContent.trim();
                }}
                if (!label) {{
                    const parent = el.closest('label');
                    if (parent) label = parent.textContent.trim();
                }}
                return {{ index: index, value: el.value || '', label: label }};
            }});
        }})()"#,
        name = js_string(name),
    );
    executor
        .driver
        .eval_value::<Vec<RadioEntry>>(&script)
        .await
        .unwrap_or_default()
}

async fn click_and_confirm(
    executor: &ActionExecutor<'_>,
    name: &str,
    index: usize,
) -> Option<bool> {
    let script = format!(
        r#"(() => {{
            const radios = document.querySelectorAll('input[type="radio"][name=' + JSON.stringify({name}) + ']');
            const el = radios[{index}];
            if (!el) return null;
            el.click();
            return el.checked;
        }})()"#,
        name = js_string(name),
    );
    executor
        .driver
        .eval_value::<Option<bool>>(&script)
        .await
        .ok()
        .flatten()
}
