//! Checkboxes: parse the intended boolean, toggle only when the current
//! state differs, confirm the final state.

use applyflow_core_types::{Action, ErrorKind, ExecutionResult};

use crate::executor::ActionExecutor;

/// Spellings that mean "set the box".
pub fn parse_checkbox_value(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "yes" | "true" | "1" | "on" | "checked"
    )
}

pub async fn set_state(executor: &ActionExecutor<'_>, action: &Action) -> ExecutionResult {
    let result = ExecutionResult::pending(action);
    let selector = action.selector.as_str();
    let should_check = parse_checkbox_value(&action.value);

    let state = match executor.element_state(selector).await {
        Some(state) => state,
        None => {
            return result.fail(
                ErrorKind::SelectorNotFound,
                format!("no element for {selector}"),
            );
        }
    };

    executor.scroll_into_view(selector).await;
    if state.checked != should_check {
        if let Err(err) = executor.driver.click(selector).await {
            return result.fail(ErrorKind::SelectorNotFound, err.to_string());
        }
    }

    let final_state = executor
        .read_state(selector)
        .await
        .map(|s| s.checked)
        .unwrap_or(!should_check);
    if final_state == should_check {
        result.succeed(if final_state { "true" } else { "false" })
    } else {
        result.fail(
            ErrorKind::FillVerifyMismatch,
            format!("checkbox expected checked={should_check}, got {final_state}"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthy_spellings() {
        for value in ["yes", "Yes", "true", "1", "on", "checked"] {
            assert!(parse_checkbox_value(value), "{value}");
        }
        for value in ["no", "false", "0", "off", ""] {
            assert!(!parse_checkbox_value(value), "{value}");
        }
    }
}
