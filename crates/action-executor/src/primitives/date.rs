//! Date and datetime-local inputs: clear, fill the ISO string, dispatch
//! `change`, read back.

use applyflow_core_types::{Action, ErrorKind, ExecutionResult};

use crate::executor::ActionExecutor;

pub async fn fill_date(executor: &ActionExecutor<'_>, action: &Action) -> ExecutionResult {
    let result = ExecutionResult::pending(action);
    let selector = action.selector.as_str();

    if executor.element_state(selector).await.is_none() {
        return result.fail(
            ErrorKind::SelectorNotFound,
            format!("no element for {selector}"),
        );
    }

    executor.scroll_into_view(selector).await;
    if let Err(err) = executor.driver.fill(selector, "").await {
        return result.fail(ErrorKind::SelectorNotFound, err.to_string());
    }
    if let Err(err) = executor.driver.fill(selector, &action.value).await {
        return result.fail(ErrorKind::SelectorNotFound, err.to_string());
    }

    match executor.read_value(selector).await {
        Some(actual) if !actual.is_empty() => result.succeed(actual),
        _ => result.fail(
            ErrorKind::FillVerifyMismatch,
            format!("date input {selector} stayed empty; value may not be ISO formatted"),
        ),
    }
}
