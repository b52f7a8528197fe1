//! Text-family fills: text, email, tel, url, number, textarea, hidden.
//!
//! Steps:
//! 1. Locate the element (waiting briefly if it is not in the DOM yet)
//! 2. Hidden `type=hidden` inputs get a scripted assignment with synthetic
//!    input/change events
//! 3. Visible inputs are scrolled into view, cleared, filled, blurred
//!    (synthetic blur plus a Tab press), then read back and compared
//! 4. On mismatch, retry with backoff

use tokio::time::sleep;
use tracing::debug;

use applyflow_core_types::{Action, ErrorKind, ExecutionResult};

use crate::executor::ActionExecutor;

pub async fn fill_text(executor: &ActionExecutor<'_>, action: &Action) -> ExecutionResult {
    let mut result = ExecutionResult::pending(action);
    let selector = action.selector.as_str();
    let value = action.value.as_str();

    for retry in 0..executor.config.max_retries {
        result.retries = retry;

        let state = match executor.element_state(selector).await {
            Some(state) => state,
            None => {
                return result.fail(
                    ErrorKind::SelectorNotFound,
                    format!("no element for {selector}"),
                );
            }
        };

        if state.hidden && state.input_type == "hidden" {
            // Off-DOM assignment is the only way to write these.
            if executor.driver.fill(selector, value).await.is_ok() {
                debug!(selector, "hidden field assigned via script");
                return result.succeed(value);
            }
            return result.fail(
                ErrorKind::SelectorNotFound,
                format!("hidden field assignment failed for {selector}"),
            );
        }

        if state.hidden {
            return result.fail(
                ErrorKind::ElementHiddenUnexpected,
                format!("{selector} is hidden but not type=hidden"),
            );
        }

        executor.scroll_into_view(selector).await;
        if let Err(err) = executor.driver.fill(selector, "").await {
            result = result.fail(ErrorKind::SelectorNotFound, err.to_string());
            sleep(executor.config.retry_backoff).await;
            continue;
        }
        if let Err(err) = executor.driver.fill(selector, value).await {
            result = result.fail(ErrorKind::SelectorNotFound, err.to_string());
            sleep(executor.config.retry_backoff).await;
            continue;
        }

        executor.blur(selector).await;
        sleep(executor.config.post_fill_settle).await;

        let actual = executor.read_value(selector).await.unwrap_or_default();
        if actual == value {
            return result.succeed(actual);
        }

        debug!(selector, expected = value, actual = %actual, "read-back mismatch");
        result.actual_value = Some(actual);
        sleep(executor.config.retry_backoff).await;
    }

    let actual = result.actual_value.clone().unwrap_or_default();
    result.fail(
        ErrorKind::FillVerifyMismatch,
        format!("expected '{value}', read back '{actual}'"),
    )
}
