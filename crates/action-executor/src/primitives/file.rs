//! File uploads.
//!
//! ATS file inputs are frequently hidden or replaced by styled upload
//! widgets. Strategy: use the mapped selector when it is a real file input;
//! otherwise click a known upload trigger and re-acquire the generic file
//! input, then attach via CDP and verify the input actually holds a file.

use std::time::Duration;

use tokio::time::sleep;
use tracing::debug;

use applyflow_core_types::{Action, ErrorKind, ExecutionResult};
use browser_driver::js_string;
use dom_snapshot::Snapshotter;

use crate::executor::ActionExecutor;

const UPLOAD_SETTLE: Duration = Duration::from_secs(1);
const TRIGGER_SETTLE: Duration = Duration::from_millis(500);

pub async fn upload(executor: &ActionExecutor<'_>, action: &Action) -> ExecutionResult {
    let result = ExecutionResult::pending(action);
    let path = action.value.as_str();

    let input_selector = match locate_file_input(executor, &action.selector).await {
        Some(selector) => selector,
        None => {
            return result.fail(
                ErrorKind::SelectorNotFound,
                "no file input found for upload",
            );
        }
    };

    if let Err(err) = executor.driver.set_input_files(&input_selector, path).await {
        return result.fail(err.kind(), err.to_string());
    }
    sleep(UPLOAD_SETTLE).await;

    let file_name = path.rsplit('/').next().unwrap_or(path).to_string();
    if verify_upload(executor, &input_selector, &file_name).await {
        result.succeed(file_name)
    } else {
        result.fail(
            ErrorKind::FillVerifyMismatch,
            format!("upload of '{file_name}' left no artifact"),
        )
    }
}

/// Resolve the actual `input[type=file]` to attach to.
async fn locate_file_input(executor: &ActionExecutor<'_>, selector: &str) -> Option<String> {
    if let Some(state) = executor.read_state(selector).await {
        if state.input_type == "file" {
            return Some(selector.to_string());
        }
    }

    // The mapped selector is not a file input; resolve through the upload
    // label (covers hidden inputs behind styled widgets).
    let snapshotter = Snapshotter::new(executor.driver);
    for label in ["resume", "cv", "cover letter", "upload"] {
        if let Some(found) = snapshotter.find_file_input_for_label(label).await {
            debug!(label, selector = %found, "file input resolved via label");
            return Some(found);
        }
    }

    // A bare file input anywhere on the page.
    if file_input_present(executor).await {
        return Some("input[type=\"file\"]".to_string());
    }

    // Click the usual upload affordances and look again.
    if click_upload_trigger(executor).await {
        debug!("clicked upload trigger; re-acquiring file input");
        sleep(TRIGGER_SETTLE).await;
        if file_input_present(executor).await {
            return Some("input[type=\"file\"]".to_string());
        }
    }
    None
}

async fn file_input_present(executor: &ActionExecutor<'_>) -> bool {
    executor
        .driver
        .query("input[type=\"file\"]")
        .await
        .unwrap_or(false)
}

async fn click_upload_trigger(executor: &ActionExecutor<'_>) -> bool {
    let script = r#"(() => {
        const words = ['upload', 'choose', 'browse', 'attach'];
        const candidates = document.querySelectorAll('button, label, [class*="upload"], [draggable="true"]');
        for (const el of candidates) {
            const text = (el.textContent || '').trim().toLowerCase();
            if (words.some(word => text.includes(word))) {
                el.click();
                return true;
            }
        }
        return false;
    })()"#;
    executor
        .driver
        .eval_value::<bool>(script)
        .await
        .unwrap_or(false)
}

/// The input holds a file, or the page renders the file name somewhere.
async fn verify_upload(executor: &ActionExecutor<'_>, selector: &str, file_name: &str) -> bool {
    let script = format!(
        r#"(() => {{
            const el = document.querySelector({sel});
            if (el && el.files && el.files.length > 0) return true;
            const name = {name};
            return (document.body.innerText || '').includes(name);
        }})()"#,
        sel = js_string(selector),
        name = js_string(file_name),
    );
    executor.driver.eval_value::<bool>(&script).await.unwrap_or(false)
}
