//! The driver itself: one browser process, one page, exclusively owned by a
//! single session.

use std::path::Path;
use std::time::Duration;

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::dom::SetFileInputFilesParams;
use chromiumoxide::cdp::browser_protocol::page::{
    AddScriptToEvaluateOnNewDocumentParams, CaptureScreenshotFormat,
};
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::stealth::{DEFAULT_USER_AGENT, STEALTH_INIT_SCRIPT};
use crate::{DriverError, DriverResult};

const NAV_ATTEMPTS: u32 = 3;
const NAV_BACKOFF: Duration = Duration::from_secs(3);
const DCL_SETTLE: Duration = Duration::from_secs(2);

#[derive(Clone, Debug)]
pub struct DriverOptions {
    pub headless: bool,
    pub viewport: (u32, u32),
    pub user_agent: String,
    /// Initial-load budget for the network-idle attempt.
    pub nav_timeout: Duration,
    /// Budget for single-element waits.
    pub element_timeout: Duration,
    pub chrome_executable: Option<String>,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            headless: true,
            viewport: (1280, 720),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            nav_timeout: Duration::from_secs(60),
            element_timeout: Duration::from_secs(5),
            chrome_executable: None,
        }
    }
}

/// One Chromium instance with a single active page.
pub struct Driver {
    browser: Browser,
    page: Page,
    handler_task: JoinHandle<()>,
    options: DriverOptions,
}

impl Driver {
    /// Launch the browser, open a blank page, and apply fingerprint
    /// smoothing.
    pub async fn launch(options: DriverOptions) -> DriverResult<Self> {
        let mut builder = BrowserConfig::builder()
            .window_size(options.viewport.0, options.viewport.1)
            .arg("--disable-blink-features=AutomationControlled");
        if !options.headless {
            builder = builder.with_head();
        }
        if let Some(ref executable) = options.chrome_executable {
            builder = builder.chrome_executable(executable);
        }
        let config = builder.build().map_err(DriverError::LaunchFailed)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|err| DriverError::LaunchFailed(err.to_string()))?;

        // The handler stream must be polled for the CDP connection to make
        // progress.
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|err| DriverError::LaunchFailed(err.to_string()))?;

        page.set_user_agent(options.user_agent.as_str())
            .await
            .map_err(|err| DriverError::CdpIo(err.to_string()))?;

        let init_script = AddScriptToEvaluateOnNewDocumentParams::builder()
            .source(STEALTH_INIT_SCRIPT)
            .build()
            .map_err(DriverError::CdpIo)?;
        page.execute(init_script)
            .await
            .map_err(|err| DriverError::CdpIo(err.to_string()))?;

        info!(headless = options.headless, "browser launched");
        Ok(Self {
            browser,
            page,
            handler_task,
            options,
        })
    }

    /// Navigate with the load-strategy ladder.
    ///
    /// Per attempt: wait for network idle within the navigation budget; on
    /// timeout fall back to dom-content-loaded plus a fixed settle. Up to
    /// three attempts with backoff; the final attempt settles for the plain
    /// load event.
    pub async fn goto(&self, url: &str) -> DriverResult<()> {
        let mut last_error = None;
        for attempt in 1..=NAV_ATTEMPTS {
            let strategy = if attempt == NAV_ATTEMPTS { "load" } else { "network-idle" };
            debug!(url, attempt, strategy, "navigating");

            let result = if attempt == NAV_ATTEMPTS {
                self.goto_load(url).await
            } else {
                match self.goto_network_idle(url).await {
                    Err(DriverError::NavTimeout { .. }) => {
                        warn!(url, "network idle timed out; falling back to dom-content-loaded");
                        self.goto_dom_content_loaded(url).await
                    }
                    other => other,
                }
            };

            match result {
                Ok(()) => {
                    info!(url, attempt, "page loaded");
                    return Ok(());
                }
                Err(err) => {
                    warn!(url, attempt, error = %err, "navigation attempt failed");
                    last_error = Some(err);
                    if attempt < NAV_ATTEMPTS {
                        sleep(NAV_BACKOFF).await;
                    }
                }
            }
        }
        Err(match last_error {
            Some(DriverError::NavTimeout { url, .. }) => DriverError::NavTimeout {
                url,
                attempts: NAV_ATTEMPTS,
            },
            Some(err) => err,
            None => DriverError::NavFailed {
                url: url.to_string(),
                message: "no attempt executed".into(),
            },
        })
    }

    async fn goto_network_idle(&self, url: &str) -> DriverResult<()> {
        let budget = self.options.nav_timeout;
        let navigate = async {
            self.page
                .goto(url)
                .await
                .map_err(|err| DriverError::NavFailed {
                    url: url.to_string(),
                    message: err.to_string(),
                })?;
            self.page
                .wait_for_navigation()
                .await
                .map_err(|err| DriverError::NavFailed {
                    url: url.to_string(),
                    message: err.to_string(),
                })?;
            // Approximate network idle: no DOM mutations for 500ms after
            // the load event.
            self.eval(QUIET_DOM_SCRIPT).await?;
            Ok(())
        };
        timeout(budget, navigate)
            .await
            .map_err(|_| DriverError::NavTimeout {
                url: url.to_string(),
                attempts: 1,
            })?
    }

    async fn goto_dom_content_loaded(&self, url: &str) -> DriverResult<()> {
        let budget = self.options.nav_timeout;
        let navigate = async {
            self.page
                .goto(url)
                .await
                .map_err(|err| DriverError::NavFailed {
                    url: url.to_string(),
                    message: err.to_string(),
                })?;
            self.eval(DCL_SCRIPT).await?;
            Ok::<(), DriverError>(())
        };
        timeout(budget, navigate)
            .await
            .map_err(|_| DriverError::NavTimeout {
                url: url.to_string(),
                attempts: 1,
            })??;
        sleep(DCL_SETTLE).await;
        Ok(())
    }

    async fn goto_load(&self, url: &str) -> DriverResult<()> {
        let budget = self.options.nav_timeout;
        let navigate = async {
            self.page
                .goto(url)
                .await
                .map_err(|err| DriverError::NavFailed {
                    url: url.to_string(),
                    message: err.to_string(),
                })?;
            self.page
                .wait_for_navigation()
                .await
                .map_err(|err| DriverError::NavFailed {
                    url: url.to_string(),
                    message: err.to_string(),
                })?;
            Ok(())
        };
        timeout(budget, navigate)
            .await
            .map_err(|_| DriverError::NavTimeout {
                url: url.to_string(),
                attempts: 1,
            })?
    }

    /// Whether at least one element matches `selector`.
    pub async fn query(&self, selector: &str) -> DriverResult<bool> {
        let count = self.query_count(selector).await?;
        Ok(count > 0)
    }

    /// Number of elements matching `selector`.
    pub async fn query_count(&self, selector: &str) -> DriverResult<u32> {
        let script = format!(
            "document.querySelectorAll({}).length",
            js_string(selector)
        );
        let value: u64 = self.eval_value(&script).await.unwrap_or(0);
        Ok(value as u32)
    }

    /// Evaluate a script and return its JSON value (null when the script
    /// produces none). Promises are awaited.
    pub async fn eval(&self, script: &str) -> DriverResult<Value> {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|err| DriverError::EvalFailed(err.to_string()))?;
        Ok(result.value().cloned().unwrap_or(Value::Null))
    }

    /// Evaluate a script and deserialize its result.
    pub async fn eval_value<T: DeserializeOwned>(&self, script: &str) -> DriverResult<T> {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|err| DriverError::EvalFailed(err.to_string()))?;
        result
            .into_value()
            .map_err(|err| DriverError::EvalFailed(err.to_string()))
    }

    /// Click the first element matching `selector` (native, trusted event).
    pub async fn click(&self, selector: &str) -> DriverResult<()> {
        let element = self
            .page
            .find_element(selector)
            .await
            .map_err(|_| DriverError::ElementNotFound(selector.to_string()))?;
        let _ = element.scroll_into_view().await;
        element
            .click()
            .await
            .map_err(|err| DriverError::CdpIo(err.to_string()))?;
        Ok(())
    }

    /// Set an input's value through the native property setter and fire the
    /// `input`/`change` events frameworks listen for.
    pub async fn fill(&self, selector: &str, value: &str) -> DriverResult<()> {
        let script = format!(
            r#"(() => {{
                const el = document.querySelector({sel});
                if (!el) return {{ ok: false, reason: 'not-found' }};
                el.focus();
                const proto = el.tagName === 'TEXTAREA'
                    ? window.HTMLTextAreaElement.prototype
                    : window.HTMLInputElement.prototype;
                const setter = Object.getOwnPropertyDescriptor(proto, 'value');
                if (setter && setter.set) {{
                    setter.set.call(el, {val});
                }} else {{
                    el.value = {val};
                }}
                el.dispatchEvent(new Event('input', {{ bubbles: true }}));
                el.dispatchEvent(new Event('change', {{ bubbles: true }}));
                return {{ ok: true }};
            }})()"#,
            sel = js_string(selector),
            val = js_string(value),
        );
        let result = self.eval(&script).await?;
        if result.get("ok").and_then(Value::as_bool).unwrap_or(false) {
            Ok(())
        } else {
            Err(DriverError::ElementNotFound(selector.to_string()))
        }
    }

    /// Type text into the focused element character by character.
    pub async fn type_into(&self, selector: &str, text: &str) -> DriverResult<()> {
        let element = self
            .page
            .find_element(selector)
            .await
            .map_err(|_| DriverError::ElementNotFound(selector.to_string()))?;
        element
            .click()
            .await
            .map_err(|err| DriverError::CdpIo(err.to_string()))?;
        element
            .type_str(text)
            .await
            .map_err(|err| DriverError::CdpIo(err.to_string()))?;
        Ok(())
    }

    /// Press a key on the currently focused element (falls back to body).
    pub async fn press(&self, key: &str) -> DriverResult<()> {
        let element = match self.page.find_element(":focus").await {
            Ok(el) => el,
            Err(_) => self
                .page
                .find_element("body")
                .await
                .map_err(|err| DriverError::CdpIo(err.to_string()))?,
        };
        element
            .press_key(key)
            .await
            .map_err(|err| DriverError::CdpIo(err.to_string()))?;
        Ok(())
    }

    /// Attach a local file to a file input via CDP.
    pub async fn set_input_files(&self, selector: &str, path: &str) -> DriverResult<()> {
        let element = self
            .page
            .find_element(selector)
            .await
            .map_err(|_| DriverError::ElementNotFound(selector.to_string()))?;
        let params = SetFileInputFilesParams::builder()
            .files(vec![path.to_string()])
            .backend_node_id(element.backend_node_id)
            .build()
            .map_err(DriverError::CdpIo)?;
        self.page
            .execute(params)
            .await
            .map_err(|err| DriverError::CdpIo(err.to_string()))?;
        debug!(selector, path, "file attached to input");
        Ok(())
    }

    /// Wait for `selector` to appear in the DOM, MutationObserver-backed.
    pub async fn wait_for(&self, selector: &str, wait: Duration) -> DriverResult<()> {
        let script = format!(
            r#"new Promise((resolve, reject) => {{
                const sel = {sel};
                if (document.querySelector(sel)) {{ resolve(true); return; }}
                const timer = setTimeout(() => {{
                    observer.disconnect();
                    reject(new Error('wait timeout'));
                }}, {timeout_ms});
                const observer = new MutationObserver(() => {{
                    if (document.querySelector(sel)) {{
                        observer.disconnect();
                        clearTimeout(timer);
                        resolve(true);
                    }}
                }});
                observer.observe(document.documentElement, {{
                    childList: true, subtree: true, attributes: true
                }});
            }})"#,
            sel = js_string(selector),
            timeout_ms = wait.as_millis(),
        );
        self.eval(&script)
            .await
            .map_err(|_| DriverError::WaitTimeout(selector.to_string()))?;
        Ok(())
    }

    /// Viewport screenshot saved as PNG.
    pub async fn screenshot(&self, path: impl AsRef<Path>) -> DriverResult<()> {
        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .full_page(true)
            .build();
        self.page
            .save_screenshot(params, path.as_ref())
            .await
            .map_err(|err| DriverError::CdpIo(err.to_string()))?;
        Ok(())
    }

    pub async fn current_url(&self) -> DriverResult<String> {
        self.page
            .url()
            .await
            .map_err(|err| DriverError::CdpIo(err.to_string()))?
            .ok_or_else(|| DriverError::CdpIo("page has no URL".into()))
    }

    pub async fn title(&self) -> DriverResult<String> {
        self.eval_value::<String>("document.title").await.or_else(|_| Ok(String::new()))
    }

    /// Default wait budget for single-element lookups.
    pub fn element_timeout(&self) -> Duration {
        self.options.element_timeout
    }

    /// Close the page and browser, then stop the handler loop.
    pub async fn shutdown(mut self) {
        if let Err(err) = self.browser.close().await {
            warn!(error = %err, "browser close failed");
        }
        let _ = self.browser.wait().await;
        self.handler_task.abort();
    }
}

/// Wait until no DOM mutations for 500ms (bounded at 10s inside the page).
const QUIET_DOM_SCRIPT: &str = r#"new Promise((resolve) => {
    const QUIET_MS = 500;
    const deadline = setTimeout(() => { observer.disconnect(); resolve(true); }, 10000);
    let timer = null;
    const done = () => {
        observer.disconnect();
        clearTimeout(deadline);
        resolve(true);
    };
    const observer = new MutationObserver(() => {
        clearTimeout(timer);
        timer = setTimeout(done, QUIET_MS);
    });
    observer.observe(document.documentElement, { childList: true, subtree: true, attributes: true });
    timer = setTimeout(done, QUIET_MS);
})"#;

/// Resolve once the document has left the loading state.
const DCL_SCRIPT: &str = r#"new Promise((resolve) => {
    if (document.readyState !== 'loading') { resolve(true); return; }
    document.addEventListener('DOMContentLoaded', () => resolve(true), { once: true });
})"#;

/// JSON-encode a string for safe embedding in scripts.
pub fn js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}
