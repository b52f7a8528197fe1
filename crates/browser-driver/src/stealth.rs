//! Fingerprint smoothing applied on context creation.
//!
//! Requirements-only: neutralize `navigator.webdriver`, present a plausible
//! plugin and language surface, and use a current desktop user agent. No
//! attempt is made to defeat dedicated anti-bot vendors.

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Injected via `Page.addScriptToEvaluateOnNewDocument` so it runs before
/// any site script on every navigation.
pub const STEALTH_INIT_SCRIPT: &str = r#"
(() => {
    Object.defineProperty(navigator, 'webdriver', { get: () => undefined });
    Object.defineProperty(navigator, 'languages', { get: () => ['en-US', 'en'] });
    if (navigator.plugins && navigator.plugins.length === 0) {
        Object.defineProperty(navigator, 'plugins', { get: () => ({ length: 3 }) });
    }
    if (!window.chrome) {
        window.chrome = { runtime: {} };
    }
})();
"#;
