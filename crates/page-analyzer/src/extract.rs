//! Pre-LLM page extraction.
//!
//! Everything here is non-destructive: the content script works on a clone
//! of the body so chrome that gets stripped for the prompt (nav, footers,
//! cookie banners) survives for the fill that follows.

use serde_json::Value;
use tracing::warn;

use browser_driver::Driver;

/// Character cap for the content sent to the model.
pub const CONTENT_CAP: usize = 5_000;
/// Button candidates included in the prompt.
pub const BUTTON_CAP: usize = 20;
/// Forms included in the prompt.
pub const FORM_CAP: usize = 5;

/// Everything the analyzer needs from one loaded page.
#[derive(Clone, Debug)]
pub struct PageSnapshot {
    pub url: String,
    pub title: String,
    pub content: String,
    pub buttons: Value,
    pub forms: Value,
    pub form_count: usize,
}

const CONTENT_SCRIPT: &str = r#"
(() => {
    const clone = document.body ? document.body.cloneNode(true) : null;
    if (!clone) return '';
    const unwanted = [
        'script', 'style', 'nav', 'header', 'footer',
        '.cookie-banner', '.privacy-notice', '.advertisement', '.social-share',
        '[class*="popup"]', '[class*="modal"]'
    ];
    for (const selector of unwanted) {
        clone.querySelectorAll(selector).forEach(el => el.remove());
    }
    const mainSelectors = ['main', 'article', '[role="main"]', '.job-description', '.content'];
    for (const selector of mainSelectors) {
        const el = clone.querySelector(selector);
        if (el && el.textContent.trim().length > 100) {
            return el.textContent.trim();
        }
    }
    return clone.textContent.trim();
})()
"#;

const BUTTONS_SCRIPT: &str = r#"
(() => {
    const selectors = [
        'button',
        'a[href*="apply"]',
        'a[href*="candidate"]',
        'input[type="submit"]',
        'input[type="button"]',
        '[role="button"]'
    ];
    const excluded = ['cookie', 'privacy', 'terms', 'login', 'sign in', 'register'];

    const elements = new Set();
    for (const selector of selectors) {
        document.querySelectorAll(selector).forEach(el => {
            if (el.offsetWidth > 0 && el.offsetHeight > 0) elements.add(el);
        });
    }

    const buttons = [];
    elements.forEach(el => {
        const text = (el.textContent || '').trim() || el.value || '';
        const lowered = text.toLowerCase();
        if (excluded.some(word => lowered.includes(word))) return;

        let selector;
        if (el.id) {
            selector = '#' + CSS.escape(el.id);
        } else if (typeof el.className === 'string' && el.className.trim()) {
            selector = el.tagName.toLowerCase() + '.' + el.className.trim().split(/\s+/).join('.');
        } else {
            selector = el.tagName.toLowerCase();
        }

        buttons.push({
            text: text.substring(0, 80),
            selector: selector,
            element_type: el.tagName.toLowerCase(),
            href: el.href || '',
            aria_label: el.getAttribute('aria-label') || '',
            data_action: el.getAttribute('data-action') || ''
        });
    });
    return buttons;
})()
"#;

const FORMS_SCRIPT: &str = r#"
(() => {
    const forms = [];
    document.querySelectorAll('form').forEach((form, index) => {
        const fields = [];
        form.querySelectorAll('input, select, textarea').forEach(field => {
            if (field.type === 'hidden') return;
            let label = '';
            if (field.id) {
                const labelEl = document.querySelector('label[for="' + CSS.escape(field.id) + '"]');
                if (labelEl) label = labelEl.textContent.trim();
            }
            if (!label) {
                const parentLabel = field.closest('label');
                if (parentLabel) label = parentLabel.textContent.trim();
            }
            fields.push({
                type: field.type || field.tagName.toLowerCase(),
                name: field.name || '',
                id: field.id || '',
                label: label.substring(0, 80),
                placeholder: field.placeholder || '',
                required: field.required || false
            });
        });
        forms.push({
            index: index,
            id: form.id || '',
            action: form.action || '',
            method: form.method || '',
            field_count: fields.length,
            fields: fields.slice(0, 25)
        });
    });
    return forms;
})()
"#;

const CAPTCHA_SCRIPT: &str = r#"
(() => {
    const markers = [
        'iframe[src*="recaptcha"]',
        'iframe[src*="captcha"]',
        'iframe[src*="turnstile"]',
        'iframe[src*="hcaptcha"]',
        'div[class*="captcha"]',
        'div[id*="captcha"]',
        '.g-recaptcha',
        '[data-captcha]'
    ];
    return markers.some(selector => document.querySelector(selector) !== null);
})()
"#;

/// Capture everything the classifier prompt needs from the live page.
pub async fn capture(driver: &Driver) -> PageSnapshot {
    let url = driver.current_url().await.unwrap_or_default();
    let title = driver.title().await.unwrap_or_default();

    let mut content: String = driver
        .eval_value(CONTENT_SCRIPT)
        .await
        .unwrap_or_else(|err| {
            warn!(error = %err, "content extraction failed");
            String::new()
        });
    content = squeeze_whitespace(&content);
    if content.len() > CONTENT_CAP {
        let mut cut = CONTENT_CAP;
        while !content.is_char_boundary(cut) {
            cut -= 1;
        }
        content.truncate(cut);
        content.push_str("...");
    }

    let buttons: Value = driver.eval_value(BUTTONS_SCRIPT).await.unwrap_or(Value::Array(vec![]));
    let forms: Value = driver.eval_value(FORMS_SCRIPT).await.unwrap_or(Value::Array(vec![]));

    let form_count = forms.as_array().map(Vec::len).unwrap_or(0);
    let buttons = cap_array(buttons, BUTTON_CAP);
    let forms = cap_array(forms, FORM_CAP);

    PageSnapshot {
        url,
        title,
        content,
        buttons,
        forms,
        form_count,
    }
}

/// Whether the page carries a captcha widget.
pub async fn detect_captcha(driver: &Driver) -> bool {
    driver.eval_value::<bool>(CAPTCHA_SCRIPT).await.unwrap_or(false)
}

fn cap_array(value: Value, cap: usize) -> Value {
    match value {
        Value::Array(mut list) => {
            list.truncate(cap);
            Value::Array(list)
        }
        other => other,
    }
}

/// Collapse whitespace runs so the cap is spent on words, not newlines.
pub fn squeeze_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last_was_space = false;
    for ch in text.chars() {
        if ch.is_whitespace() {
            if !last_was_space {
                out.push(' ');
                last_was_space = true;
            }
        } else {
            out.push(ch);
            last_was_space = false;
        }
    }
    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn whitespace_squeeze() {
        assert_eq!(squeeze_whitespace("a\n\n  b\t c"), "a b c");
        assert_eq!(squeeze_whitespace("  "), "");
    }

    #[test]
    fn arrays_are_capped() {
        let list: Vec<Value> = (0..30).map(|i| json!(i)).collect();
        let capped = cap_array(Value::Array(list), 20);
        assert_eq!(capped.as_array().unwrap().len(), 20);
    }
}
