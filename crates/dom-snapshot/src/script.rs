//! In-page collection scripts.
//!
//! Each script returns plain JSON so the driver can deserialize the result
//! directly. Field names are snake_case to match the Rust records.

/// Walks the candidate selectors, resolves labels, enumerates options,
/// sorts by on-screen position (10px row tolerance) and strips the
/// rectangles before returning.
///
/// Visibility rules: `display:none` and `visibility:hidden` elements are
/// skipped, except file and hidden inputs - ATS upload inputs are routinely
/// parked off screen on purpose.
pub const COLLECT_ELEMENTS_SCRIPT: &str = r#"
(() => {
    const interactiveSelectors = [
        'input', 'select', 'textarea',
        '[role="combobox"]', '[role="listbox"]', '[role="radio"]', '[role="checkbox"]',
        '[contenteditable="true"]'
    ];

    const elements = [];
    const processed = new Set();

    function ownText(el) {
        if (el.tagName.toLowerCase() === 'label') {
            return Array.from(el.childNodes)
                .filter(node => node.nodeType === Node.TEXT_NODE)
                .map(node => node.textContent.trim())
                .join(' ');
        }
        return el.textContent ? el.textContent.trim().substring(0, 100) : '';
    }

    function findLabel(el) {
        if (el.id) {
            const label = document.querySelector('label[for="' + CSS.escape(el.id) + '"]');
            if (label) return ownText(label);
        }
        const parentLabel = el.closest('label');
        if (parentLabel) return ownText(parentLabel);
        let sibling = el.previousElementSibling;
        while (sibling) {
            if (sibling.tagName.toLowerCase() === 'label') {
                return ownText(sibling);
            }
            sibling = sibling.previousElementSibling;
        }
        return '';
    }

    function logicalGroup(el) {
        const groupSelectors = ['fieldset', '[role="group"]', '.form-group', '.field-group', '[class*="group"]'];
        for (const selector of groupSelectors) {
            const group = el.closest(selector);
            if (group) {
                if (group.id) return group.id;
                if (typeof group.className === 'string' && group.className) {
                    return group.className.split(/\s+/)[0];
                }
                return 'unnamed-group';
            }
        }
        return 'default';
    }

    for (const selector of interactiveSelectors) {
        for (const el of document.querySelectorAll(selector)) {
            const uniqueId = el.id || el.name || (el.tagName + '_' + elements.length);
            if (processed.has(uniqueId)) continue;
            processed.add(uniqueId);

            const type = el.type || '';
            if (type !== 'file' && type !== 'hidden') {
                const style = window.getComputedStyle(el);
                if (style.display === 'none' || style.visibility === 'hidden') continue;
            }

            const isCustomDropdown =
                el.getAttribute('role') === 'combobox' ||
                el.getAttribute('aria-haspopup') === 'listbox';

            const record = {
                tag: el.tagName.toLowerCase(),
                type: type || el.tagName.toLowerCase(),
                id: el.id || '',
                name: el.name || '',
                class_name: (typeof el.className === 'string' ? el.className : '') || '',
                role: el.getAttribute('role') || '',
                aria_label: el.getAttribute('aria-label') || '',
                aria_labelledby: el.getAttribute('aria-labelledby') || '',
                label: findLabel(el),
                placeholder: el.placeholder || '',
                inner_text: ownText(el),
                value: el.value || '',
                checked: el.checked || false,
                required: el.required || false,
                disabled: el.disabled || false,
                visible: el.offsetParent !== null || type === 'file',
                is_custom_dropdown: isCustomDropdown,
                options: [],
                logical_group: logicalGroup(el),
                rect: el.getBoundingClientRect()
            };

            if (el.tagName.toLowerCase() === 'select') {
                record.options = Array.from(el.options).map(opt => ({
                    value: opt.value,
                    text: opt.textContent.trim()
                }));
            }
            if (type === 'radio' || type === 'checkbox') {
                record.value = el.value || 'on';
            }

            elements.push(record);
        }
    }

    elements.sort((a, b) => {
        if (Math.abs(a.rect.top - b.rect.top) > 10) {
            return a.rect.top - b.rect.top;
        }
        return a.rect.left - b.rect.left;
    });
    elements.forEach(el => delete el.rect);

    return elements;
})()
"#;

/// Collects the texts of the currently visible pop-up options, deduped.
pub const HARVEST_OPTIONS_SCRIPT: &str = r#"
(() => {
    const optionSelectors = [
        '[role="option"]',
        '[role="listbox"] li',
        '[class*="option"]',
        '[class*="menu"] li',
        '[class*="dropdown"] li'
    ];

    const options = [];
    const seen = new Set();

    for (const selector of optionSelectors) {
        for (const el of document.querySelectorAll(selector)) {
            if (el.offsetParent === null) continue;
            const text = el.textContent.trim();
            if (!text || seen.has(text)) continue;
            seen.add(text);
            options.push({
                text: text,
                value: el.getAttribute('data-value') || el.getAttribute('value') || text
            });
        }
    }

    return options;
})()
"#;

/// Three-strategy lookup for the file input behind an upload label.
pub fn file_input_for_label_script(label_text: &str) -> String {
    let needle = serde_json::to_string(&label_text.to_lowercase()).unwrap_or_else(|_| "\"\"".into());
    format!(
        r#"
(() => {{
    const needle = {needle};
    const labels = Array.from(document.querySelectorAll('label, [class*="label"], [class*="upload"]'));
    const target = labels.find(label =>
        label.textContent.toLowerCase().includes(needle)
    );
    if (!target) return null;

    const forAttr = target.getAttribute('for');
    if (forAttr) {{
        const input = document.getElementById(forAttr);
        if (input && input.type === 'file') {{
            return '#' + CSS.escape(forAttr);
        }}
    }}

    const inner = target.querySelector('input[type="file"]');
    if (inner) {{
        return inner.id ? '#' + CSS.escape(inner.id) : 'input[type="file"]';
    }}

    const region = target.closest('div, section, form');
    if (region) {{
        const nearby = region.querySelector('input[type="file"]');
        if (nearby) {{
            return nearby.id ? '#' + CSS.escape(nearby.id) : 'input[type="file"]';
        }}
    }}

    return null;
}})()
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_needle_is_json_escaped() {
        let script = file_input_for_label_script("Upload \"Resume\"");
        assert!(script.contains(r#""upload \"resume\"""#));
    }
}
