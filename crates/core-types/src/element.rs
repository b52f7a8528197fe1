//! DOM element records and logical groups emitted by the snapshotter.

use serde::{Deserialize, Serialize};

use crate::ControlKind;

/// One `<option>` of a native select or a harvested custom-dropdown entry.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectOption {
    pub value: String,
    pub text: String,
}

impl SelectOption {
    pub fn new(value: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            text: text.into(),
        }
    }
}

/// A single interactive control, captured once per snapshot.
///
/// Records are ordered by on-screen position (top-to-bottom with a 10-unit
/// row tolerance, then left-to-right). The bounding rectangle used for the
/// sort is dropped inside the page script and never exported.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ElementRecord {
    pub tag: String,
    pub control: ControlKind,
    pub id: String,
    pub name: String,
    pub class_name: String,
    pub role: String,
    pub aria_label: String,
    pub aria_labelledby: String,
    pub label: String,
    pub placeholder: String,
    pub inner_text: String,
    pub value: String,
    pub checked: bool,
    pub required: bool,
    pub disabled: bool,
    pub visible: bool,
    pub is_custom_dropdown: bool,
    pub options: Vec<SelectOption>,
    pub group: String,
}

impl ElementRecord {
    /// Stable CSS selector: id wins over name; elements with neither are not
    /// individually addressable and callers fall back to structural paths.
    pub fn selector(&self) -> Option<String> {
        if !self.id.is_empty() {
            Some(format!("#{}", css_escape(&self.id)))
        } else if !self.name.is_empty() {
            Some(format!("[name='{}']", self.name))
        } else {
            None
        }
    }

    /// Concatenation of every text attribute, used by rule-based matching.
    pub fn descriptive_text(&self) -> String {
        [
            self.label.as_str(),
            self.placeholder.as_str(),
            self.aria_label.as_str(),
            self.name.as_str(),
            self.id.as_str(),
        ]
        .join(" ")
        .to_lowercase()
    }
}

/// Minimal escaping for ids that carry CSS-significant characters
/// (Greenhouse question ids often contain brackets).
fn css_escape(id: &str) -> String {
    let mut out = String::with_capacity(id.len());
    for ch in id.chars() {
        if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
            out.push(ch);
        } else {
            out.push('\\');
            out.push(ch);
        }
    }
    out
}

/// A named bucket of element records derived from the nearest enclosing
/// fieldset / `role=group` / group-classed container.
///
/// Groups preserve element order and an element belongs to exactly one group.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LogicalGroup {
    pub name: String,
    pub elements: Vec<ElementRecord>,
}

impl LogicalGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            elements: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_prefers_id_over_name() {
        let el = ElementRecord {
            id: "first_name".into(),
            name: "candidate[first]".into(),
            ..Default::default()
        };
        assert_eq!(el.selector().as_deref(), Some("#first_name"));

        let el = ElementRecord {
            name: "email".into(),
            ..Default::default()
        };
        assert_eq!(el.selector().as_deref(), Some("[name='email']"));

        assert_eq!(ElementRecord::default().selector(), None);
    }

    #[test]
    fn selector_escapes_css_significant_ids() {
        let el = ElementRecord {
            id: "question_123[answer]".into(),
            ..Default::default()
        };
        assert_eq!(el.selector().as_deref(), Some("#question_123\\[answer\\]"));
    }

    #[test]
    fn descriptive_text_is_lowercased_union() {
        let el = ElementRecord {
            label: "First Name".into(),
            placeholder: "Given name".into(),
            ..Default::default()
        };
        let text = el.descriptive_text();
        assert!(text.contains("first name"));
        assert!(text.contains("given name"));
    }
}
