//! The closed set of form-control kinds the engine knows how to drive.

use serde::{Deserialize, Serialize};

/// Kind of interactive control, dispatched on by the action executor.
///
/// The set is closed on purpose: anything the snapshotter cannot place in it
/// is dropped before it ever reaches the mapper.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlKind {
    Text,
    Email,
    Tel,
    Url,
    Number,
    Select,
    CustomDropdown,
    Radio,
    Checkbox,
    Textarea,
    File,
    Date,
    Hidden,
}

impl ControlKind {
    /// Classify a DOM element from its tag, `type` attribute and combobox
    /// markers, as reported by the snapshot script.
    pub fn classify(tag: &str, input_type: &str, is_custom_dropdown: bool) -> Option<Self> {
        if is_custom_dropdown {
            return Some(ControlKind::CustomDropdown);
        }
        match tag {
            "select" => Some(ControlKind::Select),
            "textarea" => Some(ControlKind::Textarea),
            "input" => match input_type {
                "" | "text" | "search" => Some(ControlKind::Text),
                "email" => Some(ControlKind::Email),
                "tel" => Some(ControlKind::Tel),
                "url" => Some(ControlKind::Url),
                "number" => Some(ControlKind::Number),
                "radio" => Some(ControlKind::Radio),
                "checkbox" => Some(ControlKind::Checkbox),
                "file" => Some(ControlKind::File),
                "date" | "datetime-local" => Some(ControlKind::Date),
                "hidden" => Some(ControlKind::Hidden),
                _ => None,
            },
            _ => None,
        }
    }

    /// Parse the string form used in LLM replies (`"custom-dropdown"` and
    /// `"custom_dropdown"` are both accepted; `"datetime-local"` folds into
    /// `Date`).
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "text" | "search" => Some(ControlKind::Text),
            "email" => Some(ControlKind::Email),
            "tel" | "phone" => Some(ControlKind::Tel),
            "url" => Some(ControlKind::Url),
            "number" => Some(ControlKind::Number),
            "select" => Some(ControlKind::Select),
            "custom-dropdown" | "custom_dropdown" => Some(ControlKind::CustomDropdown),
            "radio" => Some(ControlKind::Radio),
            "checkbox" => Some(ControlKind::Checkbox),
            "textarea" => Some(ControlKind::Textarea),
            "file" => Some(ControlKind::File),
            "date" | "datetime-local" => Some(ControlKind::Date),
            "hidden" => Some(ControlKind::Hidden),
            _ => None,
        }
    }

    /// Text-family controls share the type-clear-verify fill path.
    pub fn is_text_like(&self) -> bool {
        matches!(
            self,
            ControlKind::Text
                | ControlKind::Email
                | ControlKind::Tel
                | ControlKind::Url
                | ControlKind::Number
                | ControlKind::Textarea
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ControlKind::Text => "text",
            ControlKind::Email => "email",
            ControlKind::Tel => "tel",
            ControlKind::Url => "url",
            ControlKind::Number => "number",
            ControlKind::Select => "select",
            ControlKind::CustomDropdown => "custom_dropdown",
            ControlKind::Radio => "radio",
            ControlKind::Checkbox => "checkbox",
            ControlKind::Textarea => "textarea",
            ControlKind::File => "file",
            ControlKind::Date => "date",
            ControlKind::Hidden => "hidden",
        }
    }
}

impl Default for ControlKind {
    fn default() -> Self {
        ControlKind::Text
    }
}

impl std::fmt::Display for ControlKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_inputs_by_type() {
        assert_eq!(
            ControlKind::classify("input", "email", false),
            Some(ControlKind::Email)
        );
        assert_eq!(
            ControlKind::classify("input", "", false),
            Some(ControlKind::Text)
        );
        assert_eq!(
            ControlKind::classify("input", "file", false),
            Some(ControlKind::File)
        );
        assert_eq!(ControlKind::classify("button", "submit", false), None);
    }

    #[test]
    fn combobox_marker_wins_over_tag() {
        assert_eq!(
            ControlKind::classify("input", "text", true),
            Some(ControlKind::CustomDropdown)
        );
        assert_eq!(
            ControlKind::classify("div", "", true),
            Some(ControlKind::CustomDropdown)
        );
    }

    #[test]
    fn parse_accepts_llm_spellings() {
        assert_eq!(
            ControlKind::parse("custom-dropdown"),
            Some(ControlKind::CustomDropdown)
        );
        assert_eq!(ControlKind::parse("datetime-local"), Some(ControlKind::Date));
        assert_eq!(ControlKind::parse("password"), None);
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&ControlKind::CustomDropdown).unwrap();
        assert_eq!(json, "\"custom_dropdown\"");
    }
}
