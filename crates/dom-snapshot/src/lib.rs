//! Lightweight DOM snapshots for LLM consumption.
//!
//! One in-page script walks a fixed set of interactive selectors, resolves
//! labels, enumerates options, records bounding rectangles for sorting and
//! drops them before export. Elements land in logical groups derived from
//! the nearest fieldset-like container. The snapshotter never fails outward:
//! an empty group list is the signal the orchestrator turns into
//! `SNAPSHOT_EMPTY`.

mod script;

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;
use tokio::time::sleep;
use tracing::{debug, warn};

use applyflow_core_types::{ControlKind, ElementRecord, LogicalGroup, SelectOption, MAX_GROUP_SIZE};
use browser_driver::Driver;

pub use script::COLLECT_ELEMENTS_SCRIPT;

/// Raw element shape produced by the collection script.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawElement {
    tag: String,
    r#type: String,
    id: String,
    name: String,
    class_name: String,
    role: String,
    aria_label: String,
    aria_labelledby: String,
    label: String,
    placeholder: String,
    inner_text: String,
    value: String,
    checked: bool,
    required: bool,
    disabled: bool,
    visible: bool,
    is_custom_dropdown: bool,
    options: Vec<RawOption>,
    logical_group: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawOption {
    value: String,
    text: String,
}

/// One harvested option of an open custom dropdown.
#[derive(Clone, Debug, Deserialize)]
pub struct HarvestedOption {
    pub text: String,
    pub value: String,
}

pub struct Snapshotter<'a> {
    driver: &'a Driver,
    max_group_size: usize,
}

impl<'a> Snapshotter<'a> {
    pub fn new(driver: &'a Driver) -> Self {
        Self {
            driver,
            max_group_size: MAX_GROUP_SIZE,
        }
    }

    /// Collect every interactive control into ordered logical groups.
    ///
    /// Returns an empty list on any failure; the caller decides whether
    /// that is fatal.
    pub async fn snapshot(&self) -> Vec<LogicalGroup> {
        let raw: Vec<RawElement> = match self.driver.eval_value(COLLECT_ELEMENTS_SCRIPT).await {
            Ok(elements) => elements,
            Err(err) => {
                warn!(error = %err, "DOM collection script failed");
                return Vec::new();
            }
        };

        let mut records = Vec::with_capacity(raw.len());
        for element in raw {
            let control = match ControlKind::classify(
                &element.tag,
                &element.r#type,
                element.is_custom_dropdown,
            ) {
                Some(control) => control,
                // Password inputs and bare role targets are not controls
                // the engine fills.
                None => continue,
            };
            records.push(ElementRecord {
                tag: element.tag,
                control,
                id: element.id,
                name: element.name,
                class_name: element.class_name,
                role: element.role,
                aria_label: element.aria_label,
                aria_labelledby: element.aria_labelledby,
                label: element.label,
                placeholder: element.placeholder,
                inner_text: element.inner_text,
                value: element.value,
                checked: element.checked,
                required: element.required,
                disabled: element.disabled,
                visible: element.visible,
                is_custom_dropdown: element.is_custom_dropdown,
                options: element
                    .options
                    .into_iter()
                    .map(|o| SelectOption::new(o.value, o.text))
                    .collect(),
                group: if element.logical_group.is_empty() {
                    "default".to_string()
                } else {
                    element.logical_group
                },
            });
        }

        let groups = group_elements(records, self.max_group_size);
        debug!(
            groups = groups.len(),
            elements = groups.iter().map(LogicalGroup::len).sum::<usize>(),
            "DOM snapshot collected"
        );
        groups
    }

    /// Open a custom dropdown, harvest the visible options, close it again.
    pub async fn find_custom_dropdown_options(&self, trigger: &str) -> Vec<HarvestedOption> {
        if self.driver.click(trigger).await.is_err() {
            return Vec::new();
        }
        sleep(Duration::from_millis(500)).await;

        let options: Vec<HarvestedOption> = self
            .driver
            .eval_value(script::HARVEST_OPTIONS_SCRIPT)
            .await
            .unwrap_or_default();

        let _ = self.driver.press("Escape").await;
        options
    }

    /// Locate the file input belonging to an upload label, which is often
    /// hidden or off screen. Three strategies: `for` attribute, descendant
    /// input, nearest file input in the enclosing form region.
    pub async fn find_file_input_for_label(&self, label_text: &str) -> Option<String> {
        let script = script::file_input_for_label_script(label_text);
        match self.driver.eval_value::<Option<String>>(&script).await {
            Ok(selector) => selector.filter(|s| !s.is_empty()),
            Err(err) => {
                warn!(error = %err, label_text, "file input lookup failed");
                None
            }
        }
    }
}

/// Bucket records by their logical group, preserving order, and split any
/// group larger than `max_size` into deterministic `_partN` chunks.
fn group_elements(records: Vec<ElementRecord>, max_size: usize) -> Vec<LogicalGroup> {
    let mut order: Vec<String> = Vec::new();
    let mut buckets: HashMap<String, Vec<ElementRecord>> = HashMap::new();
    for record in records {
        let key = record.group.clone();
        if !buckets.contains_key(&key) {
            order.push(key.clone());
        }
        buckets.entry(key).or_default().push(record);
    }

    let mut groups = Vec::new();
    for name in order {
        let elements = buckets.remove(&name).unwrap_or_default();
        if elements.len() <= max_size {
            groups.push(LogicalGroup { name, elements });
        } else {
            for (index, chunk) in elements.chunks(max_size).enumerate() {
                groups.push(LogicalGroup {
                    name: format!("{}_part{}", name, index + 1),
                    elements: chunk.to_vec(),
                });
            }
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(group: &str, id: &str) -> ElementRecord {
        ElementRecord {
            id: id.to_string(),
            group: group.to_string(),
            control: ControlKind::Text,
            ..Default::default()
        }
    }

    #[test]
    fn groups_preserve_first_seen_order() {
        let records = vec![record("b", "1"), record("a", "2"), record("b", "3")];
        let groups = group_elements(records, 50);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].name, "b");
        assert_eq!(groups[0].elements.len(), 2);
        assert_eq!(groups[1].name, "a");
    }

    #[test]
    fn group_of_exactly_max_size_stays_whole() {
        let records: Vec<_> = (0..50).map(|i| record("g", &i.to_string())).collect();
        let groups = group_elements(records, 50);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].name, "g");
    }

    #[test]
    fn oversize_group_splits_deterministically() {
        let records: Vec<_> = (0..51).map(|i| record("g", &i.to_string())).collect();
        let groups = group_elements(records, 50);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].name, "g_part1");
        assert_eq!(groups[0].elements.len(), 50);
        assert_eq!(groups[1].name, "g_part2");
        assert_eq!(groups[1].elements.len(), 1);
        // Order within the split survives.
        assert_eq!(groups[1].elements[0].id, "50");
    }

    #[test]
    fn raw_elements_deserialize_with_missing_fields() {
        let json = r#"[{"tag": "input", "type": "email", "logical_group": "default"}]"#;
        let raw: Vec<RawElement> = serde_json::from_str(json).unwrap();
        assert_eq!(raw[0].r#type, "email");
        assert!(!raw[0].checked);
    }
}
