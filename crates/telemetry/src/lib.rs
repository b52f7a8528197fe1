//! Structured, append-only session telemetry.
//!
//! Each session writes under its own directory: `errors.jsonl` and
//! `success.jsonl` (one JSON object per line) plus numbered screenshots.
//! Failure events double as the negative feedback channel for learning.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{error, warn};
use uuid::Uuid;

use applyflow_core_types::{ErrorKind, SessionId};

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("failed to prepare session directory {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// One line of `errors.jsonl`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ErrorEvent {
    pub event_id: String,
    pub timestamp: String,
    pub error_kind: String,
    pub message: String,
    #[serde(default)]
    pub context: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dom_info: Option<Value>,
}

/// One line of `success.jsonl`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SuccessEvent {
    pub timestamp: String,
    pub operation: String,
    #[serde(default)]
    pub context: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
}

/// Aggregated view of `errors.jsonl`, for the stats command.
#[derive(Clone, Debug, Default, Serialize)]
pub struct ErrorStatistics {
    pub total_errors: usize,
    pub by_kind: BTreeMap<String, usize>,
}

pub struct EventSink {
    session_dir: PathBuf,
    errors: Mutex<File>,
    successes: Mutex<File>,
    screenshot_seq: AtomicU32,
}

impl EventSink {
    /// Create `base_dir/<session-id>/` with both log files.
    pub fn create(base_dir: impl AsRef<Path>, session: &SessionId) -> Result<Self, TelemetryError> {
        let session_dir = base_dir.as_ref().join(session.to_string());
        std::fs::create_dir_all(&session_dir).map_err(|source| TelemetryError::Io {
            path: session_dir.display().to_string(),
            source,
        })?;
        let open = |name: &str| -> Result<File, TelemetryError> {
            let path = session_dir.join(name);
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(|source| TelemetryError::Io {
                    path: path.display().to_string(),
                    source,
                })
        };
        Ok(Self {
            errors: Mutex::new(open("errors.jsonl")?),
            successes: Mutex::new(open("success.jsonl")?),
            session_dir,
            screenshot_seq: AtomicU32::new(0),
        })
    }

    pub fn session_dir(&self) -> &Path {
        &self.session_dir
    }

    /// Append an error event; returns its id.
    pub fn report_error(
        &self,
        kind: ErrorKind,
        message: impl Into<String>,
        context: Value,
        selector: Option<String>,
        screenshot_path: Option<PathBuf>,
        dom_info: Option<Value>,
    ) -> String {
        let event = ErrorEvent {
            event_id: Uuid::new_v4().to_string(),
            timestamp: Utc::now().to_rfc3339(),
            error_kind: serde_json::to_value(kind)
                .ok()
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_else(|| format!("{kind:?}")),
            message: message.into(),
            context,
            selector,
            screenshot_path: screenshot_path.map(|p| p.display().to_string()),
            dom_info,
        };
        error!(kind = %event.error_kind, message = %event.message, "session error recorded");
        self.append(&self.errors, &event);
        event.event_id
    }

    /// Append a success event (positive feedback for learning).
    pub fn report_success(&self, operation: impl Into<String>, context: Value, selector: Option<String>) {
        let event = SuccessEvent {
            timestamp: Utc::now().to_rfc3339(),
            operation: operation.into(),
            context,
            selector,
        };
        self.append(&self.successes, &event);
    }

    fn append<T: Serialize>(&self, file: &Mutex<File>, event: &T) {
        match serde_json::to_string(event) {
            Ok(line) => {
                let mut guard = file.lock();
                if let Err(err) = writeln!(guard, "{line}") {
                    warn!(error = %err, "failed to append telemetry event");
                }
            }
            Err(err) => warn!(error = %err, "failed to serialize telemetry event"),
        }
    }

    /// Next numbered screenshot path, e.g. `003_after_cta.png`.
    pub fn screenshot_path(&self, label: &str) -> PathBuf {
        let seq = self.screenshot_seq.fetch_add(1, Ordering::SeqCst);
        let safe: String = label
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        self.session_dir.join(format!("{seq:03}_{safe}.png"))
    }

    /// Aggregate the session's error log by kind.
    pub fn error_statistics(&self) -> ErrorStatistics {
        Self::statistics_for(&self.session_dir.join("errors.jsonl"))
    }

    /// Aggregate any `errors.jsonl` file.
    pub fn statistics_for(path: &Path) -> ErrorStatistics {
        let mut stats = ErrorStatistics::default();
        let file = match File::open(path) {
            Ok(file) => file,
            Err(_) => return stats,
        };
        for line in BufReader::new(file).lines().map_while(Result::ok) {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<ErrorEvent>(&line) {
                Ok(event) => {
                    stats.total_errors += 1;
                    *stats.by_kind.entry(event.error_kind).or_insert(0) += 1;
                }
                Err(_) => continue,
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn events_append_one_line_each() {
        let dir = tempfile::tempdir().unwrap();
        let session = SessionId::new();
        let sink = EventSink::create(dir.path(), &session).unwrap();

        sink.report_error(
            ErrorKind::SelectorNotFound,
            "no element for #x",
            json!({"url": "https://a"}),
            Some("#x".into()),
            None,
            None,
        );
        sink.report_error(
            ErrorKind::SelectorNotFound,
            "no element for #y",
            json!({}),
            None,
            None,
            None,
        );
        sink.report_success("fill_form", json!({"fields": 6}), None);

        let stats = sink.error_statistics();
        assert_eq!(stats.total_errors, 2);
        assert_eq!(stats.by_kind.get("SELECTOR_NOT_FOUND"), Some(&2));

        let success_text =
            std::fs::read_to_string(sink.session_dir().join("success.jsonl")).unwrap();
        assert_eq!(success_text.lines().count(), 1);
    }

    #[test]
    fn screenshot_paths_are_numbered_and_sanitized() {
        let dir = tempfile::tempdir().unwrap();
        let session = SessionId::new();
        let sink = EventSink::create(dir.path(), &session).unwrap();

        let first = sink.screenshot_path("after cta");
        let second = sink.screenshot_path("final/state");
        assert!(first.to_string_lossy().ends_with("000_after_cta.png"));
        assert!(second.to_string_lossy().ends_with("001_final_state.png"));
    }

    #[test]
    fn statistics_tolerate_missing_and_garbage_lines() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("errors.jsonl");
        assert_eq!(EventSink::statistics_for(&missing).total_errors, 0);

        std::fs::write(&missing, "not json\n").unwrap();
        assert_eq!(EventSink::statistics_for(&missing).total_errors, 0);
    }
}
