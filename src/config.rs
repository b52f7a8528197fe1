//! Settings: one struct, serde defaults, optionally layered from a YAML
//! file, overridden by CLI flags. Every tunable the engine honors lives
//! here.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub browser: BrowserSettings,
    pub llm: LlmSettings,
    pub workflow: WorkflowSettings,
    pub paths: PathSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            browser: BrowserSettings::default(),
            llm: LlmSettings::default(),
            workflow: WorkflowSettings::default(),
            paths: PathSettings::default(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub nav_timeout_secs: u64,
    pub element_timeout_secs: u64,
    pub chrome_executable: Option<String>,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: true,
            viewport_width: 1280,
            viewport_height: 720,
            nav_timeout_secs: 60,
            element_timeout_secs: 5,
            chrome_executable: None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    /// Keys may also come from the OPENAI_API_KEY environment variable.
    pub api_keys: Vec<String>,
    pub model: String,
    pub api_base: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            api_keys: Vec::new(),
            model: "gpt-4o-mini".to_string(),
            api_base: "https://api.openai.com/v1".to_string(),
            temperature: 0.1,
            max_tokens: 4000,
            timeout_secs: 30,
            max_retries: 3,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowSettings {
    /// The submit button is never clicked unless this is set.
    pub submit: bool,
    /// Fraction of mapped actions that must succeed.
    pub success_threshold: f64,
    /// CTA hops before giving up.
    pub max_cta_hops: u32,
    /// Re-fill attempts per field failing validation.
    pub max_field_retries: u32,
    /// Confidence floor for acting on a recommendation.
    pub min_action_confidence: f64,
    /// Delay before text fills; load-bearing for some ATS validators.
    pub humanize_delay_ms: u64,
    /// Whole-session budget.
    pub session_deadline_secs: u64,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            submit: false,
            success_threshold: 0.7,
            max_cta_hops: 3,
            max_field_retries: 2,
            min_action_confidence: 0.6,
            humanize_delay_ms: 500,
            session_deadline_secs: 600,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PathSettings {
    pub profile: PathBuf,
    pub knowledge_base: PathBuf,
    pub runs_dir: PathBuf,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            profile: PathBuf::from("personal_info.yaml"),
            knowledge_base: PathBuf::from("data/field_knowledge_base.json"),
            runs_dir: PathBuf::from("runs"),
        }
    }
}

impl Settings {
    /// Load from a YAML file; missing keys keep their defaults.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&text)?)
    }

    /// Fold the environment into the settings (API keys).
    pub fn with_env(mut self) -> Self {
        if self.llm.api_keys.is_empty() {
            if let Ok(key) = std::env::var("OPENAI_API_KEY") {
                if !key.trim().is_empty() {
                    self.llm.api_keys.push(key);
                }
            }
        }
        self
    }

    pub fn nav_timeout(&self) -> Duration {
        Duration::from_secs(self.browser.nav_timeout_secs)
    }

    pub fn element_timeout(&self) -> Duration {
        Duration::from_secs(self.browser.element_timeout_secs)
    }

    pub fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.llm.timeout_secs)
    }

    pub fn humanize_delay(&self) -> Duration {
        Duration::from_millis(self.workflow.humanize_delay_ms)
    }

    pub fn session_deadline(&self) -> Duration {
        Duration::from_secs(self.workflow.session_deadline_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_engine_contract() {
        let settings = Settings::default();
        assert!(!settings.workflow.submit);
        assert_eq!(settings.workflow.success_threshold, 0.7);
        assert_eq!(settings.workflow.max_cta_hops, 3);
        assert_eq!(settings.workflow.humanize_delay_ms, 500);
        assert_eq!(settings.browser.nav_timeout_secs, 60);
        assert_eq!(settings.llm.max_tokens, 4000);
        assert!(settings.llm.temperature <= 0.2);
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let settings: Settings =
            serde_yaml::from_str("workflow:\n  submit: true\n  max_cta_hops: 1\n").unwrap();
        assert!(settings.workflow.submit);
        assert_eq!(settings.workflow.max_cta_hops, 1);
        assert_eq!(settings.workflow.success_threshold, 0.7);
        assert!(settings.browser.headless);
    }
}
