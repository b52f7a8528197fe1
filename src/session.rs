//! Session wiring: the singletons (LLM provider, learning store, event
//! sink) constructed once and threaded through the components as explicit
//! collaborators.

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use applyflow_core_types::SessionId;
use browser_driver::{Driver, DriverOptions};
use learning_store::LearningStore;
use llm_gateway::{LlmConfig, LlmProvider, MockProvider, OpenAiProvider};
use profile_store::CandidateProfile;
use telemetry::EventSink;

use crate::config::Settings;

pub struct Session {
    pub id: SessionId,
    pub settings: Settings,
    pub profile: CandidateProfile,
    pub learning: Arc<LearningStore>,
    pub sink: Arc<EventSink>,
    pub provider: Arc<dyn LlmProvider>,
}

impl Session {
    /// Load the profile and knowledge base, open the artifact directory,
    /// and build the LLM provider.
    pub fn bootstrap(settings: Settings) -> anyhow::Result<Self> {
        let id = SessionId::new();

        let profile = if settings.paths.profile.exists() {
            CandidateProfile::from_yaml_file(&settings.paths.profile)
                .with_context(|| format!("loading profile {}", settings.paths.profile.display()))?
        } else {
            warn!(
                path = %settings.paths.profile.display(),
                "profile file missing; continuing with an empty profile"
            );
            CandidateProfile::empty()
        };

        let learning = Arc::new(
            LearningStore::open(&settings.paths.knowledge_base).with_context(|| {
                format!(
                    "opening knowledge base {}",
                    settings.paths.knowledge_base.display()
                )
            })?,
        );

        let sink = Arc::new(
            EventSink::create(&settings.paths.runs_dir, &id)
                .context("creating session artifact directory")?,
        );

        let provider: Arc<dyn LlmProvider> = if settings.llm.api_keys.is_empty() {
            warn!("no LLM API key configured; mapping falls back to rules, analysis to wait_for_human");
            Arc::new(MockProvider::new())
        } else {
            Arc::new(OpenAiProvider::new(LlmConfig {
                api_keys: settings.llm.api_keys.clone(),
                model: settings.llm.model.clone(),
                api_base: settings.llm.api_base.clone(),
                temperature: settings.llm.temperature,
                max_tokens: settings.llm.max_tokens,
                timeout: settings.llm_timeout(),
                max_retries: settings.llm.max_retries,
            })?)
        };

        info!(session = %id, artifacts = %sink.session_dir().display(), "session bootstrapped");
        Ok(Self {
            id,
            settings,
            profile,
            learning,
            sink,
            provider,
        })
    }

    /// Launch the browser this session exclusively owns.
    pub async fn launch_driver(&self) -> anyhow::Result<Driver> {
        let options = DriverOptions {
            headless: self.settings.browser.headless,
            viewport: (
                self.settings.browser.viewport_width,
                self.settings.browser.viewport_height,
            ),
            nav_timeout: self.settings.nav_timeout(),
            element_timeout: self.settings.element_timeout(),
            chrome_executable: self.settings.browser.chrome_executable.clone(),
            ..DriverOptions::default()
        };
        Ok(Driver::launch(options).await?)
    }

    /// Persist the learning store; called once at session end.
    pub fn flush_learning(&self) {
        if let Err(err) = self.learning.export(None) {
            warn!(error = %err, "failed to persist knowledge base");
        }
    }
}
