//! LLM gateway: the chat-completions client every component shares, the
//! prompt templates, and the schema & repair layer that turns unreliable
//! model output into typed records.

mod prompt;
mod provider;
mod repair;
mod schema;

use thiserror::Error;

pub use prompt::{
    cover_letter_user, field_mapping_user, page_analysis_user, COVER_LETTER_SYSTEM,
    FIELD_MAPPING_SYSTEM, PAGE_ANALYSIS_SYSTEM,
};
pub use provider::{LlmConfig, LlmProvider, MockProvider, OpenAiProvider};
pub use repair::sanitize_json;
pub use schema::{actions_from_value, repair_page_analysis};

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM request failed: {0}")]
    CallFailed(String),
    #[error("LLM returned an unusable document: {0}")]
    InvalidOutput(String),
    #[error("no API key configured")]
    MissingApiKey,
    #[error("all API keys exhausted: {0}")]
    KeysExhausted(String),
}
