//! Chat-completions client with JSON-object response mode.
//!
//! Shape follows the OpenAI-compatible endpoint: low temperature for
//! deterministic output, generous max_tokens to avoid truncation, retries
//! with exponential backoff, and API-key rotation when a key is rate
//! limited.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::repair::sanitize_json;
use crate::LlmError;

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub api_keys: Vec<String>,
    pub model: String,
    pub api_base: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_keys: Vec::new(),
            model: "gpt-4o-mini".to_string(),
            api_base: "https://api.openai.com/v1".to_string(),
            temperature: 0.1,
            max_tokens: 4000,
            timeout: Duration::from_secs(30),
            max_retries: 3,
        }
    }
}

/// Abstraction over the LLM endpoint so the mapper and analyzer can be
/// tested against canned replies.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Request a JSON document. Implementations strip fences and extract the
    /// outermost object/array before returning.
    async fn complete_json(&self, system: &str, user: &str) -> Result<Value, LlmError>;

    /// Request free text (cover letters).
    async fn complete_text(&self, system: &str, user: &str) -> Result<String, LlmError>;
}

pub struct OpenAiProvider {
    client: Client,
    config: LlmConfig,
}

impl OpenAiProvider {
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        if config.api_keys.is_empty() {
            return Err(LlmError::MissingApiKey);
        }
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| LlmError::CallFailed(format!("failed to build HTTP client: {err}")))?;
        Ok(Self { client, config })
    }

    async fn invoke(&self, system: &str, user: &str, json_mode: bool) -> Result<String, LlmError> {
        let url = format!(
            "{}/chat/completions",
            self.config.api_base.trim_end_matches('/')
        );

        let mut last_error: Option<LlmError> = None;
        for attempt in 0..self.config.max_retries {
            for (key_index, key) in self.config.api_keys.iter().enumerate() {
                let body = ChatCompletionRequest {
                    model: self.config.model.clone(),
                    temperature: self.config.temperature,
                    max_tokens: self.config.max_tokens,
                    response_format: json_mode.then(|| ResponseFormat {
                        r#type: "json_object".to_string(),
                    }),
                    messages: vec![
                        ChatMessage {
                            role: "system".to_string(),
                            content: system.to_string(),
                        },
                        ChatMessage {
                            role: "user".to_string(),
                            content: user.to_string(),
                        },
                    ],
                };

                let response = match self.client.post(&url).bearer_auth(key).json(&body).send().await
                {
                    Ok(resp) => resp,
                    Err(err) => {
                        last_error = Some(LlmError::CallFailed(format!("request failed: {err}")));
                        continue;
                    }
                };

                if !response.status().is_success() {
                    let status = response.status();
                    let text = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "<response unavailable>".to_string());
                    if status.as_u16() == 429 && key_index + 1 < self.config.api_keys.len() {
                        warn!(
                            attempt = attempt + 1,
                            remaining = self.config.api_keys.len() - key_index - 1,
                            "rate limited; switching API key"
                        );
                        last_error = Some(LlmError::CallFailed(format!("rate limited: {text}")));
                        continue;
                    }
                    last_error = Some(LlmError::CallFailed(format!("endpoint returned {status}: {text}")));
                    break;
                }

                let response: ChatCompletionResponse = match response.json().await {
                    Ok(parsed) => parsed,
                    Err(err) => {
                        last_error =
                            Some(LlmError::InvalidOutput(format!("response envelope invalid: {err}")));
                        break;
                    }
                };

                match response
                    .choices
                    .first()
                    .and_then(|choice| choice.message.content.as_text())
                {
                    Some(content) => {
                        debug!(chars = content.len(), "LLM reply received");
                        return Ok(content);
                    }
                    None => {
                        last_error = Some(LlmError::InvalidOutput("response missing content".into()));
                        break;
                    }
                }
            }

            if attempt + 1 < self.config.max_retries {
                let backoff = Duration::from_secs(1 << attempt);
                debug!(attempt = attempt + 1, backoff_s = backoff.as_secs(), "retrying LLM call");
                sleep(backoff).await;
            }
        }

        Err(last_error.unwrap_or_else(|| LlmError::KeysExhausted("no attempt succeeded".into())))
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn complete_json(&self, system: &str, user: &str) -> Result<Value, LlmError> {
        let content = self.invoke(system, user, true).await?;
        sanitize_json(&content)
            .ok_or_else(|| LlmError::InvalidOutput("no JSON document in reply".to_string()))
    }

    async fn complete_text(&self, system: &str, user: &str) -> Result<String, LlmError> {
        let content = self.invoke(system, user, false).await?;
        Ok(content.trim().to_string())
    }
}

/// Deterministic provider for tests: replies are popped front-to-back.
#[derive(Default)]
pub struct MockProvider {
    replies: Mutex<VecDeque<Result<Value, String>>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_json(&self, value: Value) {
        self.replies.lock().push_back(Ok(value));
    }

    pub fn push_failure(&self, message: impl Into<String>) {
        self.replies.lock().push_back(Err(message.into()));
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    async fn complete_json(&self, _system: &str, _user: &str) -> Result<Value, LlmError> {
        match self.replies.lock().pop_front() {
            Some(Ok(value)) => Ok(value),
            Some(Err(message)) => Err(LlmError::CallFailed(message)),
            None => Err(LlmError::CallFailed("mock provider exhausted".into())),
        }
    }

    async fn complete_text(&self, _system: &str, _user: &str) -> Result<String, LlmError> {
        match self.replies.lock().pop_front() {
            Some(Ok(value)) => Ok(value
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| value.to_string())),
            Some(Err(message)) => Err(LlmError::CallFailed(message)),
            None => Err(LlmError::CallFailed("mock provider exhausted".into())),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    r#type: String,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatCompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChoice {
    message: ChatCompletionMessage,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionMessage {
    content: ChatCompletionContent,
}

/// Some gateways return content as a string, others as typed parts.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ChatCompletionContent {
    Text(String),
    Parts(Vec<ChatCompletionPart>),
}

impl ChatCompletionContent {
    fn as_text(&self) -> Option<String> {
        match self {
            ChatCompletionContent::Text(value) => Some(value.clone()),
            ChatCompletionContent::Parts(parts) => {
                let text = parts
                    .iter()
                    .filter_map(|part| part.text.as_deref())
                    .collect::<Vec<_>>()
                    .join("\n");
                if text.is_empty() {
                    None
                } else {
                    Some(text)
                }
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionPart {
    #[serde(default)]
    text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn provider_requires_a_key() {
        let err = OpenAiProvider::new(LlmConfig::default()).err().unwrap();
        assert!(matches!(err, LlmError::MissingApiKey));
    }

    #[tokio::test]
    async fn mock_provider_pops_in_order() {
        let mock = MockProvider::new();
        mock.push_json(json!({"a": 1}));
        mock.push_failure("boom");

        let first = mock.complete_json("s", "u").await.unwrap();
        assert_eq!(first["a"], 1);
        assert!(mock.complete_json("s", "u").await.is_err());
        assert!(mock.complete_json("s", "u").await.is_err());
    }

    #[test]
    fn content_parts_join() {
        let content = ChatCompletionContent::Parts(vec![
            ChatCompletionPart {
                text: Some("{\"x\":".into()),
            },
            ChatCompletionPart {
                text: Some("1}".into()),
            },
        ]);
        assert_eq!(content.as_text().unwrap(), "{\"x\":\n1}");
    }
}
