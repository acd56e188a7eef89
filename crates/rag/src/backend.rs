use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::retry::{execute_with_retry, RetryConfig};
use crate::GenerationError;

pub const DEFAULT_CHAT_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
pub const DEFAULT_CHAT_MODEL: &str = "llama-3.1-8b-instant";
pub const DEFAULT_API_KEY_ENV: &str = "GROQ_API_KEY";

/// Turns a system instruction and a user message into an answer.
pub trait GenerationBackend: Send + Sync {
    fn generate(&self, system: &str, user: &str) -> Result<String, GenerationError>;
}

/// Settings for [`ChatCompletionsBackend`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub api_url: String,
    pub model: String,
    pub temperature: f32,
    /// Environment variable holding the bearer token.
    pub api_key_env: String,
    pub timeout_secs: u64,
    pub max_tokens: Option<u32>,
    /// Retries for transient failures. Zero disables retrying.
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_CHAT_URL.to_string(),
            model: DEFAULT_CHAT_MODEL.to_string(),
            temperature: 0.1,
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            timeout_secs: 30,
            max_tokens: None,
            max_retries: 0,
            retry_base_delay_ms: 250,
        }
    }
}

impl GenerationConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.api_url.trim().is_empty() {
            return Err("generation.api_url must not be empty".into());
        }
        if self.model.trim().is_empty() {
            return Err("generation.model must not be empty".into());
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(format!(
                "generation.temperature must be within [0, 2], got {}",
                self.temperature
            ));
        }
        if self.timeout_secs == 0 {
            return Err("generation.timeout_secs must be greater than zero".into());
        }
        if self.api_key_env.trim().is_empty() {
            return Err("generation.api_key_env must not be empty".into());
        }
        Ok(())
    }

    pub fn retry(&self) -> RetryConfig {
        RetryConfig::default()
            .with_max_retries(self.max_retries)
            .with_base_delay(Duration::from_millis(self.retry_base_delay_ms))
    }
}

/// OpenAI-compatible chat-completions client (Groq by default).
///
/// The credential is read once at construction; a missing credential only
/// fails when [`generate`](GenerationBackend::generate) is called.
pub struct ChatCompletionsBackend {
    client: Client,
    api_url: String,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    api_key: Option<String>,
    api_key_env: String,
    timeout: Duration,
    retry: RetryConfig,
}

impl ChatCompletionsBackend {
    pub fn from_config(cfg: &GenerationConfig) -> Result<Self, GenerationError> {
        cfg.validate().map_err(GenerationError::InvalidConfig)?;
        let api_key = std::env::var(&cfg.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty());
        let mut backend = Self::new(
            &cfg.api_url,
            &cfg.model,
            api_key,
            Duration::from_secs(cfg.timeout_secs),
        )?
        .with_temperature(cfg.temperature)
        .with_retry(cfg.retry());
        backend.api_key_env = cfg.api_key_env.clone();
        backend.max_tokens = cfg.max_tokens;
        Ok(backend)
    }

    pub fn new(
        api_url: &str,
        model: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, GenerationError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GenerationError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_url: api_url.to_string(),
            model: model.to_string(),
            temperature: 0.1,
            max_tokens: None,
            api_key,
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            timeout,
            retry: RetryConfig::default(),
        })
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn request_once(&self, api_key: &str, system: &str, user: &str) -> Result<String, GenerationError> {
        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth)
                .map_err(|_| GenerationError::MissingCredential(self.api_key_env.clone()))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let body = ChatRequest {
            model: &self.model,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
        };

        let resp = self
            .client
            .post(&self.api_url)
            .headers(headers)
            .json(&body)
            .send()
            .map_err(|e| self.transport_error(e))?;

        let status = resp.status();
        let text = resp.text().map_err(|e| self.transport_error(e))?;
        if !status.is_success() {
            return Err(GenerationError::Http {
                status: status.as_u16(),
                body: text,
            });
        }

        let parsed: ChatResponse = serde_json::from_str(&text)
            .map_err(|e| GenerationError::InvalidResponse(e.to_string()))?;
        let answer = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| GenerationError::InvalidResponse("response has no choices".into()))?;

        let answer = answer.trim();
        if answer.is_empty() {
            return Err(GenerationError::EmptyAnswer);
        }
        Ok(answer.to_string())
    }

    fn transport_error(&self, err: reqwest::Error) -> GenerationError {
        if err.is_timeout() {
            GenerationError::Timeout(self.timeout)
        } else {
            GenerationError::Transport(err.to_string())
        }
    }
}

impl GenerationBackend for ChatCompletionsBackend {
    fn generate(&self, system: &str, user: &str) -> Result<String, GenerationError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| GenerationError::MissingCredential(self.api_key_env.clone()))?;

        let outcome = execute_with_retry(&self.retry, GenerationError::is_transient, |attempt| {
            let result = self.request_once(api_key, system, user);
            if let Err(err) = &result {
                warn!(attempt, model = %self.model, error = %err, "generation_attempt_failed");
            }
            result
        });
        debug!(
            attempts = outcome.attempts,
            elapsed_ms = outcome.total_duration.as_millis() as u64,
            succeeded = outcome.succeeded(),
            "generation_finished"
        );
        outcome.into_result()
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    content: Option<String>,
}
