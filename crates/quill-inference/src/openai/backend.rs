//! OpenAI-compatible inference backend implementation.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info};

use quill_core::defaults::{
    ENV_LLM_API_KEY, ENV_LLM_BASE_URL, ENV_LLM_MODEL, ENV_LLM_TIMEOUT, LLM_BASE_URL, LLM_MODEL,
    LLM_TIMEOUT_SECS,
};
use quill_core::{Error, GenerationBackend, Result};

use super::error::{to_quill_error, OpenAIErrorCode};
use super::types::*;

/// Configuration for OpenAI-compatible backend.
#[derive(Debug, Clone)]
pub struct OpenAIConfig {
    /// Base URL for the API endpoint, without the `/chat/completions` suffix.
    pub base_url: String,
    /// API key for authentication (optional for local endpoints).
    pub api_key: Option<String>,
    /// Model to use for generation.
    pub gen_model: String,
    /// Request timeout in seconds.
    pub timeout_seconds: u64,
    pub temperature: Option<f32>,
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            base_url: LLM_BASE_URL.to_string(),
            api_key: None,
            gen_model: LLM_MODEL.to_string(),
            timeout_seconds: LLM_TIMEOUT_SECS,
            temperature: None,
        }
    }
}

impl OpenAIConfig {
    /// Read `LLM_BASE_URL`, `LLM_API_KEY`, `LLM_MODEL` and `LLM_TIMEOUT`.
    ///
    /// Returns `None` when neither an API key nor a base URL is set, meaning
    /// no generation backend is configured.
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var(ENV_LLM_API_KEY)
            .ok()
            .filter(|k| !k.is_empty());
        let base_url = std::env::var(ENV_LLM_BASE_URL)
            .ok()
            .filter(|u| !u.is_empty());

        if api_key.is_none() && base_url.is_none() {
            return None;
        }

        Some(Self {
            base_url: base_url.unwrap_or_else(|| LLM_BASE_URL.to_string()),
            api_key,
            gen_model: std::env::var(ENV_LLM_MODEL).unwrap_or_else(|_| LLM_MODEL.to_string()),
            timeout_seconds: std::env::var(ENV_LLM_TIMEOUT)
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(LLM_TIMEOUT_SECS),
            temperature: None,
        })
    }
}

/// OpenAI-compatible inference backend.
pub struct OpenAIBackend {
    client: Client,
    config: OpenAIConfig,
}

impl OpenAIBackend {
    /// Create a new OpenAI backend with the given configuration.
    pub fn new(config: OpenAIConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| Error::Inference(format!("Failed to create HTTP client: {}", e)))?;

        info!(
            subsystem = "inference",
            component = "openai",
            model = %config.gen_model,
            "Initializing OpenAI-compatible backend: url={}",
            config.base_url
        );

        Ok(Self { client, config })
    }

    /// Create from environment variables. `Ok(None)` when unconfigured.
    pub fn from_env() -> Result<Option<Self>> {
        OpenAIConfig::from_env().map(Self::new).transpose()
    }

    /// Get the current configuration.
    pub fn config(&self) -> &OpenAIConfig {
        &self.config
    }

    /// Build a request with authentication if configured.
    fn build_request(&self, endpoint: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), endpoint);
        let mut req = self.client.post(&url);

        if let Some(ref api_key) = self.config.api_key {
            req = req.bearer_auth(api_key);
        }

        req.header("Content-Type", "application/json")
    }
}

#[async_trait]
impl GenerationBackend for OpenAIBackend {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.generate_with_system("", prompt).await
    }

    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String> {
        let start = Instant::now();
        debug!(
            subsystem = "inference",
            component = "openai",
            op = "generate",
            model = %self.config.gen_model,
            prompt_len = prompt.len(),
            "Generating"
        );

        let mut messages = Vec::new();
        if !system.is_empty() {
            messages.push(ChatMessage::system(system));
        }
        messages.push(ChatMessage::user(prompt));

        let request = ChatCompletionRequest {
            model: self.config.gen_model.clone(),
            messages,
            temperature: self.config.temperature,
            max_tokens: None,
        };

        let response = self
            .build_request("/chat/completions")
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Inference(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            let (message, error_type) = match serde_json::from_str::<OpenAIErrorResponse>(&text) {
                Ok(body) => (body.error.message, body.error.error_type.unwrap_or_default()),
                Err(_) if text.is_empty() => ("Unknown error".to_string(), String::new()),
                Err(_) => (text, String::new()),
            };
            let code = OpenAIErrorCode::from_response(status, &error_type);
            return Err(to_quill_error(
                code,
                &format!("provider returned {}: {}", status, message),
            ));
        }

        let result: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| Error::Inference(format!("Failed to parse response: {}", e)))?;

        let content = result
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        debug!(
            subsystem = "inference",
            component = "openai",
            op = "generate",
            response_len = content.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Generation complete"
        );
        Ok(content)
    }

    fn model_name(&self) -> &str {
        &self.config.gen_model
    }
}
