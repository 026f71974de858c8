//! Text generation backends.
//!
//! Defines the [`Generator`] trait and its implementations:
//! - **[`DisabledGenerator`]**: returns errors; used when no LLM is configured.
//! - **[`ChatCompletionClient`]**: calls an OpenAI-compatible
//!   `POST /chat/completions` endpoint (Groq by default) with retry and backoff.
//!
//! # Retry Strategy
//!
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::config::LlmConfig;

/// A backend that turns a prompt into generated text.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Returns the model identifier (e.g. `"llama-3.3-70b-versatile"`).
    fn model_name(&self) -> &str;

    /// Generate a completion for a single user prompt.
    async fn generate(&self, prompt: &str) -> Result<String>;
}

// ============ Disabled ============

/// A generator that always fails.
///
/// Used when `llm.provider = "disabled"`. Operations that never reach the
/// model (listing, cached summaries, questions with no indexed text) still
/// work.
pub struct DisabledGenerator;

#[async_trait]
impl Generator for DisabledGenerator {
    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn generate(&self, _prompt: &str) -> Result<String> {
        bail!("LLM provider is disabled. Set [llm] provider in config.")
    }
}

// ============ OpenAI-compatible chat completions ============

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Client for OpenAI-compatible chat-completion APIs (Groq, OpenAI, local
/// servers exposing the same protocol).
pub struct ChatCompletionClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    max_retries: u32,
}

impl ChatCompletionClient {
    /// Create a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the API key environment variable is not set or
    /// the HTTP client cannot be built.
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let key_var = config.resolved_api_key_env();
        let api_key = std::env::var(&key_var)
            .map_err(|_| anyhow::anyhow!("{} environment variable not set", key_var))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.resolved_base_url()),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl Generator for ChatCompletionClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s, 8s, ...
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tracing::warn!(attempt, delay_secs = delay.as_secs(), "retrying LLM request");
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post(&self.endpoint)
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let parsed: ChatResponse = response.json().await?;
                        let content = parse_completion(parsed)?;
                        tracing::debug!(
                            model = %self.model,
                            chars = content.len(),
                            "generation complete"
                        );
                        return Ok(content);
                    }

                    // Rate limited or server error, retry
                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err = Some(anyhow::anyhow!("LLM API error {}: {}", status, body_text));
                        continue;
                    }

                    // Client error (not 429), don't retry
                    let body_text = response.text().await.unwrap_or_default();
                    bail!("LLM API error {}: {}", status, body_text);
                }
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("LLM request failed after retries")))
    }
}

fn parse_completion(response: ChatResponse) -> Result<String> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| anyhow::anyhow!("Invalid LLM response: no message content"))
}

/// Create the [`Generator`] selected by configuration.
///
/// | Config Value | Generator |
/// |-------------|-----------|
/// | `"disabled"` | [`DisabledGenerator`] |
/// | `"groq"`, `"openai"` | [`ChatCompletionClient`] |
pub fn create_generator(config: &LlmConfig) -> Result<Arc<dyn Generator>> {
    if !config.is_enabled() {
        tracing::debug!("LLM provider disabled");
        return Ok(Arc::new(DisabledGenerator));
    }
    match config.provider.as_str() {
        "groq" | "openai" => Ok(Arc::new(ChatCompletionClient::new(config)?)),
        other => bail!("Unknown llm provider: {}", other),
    }
}
