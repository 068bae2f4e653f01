//! OpenAI-compatible HTTP collaborators.
//!
//! [`OpenAIEmbedder`] calls `POST {base_url}/embeddings` and
//! [`OpenAIChatCompleter`] calls `POST {base_url}/chat/completions`. Both
//! share one [`OpenAIClient`], which retries rate limits (429), server
//! errors (5xx) and transport failures with exponential backoff
//! (1s, 2s, 4s, ... capped at 32s). Other 4xx responses fail immediately.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use context_assistant_core::capability::{ChatCompleter, Embedder};
use context_assistant_core::models::{ChatMessage, Role};

use crate::config::OpenAIConfig;

/// Shared HTTP client, credentials and retry policy.
pub struct OpenAIClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    max_retries: u32,
}

impl OpenAIClient {
    /// Build a client, reading the API key from `config.api_key_env`.
    pub fn from_config(config: &OpenAIConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .map_err(|_| anyhow!("{} environment variable not set", config.api_key_env))?;
        Self::new(config, api_key)
    }

    pub fn new(config: &OpenAIConfig, api_key: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            max_retries: config.max_retries,
        })
    }

    async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R>
    where
        B: Serialize + ?Sized + Sync,
        R: for<'de> Deserialize<'de>,
    {
        let url = format!("{}/{}", self.base_url, path);
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                debug!(attempt, delay_secs = delay.as_secs(), %url, "retrying request");
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post(&url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .header("Content-Type", "application/json")
                .json(body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return Ok(response.json::<R>().await?);
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    if status.as_u16() == 429 || status.is_server_error() {
                        warn!(%status, %url, "retryable API error");
                        last_err = Some(anyhow!("OpenAI API error {}: {}", status, body_text));
                        continue;
                    }

                    bail!("OpenAI API error {}: {}", status, body_text);
                }
                Err(e) => {
                    warn!(error = %e, %url, "request failed");
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow!("request to {} failed after retries", url)))
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

/// Order embeddings by their `index` field and check the count.
fn collect_embeddings(mut data: Vec<EmbeddingData>, expected: usize) -> Result<Vec<Vec<f32>>> {
    if data.len() != expected {
        bail!(
            "Invalid embedding response: expected {} embeddings, got {}",
            expected,
            data.len()
        );
    }
    data.sort_by_key(|d| d.index);
    Ok(data.into_iter().map(|d| d.embedding).collect())
}

pub struct OpenAIEmbedder {
    client: Arc<OpenAIClient>,
}

impl OpenAIEmbedder {
    pub fn new(client: Arc<OpenAIClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    async fn embed(&self, model: &str, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(model, &[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("Empty embedding response"))
    }

    async fn embed_batch(&self, model: &str, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        debug!(model, count = texts.len(), "requesting embeddings");
        let response: EmbeddingResponse = self
            .client
            .post_json("embeddings", &EmbeddingRequest { model, input: texts })
            .await?;
        collect_embeddings(response.data, texts.len())
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ApiMessage,
}

#[derive(Deserialize)]
struct ApiMessage {
    #[serde(default)]
    content: Option<String>,
}

fn first_reply(response: ChatResponse) -> Result<ChatMessage> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("No choices in chat completion response"))?;
    Ok(ChatMessage {
        role: Role::Assistant,
        content: choice.message.content.unwrap_or_default(),
    })
}

pub struct OpenAIChatCompleter {
    client: Arc<OpenAIClient>,
}

impl OpenAIChatCompleter {
    pub fn new(client: Arc<OpenAIClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ChatCompleter for OpenAIChatCompleter {
    async fn complete(&self, model: &str, messages: &[ChatMessage]) -> Result<ChatMessage> {
        debug!(model, messages = messages.len(), "sending chat completion request");
        let response: ChatResponse = self
            .client
            .post_json("chat/completions", &ChatRequest { model, messages })
            .await?;
        first_reply(response)
    }
}

/// Embedder and chat completer sharing one client built from `config`.
pub fn collaborators(
    config: &OpenAIConfig,
) -> Result<(Arc<dyn Embedder>, Arc<dyn ChatCompleter>)> {
    let client = Arc::new(OpenAIClient::from_config(config)?);
    Ok((
        Arc::new(OpenAIEmbedder::new(client.clone())),
        Arc::new(OpenAIChatCompleter::new(client)),
    ))
}
