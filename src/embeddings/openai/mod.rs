
use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::RagError;
use crate::chain::ChatModel;
use crate::config::Config;
use crate::embeddings::Embedder;

const DEFAULT_BACKOFF: Duration = Duration::from_secs(1);
const EXPONENTIAL_BACKOFF_BASE: u32 = 2;

/// Blocking client for the OpenAI embeddings and chat-completion endpoints
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    base_url: Url,
    api_key: String,
    embedding_model: String,
    chat_model: String,
    temperature: f32,
    agent: ureq::Agent,
    retry_attempts: u32,
    backoff: Duration,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    pub error: ApiError,
}

#[derive(Debug, Deserialize)]
pub struct ApiError {
    pub message: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

fn build_agent(timeout: Duration) -> ureq::Agent {
    ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .http_status_as_error(false)
        .build()
        .into()
}

impl OpenAiClient {
    #[inline]
    pub fn new(config: &Config) -> Result<Self> {
        let api_key = config.api_key()?.to_string();
        let base_url = config
            .openai
            .api_url()
            .context("Failed to parse OpenAI API base URL from config")?;

        Ok(Self {
            base_url,
            api_key,
            embedding_model: config.openai.embedding_model.clone(),
            chat_model: config.openai.chat_model.clone(),
            temperature: config.openai.temperature,
            agent: build_agent(Duration::from_secs(config.openai.timeout_seconds)),
            retry_attempts: config.openai.retry_attempts,
            backoff: DEFAULT_BACKOFF,
        })
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = build_agent(timeout);
        self
    }

    #[inline]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts.max(1);
        self
    }

    /// Delay before the first retry; later retries back off exponentially
    #[inline]
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Request embeddings for `inputs` in a single API call
    #[inline]
    pub fn create_embeddings(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        debug!(
            "Requesting {} embeddings from model {}",
            inputs.len(),
            self.embedding_model
        );

        let request = EmbeddingRequest {
            model: &self.embedding_model,
            input: inputs,
        };
        let response_text = self
            .post_json("embeddings", &request)
            .context("Failed to generate embeddings")?;

        let mut response: EmbeddingResponse = serde_json::from_str(&response_text)
            .context("Failed to parse embedding response")?;

        if response.data.len() != inputs.len() {
            return Err(anyhow!(
                "Mismatch between request and response counts: {} vs {}",
                inputs.len(),
                response.data.len()
            ));
        }

        response.data.sort_by_key(|d| d.index);
        let embeddings: Vec<Vec<f32>> = response.data.into_iter().map(|d| d.embedding).collect();

        debug!(
            "Received {} embeddings with {} dimensions",
            embeddings.len(),
            embeddings.first().map_or(0, Vec::len)
        );

        Ok(embeddings)
    }

    /// Send `prompt` as a single user message and return the model's reply
    #[inline]
    pub fn chat_completion(&self, prompt: &str) -> Result<String> {
        debug!(
            "Requesting chat completion from model {} (prompt length: {})",
            self.chat_model,
            prompt.len()
        );

        let request = ChatRequest {
            model: &self.chat_model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
        };
        let response_text = self
            .post_json("chat/completions", &request)
            .context("Failed to generate chat completion")?;

        let response: ChatResponse =
            serde_json::from_str(&response_text).context("Failed to parse chat response")?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| anyhow!("Chat response contained no message content"))
    }

    fn post_json<T: Serialize>(&self, endpoint: &str, body: &T) -> Result<String> {
        let url = self
            .base_url
            .join(endpoint)
            .with_context(|| format!("Failed to build {} URL", endpoint))?;
        let request_json = serde_json::to_string(body)
            .with_context(|| format!("Failed to serialize {} request", endpoint))?;
        let authorization = format!("Bearer {}", self.api_key);

        self.make_request_with_retry(|| {
            let mut response = self
                .agent
                .post(url.as_str())
                .header("Authorization", &authorization)
                .header("Content-Type", "application/json")
                .send(&request_json)?;
            let status = response.status().as_u16();
            let text = response.body_mut().read_to_string()?;
            Ok((status, text))
        })
    }

    fn make_request_with_retry<F>(&self, mut request_fn: F) -> Result<String>
    where
        F: FnMut() -> Result<(u16, String), ureq::Error>,
    {
        let mut last_error = None;

        for attempt in 1..=self.retry_attempts {
            debug!("HTTP request attempt {}/{}", attempt, self.retry_attempts);

            match request_fn() {
                Ok((status, body)) if (200..300).contains(&status) => {
                    debug!("Request succeeded on attempt {}", attempt);
                    return Ok(body);
                }
                Ok((status, body)) => {
                    let message = api_error_message(&body);
                    if status == 429 || status >= 500 {
                        warn!(
                            "Server error (status {}), attempt {}/{}: {}",
                            status, attempt, self.retry_attempts, message
                        );
                        last_error = Some(anyhow!("HTTP {}: {}", status, message));
                    } else {
                        warn!("Client error (status {}), not retrying: {}", status, message);
                        return Err(anyhow!("HTTP {}: {}", status, message));
                    }
                }
                Err(error) => match &error {
                    ureq::Error::ConnectionFailed
                    | ureq::Error::HostNotFound
                    | ureq::Error::Timeout(_)
                    | ureq::Error::Io(_) => {
                        warn!(
                            "Transport error: {}, attempt {}/{}",
                            error, attempt, self.retry_attempts
                        );
                        last_error = Some(anyhow!("Request error: {}", error));
                    }
                    _ => {
                        warn!("Non-retryable error: {}", error);
                        return Err(anyhow!("Non-retryable error: {}", error));
                    }
                },
            }

            if attempt < self.retry_attempts {
                let delay = self.backoff * EXPONENTIAL_BACKOFF_BASE.pow(attempt - 1);
                debug!("Waiting {:?} before retry", delay);
                std::thread::sleep(delay);
            }
        }

        error!("All retry attempts failed for request to {}", self.base_url);

        Err(last_error.unwrap_or_else(|| anyhow!("Request failed after retries")))
    }
}

/// Pull the human-readable message out of an OpenAI error body, falling back to the raw body
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<ErrorResponse>(body).map_or_else(
        |_| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                "empty response body".to_string()
            } else {
                trimmed.chars().take(200).collect()
            }
        },
        |response| response.error.message,
    )
}

impl Embedder for OpenAiClient {
    fn embed_documents(&self, texts: &[String]) -> crate::Result<Vec<Vec<f32>>> {
        self.create_embeddings(texts)
            .map_err(|e| RagError::Embedding(format!("{:#}", e)))
    }

    fn embed_query(&self, text: &str) -> crate::Result<Vec<f32>> {
        let mut vectors = self
            .create_embeddings(&[text.to_string()])
            .map_err(|e| RagError::Embedding(format!("{:#}", e)))?;
        vectors
            .pop()
            .ok_or_else(|| RagError::Embedding("no embedding returned for query".to_string()))
    }

    fn model_name(&self) -> &str {
        &self.embedding_model
    }
}

impl ChatModel for OpenAiClient {
    fn complete(&self, prompt: &str) -> crate::Result<String> {
        let answer = self
            .chat_completion(prompt)
            .map_err(|e| RagError::Chat(format!("{:#}", e)))?;
        info!("Received answer from {}", self.chat_model);
        Ok(answer)
    }

    fn model_name(&self) -> &str {
        &self.chat_model
    }
}
