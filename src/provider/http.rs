//! HTTP providers for OpenAI-compatible embedding and chat endpoints.
//!
//! Every request carries an explicit timeout. Transient failures (HTTP 429,
//! 5xx, timeouts) retry with exponential backoff up to a configured budget;
//! permanent failures propagate immediately.

use super::{EmbedError, Embedder, GenerateError, Generator};
use crate::config::ProviderConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Base delay for the first retry; doubles per attempt.
const BACKOFF_BASE: Duration = Duration::from_millis(250);

/// How a failed request should be treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FailureKind {
    Timeout,
    RateLimited,
    Transient,
    Permanent,
}

impl FailureKind {
    fn is_retryable(self) -> bool {
        !matches!(self, Self::Permanent)
    }
}

/// Classify an HTTP status for retry purposes.
fn classify_status(status: reqwest::StatusCode) -> FailureKind {
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        FailureKind::RateLimited
    } else if status.is_server_error() {
        FailureKind::Transient
    } else {
        FailureKind::Permanent
    }
}

/// Classify a transport-level error.
fn classify_error(err: &reqwest::Error) -> FailureKind {
    if err.is_timeout() {
        FailureKind::Timeout
    } else if err.is_connect() || err.is_request() {
        FailureKind::Transient
    } else {
        FailureKind::Permanent
    }
}

/// Delay before retry `attempt` (0-based).
fn backoff_delay(attempt: u32) -> Duration {
    BACKOFF_BASE * 2u32.saturating_pow(attempt)
}

/// A classified request failure carrying the human-readable cause.
#[derive(Debug)]
struct RequestFailure {
    kind: FailureKind,
    message: String,
}

/// Shared request plumbing for both providers.
struct HttpClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    max_retries: u32,
}

impl HttpClient {
    fn new(config: &ProviderConfig) -> Self {
        let api_key = std::env::var(&config.api_key_env).ok();
        if api_key.is_none() {
            tracing::debug!(
                target: "provider",
                "no API key in {}; sending unauthenticated requests",
                config.api_key_env
            );
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("reqwest client construction only fails on invalid TLS config");

        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            max_retries: config.max_retries,
        }
    }

    /// POST a JSON body, retrying transient failures with backoff.
    async fn post_json<Req: Serialize, Resp: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &Req,
        op: &str,
    ) -> Result<Resp, RequestFailure> {
        let url = format!("{}{path}", self.base_url);
        let mut attempt = 0u32;

        loop {
            let started = Instant::now();
            let outcome = self.post_once(&url, body).await;
            match outcome {
                Ok(resp) => {
                    tracing::info!(
                        target: "provider",
                        "{op} call took {:.2}s",
                        started.elapsed().as_secs_f64()
                    );
                    return Ok(resp);
                }
                Err(failure) => {
                    if failure.kind.is_retryable() && attempt < self.max_retries {
                        let delay = backoff_delay(attempt);
                        tracing::warn!(
                            target: "provider",
                            "{op} failed ({}), retry {}/{} in {:?}",
                            failure.message,
                            attempt + 1,
                            self.max_retries,
                            delay
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(failure);
                }
            }
        }
    }

    async fn post_once<Req: Serialize, Resp: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        body: &Req,
    ) -> Result<Resp, RequestFailure> {
        let mut request = self.client.post(url).json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| RequestFailure {
            kind: classify_error(&e),
            message: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RequestFailure {
                kind: classify_status(status),
                message: format!("HTTP {status}: {body}"),
            });
        }

        response.json::<Resp>().await.map_err(|e| RequestFailure {
            kind: FailureKind::Permanent,
            message: format!("malformed response body: {e}"),
        })
    }
}

// Wire types for the embeddings endpoint.

#[derive(Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Deserialize)]
struct EmbeddingItem {
    index: usize,
    embedding: Vec<f32>,
}

impl EmbeddingsResponse {
    /// Vectors in input order. Providers are allowed to return items out of
    /// order; the `index` field is authoritative.
    fn into_ordered(mut self) -> Vec<Vec<f32>> {
        self.data.sort_by_key(|item| item.index);
        self.data.into_iter().map(|item| item.embedding).collect()
    }
}

/// Embedding provider over an OpenAI-compatible `/embeddings` endpoint.
pub struct HttpEmbedder {
    http: HttpClient,
    model: String,
}

impl HttpEmbedder {
    pub fn new(config: &ProviderConfig) -> Self {
        Self {
            http: HttpClient::new(config),
            model: config.embedding_model.clone(),
        }
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbeddingsRequest {
            model: &self.model,
            input: texts,
        };

        let response: EmbeddingsResponse = self
            .http
            .post_json("/embeddings", &request, "embed")
            .await
            .map_err(|failure| match failure.kind {
                FailureKind::Permanent => EmbedError::Permanent(failure.message),
                _ => EmbedError::Transient(failure.message),
            })?;

        let vectors = response.into_ordered();
        if vectors.len() != texts.len() {
            return Err(EmbedError::Permanent(format!(
                "provider returned {} vectors for {} inputs",
                vectors.len(),
                texts.len()
            )));
        }
        Ok(vectors)
    }
}

// Wire types for the chat completions endpoint.

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
    content: String,
}

/// Generation provider over an OpenAI-compatible `/chat/completions`
/// endpoint.
pub struct HttpGenerator {
    http: HttpClient,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl HttpGenerator {
    pub fn new(config: &ProviderConfig) -> Self {
        Self {
            http: HttpClient::new(config),
            model: config.generation_model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }
}

#[async_trait]
impl Generator for HttpGenerator {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String, GenerateError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let response: ChatResponse = self
            .http
            .post_json("/chat/completions", &request, "generate")
            .await
            .map_err(|failure| match failure.kind {
                FailureKind::Timeout => GenerateError::Timeout,
                FailureKind::RateLimited => GenerateError::RateLimited,
                _ => GenerateError::Provider(failure.message),
            })?;

        response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| GenerateError::Provider("response contained no choices".to_string()))
    }
}
