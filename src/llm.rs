//! The outbound LLM client boundary.
//!
//! The pipeline needs exactly two capabilities from a text-generation
//! backend: a one-shot `generate_text` and a token `text_stream`. Everything
//! else (model selection, sampling, authentication) is the implementation's
//! business. [`HttpTextGenerator`] speaks the JSON generate protocol of a
//! local inference server (Ollama and compatible endpoints);
//! [`MockTextGenerator`] gives tests a deterministic backend with call
//! recording.
//!
//! Client errors never escape the refinement stage as fatal — see
//! [`crate::pipeline::refine`].

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by a [`TextGenerator`] implementation.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM endpoint returned HTTP {status}: {detail}")]
    Endpoint { status: u16, detail: String },

    #[error("LLM transport error: {0}")]
    Transport(String),

    #[error("LLM returned an unparseable response: {0}")]
    InvalidResponse(String),
}

/// A lazily-produced sequence of generated text chunks, error-terminated.
pub type TextStream = BoxStream<'static, Result<String, LlmError>>;

/// The two-method contract the refinement stage is written against.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate the full completion for `prompt`.
    async fn generate_text(&self, prompt: &str) -> Result<String, LlmError>;

    /// Stream the completion for `prompt` chunk by chunk.
    async fn text_stream(&self, prompt: &str) -> Result<TextStream, LlmError>;
}

// ── HTTP implementation ──────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateChunk {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
}

/// Client for a local inference server exposing `POST /api/generate`.
#[derive(Debug, Clone)]
pub struct HttpTextGenerator {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl HttpTextGenerator {
    /// Default endpoint of a locally running inference server.
    pub const DEFAULT_BASE_URL: &'static str = "http://127.0.0.1:11434";

    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
        })
    }

    async fn post(&self, prompt: &str, stream: bool) -> Result<reqwest::Response, LlmError> {
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream,
        };
        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(LlmError::Endpoint {
                status: status.as_u16(),
                detail,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl TextGenerator for HttpTextGenerator {
    async fn generate_text(&self, prompt: &str) -> Result<String, LlmError> {
        let chunk: GenerateChunk = self
            .post(prompt, false)
            .await?
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;
        tracing::debug!(bytes = chunk.response.len(), "LLM generation complete");
        Ok(chunk.response)
    }

    async fn text_stream(&self, prompt: &str) -> Result<TextStream, LlmError> {
        let response = self.post(prompt, true).await?;

        // The server sends newline-delimited JSON chunks; buffer bytes until
        // a full line is available, parse, and yield its `response` field.
        let stream = futures::stream::try_unfold(
            (response, String::new(), false),
            |(mut response, mut buffer, finished)| async move {
                if finished {
                    return Ok(None);
                }
                loop {
                    if let Some(newline) = buffer.find('\n') {
                        let line = buffer[..newline].trim().to_string();
                        buffer.drain(..=newline);
                        if line.is_empty() {
                            continue;
                        }
                        let chunk: GenerateChunk = serde_json::from_str(&line)
                            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;
                        return Ok(Some((chunk.response, (response, buffer, chunk.done))));
                    }
                    match response
                        .chunk()
                        .await
                        .map_err(|e| LlmError::Transport(e.to_string()))?
                    {
                        Some(bytes) => buffer.push_str(&String::from_utf8_lossy(&bytes)),
                        None => return Ok(None),
                    }
                }
            },
        );
        Ok(stream.boxed())
    }
}

// ── Mock implementation ──────────────────────────────────────────────────

/// Test backend: returns a canned response (or a canned failure) and records
/// every prompt it was called with.
#[derive(Debug, Default)]
pub struct MockTextGenerator {
    response: Option<String>,
    prompts: Mutex<Vec<String>>,
}

impl MockTextGenerator {
    /// A mock that answers every call with `response`.
    pub fn replying(response: impl Into<String>) -> Self {
        Self {
            response: Some(response.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// A mock whose every call fails, for exercising the degraded paths.
    pub fn failing() -> Self {
        Self::default()
    }

    /// Prompts received so far, in call order.
    pub fn recorded_prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerator for MockTextGenerator {
    async fn generate_text(&self, prompt: &str) -> Result<String, LlmError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.response
            .clone()
            .ok_or_else(|| LlmError::Transport("mock configured to fail".to_string()))
    }

    async fn text_stream(&self, prompt: &str) -> Result<TextStream, LlmError> {
        let text = self.generate_text(prompt).await?;
        let chunks: Vec<Result<String, LlmError>> = text
            .split_inclusive(' ')
            .map(|piece| Ok(piece.to_string()))
            .collect();
        Ok(futures::stream::iter(chunks).boxed())
    }
}
