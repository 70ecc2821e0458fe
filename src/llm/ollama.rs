// src/llm/ollama.rs
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use super::{GenerateClient, GenerationConfig, LlmError, StreamEvent};

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

/// One line of the `/api/generate` body; the non-streaming variant is a single
/// such object.
#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    name: String,
}

/// Ollama HTTP client. The configured timeout covers each whole request,
/// including a streaming one.
pub struct OllamaClient {
    http: reqwest::Client,
    config: GenerationConfig,
}

impl OllamaClient {
    pub fn new(config: GenerationConfig) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LlmError::Request(e.to_string()))?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.config.url.trim_end_matches('/'))
    }

    /// Models the backend currently serves, via `/api/tags`.
    pub async fn list_models(&self) -> Result<Vec<String>, LlmError> {
        let response = self
            .http
            .get(self.endpoint("/api/tags"))
            .send()
            .await
            .map_err(|e| LlmError::Request(e.to_string()))?;
        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Api(format!("malformed models response: {e}")))?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }
}

#[async_trait]
impl GenerateClient for OllamaClient {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        if !self.config.enabled {
            return Err(LlmError::Disabled);
        }

        let body = GenerateRequest {
            model: &self.config.model,
            prompt,
            stream: false,
        };
        let response = self
            .http
            .post(self.endpoint("/api/generate"))
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Request(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| LlmError::Request(e.to_string()))?;
        if !status.is_success() {
            return Err(LlmError::Api(format!("status {status}: {text}")));
        }

        let parsed: GenerateResponse = serde_json::from_str(&text)
            .map_err(|e| LlmError::Api(format!("malformed response: {e}")))?;
        if let Some(err) = parsed.error {
            return Err(LlmError::Api(err));
        }
        Ok(parsed.response)
    }

    async fn stream(&self, prompt: &str, tx: mpsc::Sender<StreamEvent>) {
        if !self.config.enabled {
            let _ = tx.send(StreamEvent::Failed(LlmError::Disabled)).await;
            return;
        }

        let body = GenerateRequest {
            model: &self.config.model,
            prompt,
            stream: true,
        };
        let response = match self
            .http
            .post(self.endpoint("/api/generate"))
            .json(&body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                let _ = tx
                    .send(StreamEvent::Failed(LlmError::Request(e.to_string())))
                    .await;
                return;
            }
        };

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            let _ = tx
                .send(StreamEvent::Failed(LlmError::Api(format!(
                    "status {status}: {text}"
                ))))
                .await;
            return;
        }

        // The streaming body is NDJSON: one GenerateResponse per line.
        let mut body_stream = response.bytes_stream();
        let mut buf: Vec<u8> = Vec::new();
        while let Some(chunk) = body_stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    let _ = tx
                        .send(StreamEvent::Failed(LlmError::Stream(e.to_string())))
                        .await;
                    return;
                }
            };
            buf.extend_from_slice(&chunk);
            while let Some(pos) = buf.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = buf.drain(..=pos).collect();
                if let LineOutcome::Terminal = emit_line(&line, &tx).await {
                    return;
                }
            }
        }
        // A final object without a trailing newline still counts.
        if !buf.is_empty() {
            if let LineOutcome::Terminal = emit_line(&buf, &tx).await {
                return;
            }
        }
        let _ = tx
            .send(StreamEvent::Failed(LlmError::Stream(
                "response ended before completion".to_string(),
            )))
            .await;
    }
}

enum LineOutcome {
    Continue,
    Terminal,
}

async fn emit_line(raw: &[u8], tx: &mpsc::Sender<StreamEvent>) -> LineOutcome {
    let line = String::from_utf8_lossy(raw);
    let line = line.trim();
    if line.is_empty() {
        return LineOutcome::Continue;
    }

    let parsed: GenerateResponse = match serde_json::from_str(line) {
        Ok(parsed) => parsed,
        Err(e) => {
            let _ = tx
                .send(StreamEvent::Failed(LlmError::Stream(format!(
                    "malformed stream line: {e}"
                ))))
                .await;
            return LineOutcome::Terminal;
        }
    };

    if let Some(err) = parsed.error {
        let _ = tx.send(StreamEvent::Failed(LlmError::Api(err))).await;
        return LineOutcome::Terminal;
    }
    if !parsed.response.is_empty()
        && tx.send(StreamEvent::Delta(parsed.response)).await.is_err()
    {
        // Receiver gone: nobody is left to deliver to, stop producing.
        return LineOutcome::Terminal;
    }
    if parsed.done {
        let _ = tx.send(StreamEvent::Done).await;
        return LineOutcome::Terminal;
    }
    LineOutcome::Continue
}
