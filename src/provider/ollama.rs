//! Ollama adapter for the reasoning provider interface.
//!
//! Talks to a local Ollama instance via `/api/chat`. Structured mode uses
//! Ollama's `format: "json"` constraint.

use crate::config::ProviderConfig;
use crate::error::ProviderError;
use crate::provider::ReasoningProvider;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Ollama chat API request.
#[derive(Debug, Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'a str>,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: i64,
}

/// Ollama chat API response.
#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

/// Reasoning provider backed by a local Ollama instance.
pub struct OllamaProvider {
    url: String,
    model: String,
    temperature: f32,
    max_tokens: usize,
    timeout_seconds: u64,
    http_client: reqwest::Client,
}

impl OllamaProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            url: config.api_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            timeout_seconds: config.timeout_seconds,
            http_client,
        })
    }

    fn map_send_error(&self, e: reqwest::Error) -> ProviderError {
        if e.is_timeout() {
            ProviderError::Timeout {
                seconds: self.timeout_seconds,
            }
        } else if e.is_connect() {
            ProviderError::Connection {
                url: self.url.clone(),
            }
        } else {
            ProviderError::Api {
                status: e.status().map(|s| s.as_u16()).unwrap_or(0),
                message: e.to_string(),
            }
        }
    }
}

#[async_trait]
impl ReasoningProvider for OllamaProvider {
    async fn invoke(
        &self,
        instructions: &str,
        task: &str,
        structured: bool,
    ) -> Result<String, ProviderError> {
        let url = format!("{}/api/chat", self.url);

        let request = OllamaChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: instructions,
                },
                ChatMessage {
                    role: "user",
                    content: task,
                },
            ],
            stream: false,
            format: structured.then_some("json"),
            options: OllamaOptions {
                temperature: self.temperature,
                num_predict: self.max_tokens as i64,
            },
        };

        debug!("Sending Ollama chat request (structured: {})", structured);

        let response = self
            .http_client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                status,
                message: body,
            });
        }

        let chat_response: OllamaChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Decode(e.to_string()))?;

        Ok(chat_response.message.content)
    }
}
