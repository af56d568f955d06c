//! OpenAI-compatible chat completions backend.
//!
//! Works with any provider exposing `POST {base_url}/chat/completions`:
//! - OpenRouter (default)
//! - OpenAI
//! - Ollama's OpenAI-compatible endpoint

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use pacer_core::config::{endpoints, env_parse, env_vars, models};
use pacer_core::{ChatRequest, ChatResponse, EventStream, LlmBackend, LlmError, StreamEvent};

use crate::sse::{delta_events, SseEvent, SseParser};

/// Configuration for an OpenAI-compatible endpoint.
#[derive(Clone, Deserialize, Serialize)]
pub struct OpenAiCompatConfig {
    /// Used when the request carries no key of its own.
    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Used when the request names no model.
    #[serde(default = "default_model")]
    pub model: String,

    /// Request timeout in seconds (default: 60). For streams it bounds the
    /// wait for each chunk.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

fn default_base_url() -> String {
    endpoints::OPENROUTER.to_string()
}

fn default_model() -> String {
    models::DEFAULT.to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for OpenAiCompatConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_base_url(),
            model: default_model(),
            timeout_secs: default_timeout_secs(),
            temperature: None,
        }
    }
}

impl OpenAiCompatConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Load from environment variables on top of the defaults.
    pub fn from_env() -> Self {
        Self::default().apply_env()
    }

    /// Overlay `PACER_API_KEY`, `PACER_ENDPOINT`, `PACER_MODEL` and
    /// `PACER_TIMEOUT_SECS` when set.
    pub fn apply_env(mut self) -> Self {
        if let Ok(key) = std::env::var(env_vars::API_KEY) {
            self.api_key = key;
        }
        if let Ok(endpoint) = std::env::var(env_vars::ENDPOINT) {
            self.base_url = endpoint;
        }
        if let Ok(model) = std::env::var(env_vars::MODEL) {
            self.model = model;
        }
        if let Some(secs) = env_parse::<u64>(env_vars::TIMEOUT_SECS) {
            self.timeout_secs = secs;
        }
        self
    }

    fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

impl std::fmt::Debug for OpenAiCompatConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCompatConfig")
            .field("api_key", &if self.api_key.is_empty() { "<unset>" } else { "<redacted>" })
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("timeout_secs", &self.timeout_secs)
            .field("temperature", &self.temperature)
            .finish()
    }
}

fn status_error(status: StatusCode, body: String) -> LlmError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => LlmError::Auth(body),
        _ => LlmError::Api {
            status: status.as_u16(),
            body,
        },
    }
}

fn network_error(e: reqwest::Error, timeout_secs: u64) -> LlmError {
    if e.is_timeout() {
        LlmError::Timeout(timeout_secs)
    } else {
        LlmError::Network(e.to_string())
    }
}

/// Backend talking to an OpenAI-compatible endpoint.
pub struct OpenAiCompatBackend {
    config: OpenAiCompatConfig,
    client: Client,
}

impl OpenAiCompatBackend {
    pub fn new(config: OpenAiCompatConfig) -> Result<Self, LlmError> {
        let client = Client::builder()
            .connect_timeout(config.timeout())
            .build()
            .map_err(|e| LlmError::Network(e.to_string()))?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &OpenAiCompatConfig {
        &self.config
    }

    fn body(&self, request: &ChatRequest, stream: bool) -> ChatCompletionRequest {
        let mut messages = Vec::with_capacity(request.history.len() + 1);
        if !request.system_prompt.trim().is_empty() {
            messages.push(ApiMessage {
                role: "system".to_string(),
                content: request.system_prompt.clone(),
            });
        }
        messages.extend(request.history.iter().map(|entry| ApiMessage {
            role: entry.role.as_str().to_string(),
            content: entry.content.clone(),
        }));

        let model = if request.model.trim().is_empty() {
            self.config.model.clone()
        } else {
            request.model.clone()
        };

        ChatCompletionRequest {
            model,
            messages,
            temperature: self.config.temperature,
            stream,
        }
    }

    fn api_key<'a>(&'a self, request: &'a ChatRequest) -> &'a str {
        if request.api_key.is_empty() {
            &self.config.api_key
        } else {
            &request.api_key
        }
    }

    async fn send(
        &self,
        request: &ChatRequest,
        stream: bool,
    ) -> Result<reqwest::Response, LlmError> {
        let body = self.body(request, stream);
        tracing::debug!(
            model = %body.model,
            messages = body.messages.len(),
            stream,
            "Sending chat completion request"
        );

        let mut builder = self
            .client
            .post(self.config.chat_url())
            .bearer_auth(self.api_key(request))
            .json(&body);
        if !stream {
            builder = builder.timeout(self.config.timeout());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| network_error(e, self.config.timeout_secs))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!("Chat completion failed with {}: {}", status, body);
            return Err(status_error(status, body));
        }
        Ok(response)
    }
}

#[async_trait]
impl LlmBackend for OpenAiCompatBackend {
    fn name(&self) -> &str {
        "openai-compatible"
    }

    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, LlmError> {
        let response = self.send(&request, false).await?;
        let body = response
            .text()
            .await
            .map_err(|e| network_error(e, self.config.timeout_secs))?;
        let parsed: ChatCompletionResponse = serde_json::from_str(&body)?;

        let message = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::Generation("No choices in response".to_string()))?
            .message;

        Ok(ChatResponse {
            content: message.content.unwrap_or_default(),
            reasoning: message
                .reasoning
                .or(message.reasoning_content)
                .filter(|r| !r.is_empty()),
        })
    }

    async fn stream(&self, request: ChatRequest) -> Result<EventStream, LlmError> {
        use tokio::sync::mpsc;

        let response = self.send(&request, true).await?;
        let chunk_timeout = self.config.timeout();
        let timeout_secs = self.config.timeout_secs;
        let (tx, rx) = mpsc::channel(64);

        tokio::spawn(async move {
            let mut bytes = response.bytes_stream();
            let mut parser = SseParser::new();
            let mut content = String::new();
            let mut reasoning = String::new();
            let mut received_any = false;

            'read: loop {
                let chunk = match tokio::time::timeout(chunk_timeout, bytes.next()).await {
                    Ok(Some(Ok(chunk))) => chunk,
                    Ok(Some(Err(e))) => {
                        let _ = tx.send(Err(network_error(e, timeout_secs))).await;
                        return;
                    }
                    Ok(None) => break,
                    Err(_) => {
                        let _ = tx.send(Err(LlmError::Timeout(timeout_secs))).await;
                        return;
                    }
                };

                for event in parser.push(&chunk) {
                    let payload = match event {
                        SseEvent::Done => break 'read,
                        SseEvent::Data(payload) => payload,
                    };
                    let events = match delta_events(&payload) {
                        Ok(events) => events,
                        Err(LlmError::Serialization(e)) => {
                            tracing::debug!("Skipping malformed stream chunk: {}", e);
                            continue;
                        }
                        Err(e) => {
                            let _ = tx.send(Err(e)).await;
                            return;
                        }
                    };
                    for event in events {
                        received_any = true;
                        match &event {
                            StreamEvent::Content(token) => content.push_str(token),
                            StreamEvent::Reasoning(token) => reasoning.push_str(token),
                            StreamEvent::Completed(_) => {}
                        }
                        if tx.send(Ok(event)).await.is_err() {
                            // Receiver dropped: the caller stopped listening
                            return;
                        }
                    }
                }
            }

            if let Some(SseEvent::Data(payload)) = parser.finish() {
                if let Ok(events) = delta_events(&payload) {
                    for event in events {
                        received_any = true;
                        match &event {
                            StreamEvent::Content(token) => content.push_str(token),
                            StreamEvent::Reasoning(token) => reasoning.push_str(token),
                            StreamEvent::Completed(_) => {}
                        }
                        let _ = tx.send(Ok(event)).await;
                    }
                }
            }

            if !received_any {
                let _ = tx.send(Err(LlmError::EmptyStream)).await;
                return;
            }

            let mut aggregate = ChatResponse::new(content);
            if !reasoning.is_empty() {
                aggregate = aggregate.with_reasoning(reasoning);
            }
            let _ = tx.send(Ok(StreamEvent::Completed(aggregate))).await;
        });

        Ok(Box::pin(tokio_stream::wrappers::ReceiverStream::new(rx)))
    }
}

// API types

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ApiMessageResponse,
}

#[derive(Debug, Deserialize)]
struct ApiMessageResponse {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    reasoning: Option<String>,
    #[serde(default)]
    reasoning_content: Option<String>,
}
