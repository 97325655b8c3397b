//! Text-generation backend
//!
//! The generator only needs "system + user prompt in, text out". The
//! [`TextBackend`] trait is that seam; [`AnthropicBackend`] implements it
//! against the Anthropic Messages API.

use std::fmt;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use tracing::debug;

use crate::config::LlmConfig;
use crate::{Error, Result};

/// A single-turn completion request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    /// Model identifier
    pub model: String,
    /// Output token bound
    pub max_tokens: u32,
    /// System instruction
    pub system: String,
    /// User message
    pub prompt: String,
}

/// Anything that can turn a prompt into text
#[async_trait]
pub trait TextBackend: Send + Sync {
    /// Run one completion and return the reply text
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;
}

/// Anthropic Messages API client
pub struct AnthropicBackend {
    client: Client,
    api_url: String,
    api_key: String,
    version: String,
}

impl fmt::Debug for AnthropicBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnthropicBackend")
            .field("api_url", &self.api_url)
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

impl AnthropicBackend {
    /// Create a client for the configured endpoint
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &LlmConfig, api_key: String) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| Error::Llm(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            api_key,
            version: config.anthropic_version.clone(),
        })
    }

    fn build_body(request: &CompletionRequest) -> Value {
        json!({
            "model": request.model,
            "max_tokens": request.max_tokens,
            "system": request.system,
            "messages": [{"role": "user", "content": request.prompt}],
        })
    }
}

#[async_trait]
impl TextBackend for AnthropicBackend {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        debug!(model = %request.model, max_tokens = request.max_tokens, "Calling Messages API");

        let response = self
            .client
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", &self.version)
            .json(&Self::build_body(request))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Llm(format!("Messages API returned HTTP {status}: {body}")));
        }

        let body: Value = response.json().await?;
        reply_text(&body)
    }
}

/// Concatenate the `text` blocks of a Messages API response
fn reply_text(body: &Value) -> Result<String> {
    let text: Vec<&str> = body
        .get("content")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter(|block| block.get("type").and_then(Value::as_str) == Some("text"))
        .filter_map(|block| block.get("text").and_then(Value::as_str))
        .collect();

    if text.is_empty() {
        return Err(Error::Llm("Messages API reply carried no text content".to_string()));
    }
    Ok(text.join("\n"))
}
