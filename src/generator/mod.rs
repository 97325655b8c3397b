//! Response Generator
//!
//! Turns a tool invocation into fabricated vendor JSON by asking a text
//! backend. Generation never fails outward: backend errors and unparseable
//! replies are folded into error-shaped JSON values.

mod backend;
mod extract;
mod prompt;

pub use backend::{AnthropicBackend, CompletionRequest, TextBackend};
pub use extract::{PARSE_FAILURE, RAW_EXCERPT_LIMIT, parse_reply, strip_code_fence};
pub use prompt::{PromptLibrary, fallback_prompt};

use std::sync::Arc;

use serde_json::{Map, Value, json};
use tracing::{debug, error};

use crate::Result;
use crate::config::{Config, LlmConfig};
use crate::vendor::Vendor;

/// Error message used when the backend call itself fails
pub const GENERATION_FAILURE: &str = "Failed to generate response";

/// One tool call to be answered
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    /// Vendor the tool belongs to
    pub vendor: Vendor,
    /// Tool name as advertised by `tools/list`
    pub tool_name: String,
    /// Declared parameters, defaults filled in, `port_context` excluded
    pub parameters: Map<String, Value>,
    /// Caller-supplied `port_context`
    pub caller_context: Value,
}

/// Fabricates vendor responses through a [`TextBackend`]
#[derive(Clone)]
pub struct ResponseGenerator {
    backend: Arc<dyn TextBackend>,
    prompts: Arc<PromptLibrary>,
    model: String,
    max_tokens: u32,
}

impl std::fmt::Debug for ResponseGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseGenerator")
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .finish_non_exhaustive()
    }
}

impl ResponseGenerator {
    /// Create a generator with the configured model and token bound
    pub fn new(backend: Arc<dyn TextBackend>, prompts: PromptLibrary, config: &LlmConfig) -> Self {
        Self {
            backend,
            prompts: Arc::new(prompts),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
        }
    }

    /// Generator backed by the Anthropic Messages API, with prompts loaded
    /// from the configured directory
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn anthropic(config: &Config, api_key: String) -> Result<Self> {
        let backend = AnthropicBackend::new(&config.llm, api_key)?;
        let prompts = PromptLibrary::load(&config.prompts.directory);
        Ok(Self::new(Arc::new(backend), prompts, &config.llm))
    }

    /// Prompt table in use
    #[must_use]
    pub fn prompts(&self) -> &PromptLibrary {
        &self.prompts
    }

    /// Produce a JSON value for `invocation`.
    ///
    /// Exactly one backend call is made. The result is the parsed reply, or an
    /// `{"error", ...}` object describing why no usable reply was obtained.
    pub async fn generate(&self, invocation: &ToolInvocation) -> Value {
        let request = CompletionRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            system: self.prompts.system_prompt(invocation.vendor).into_owned(),
            prompt: build_user_prompt(invocation),
        };

        debug!(
            vendor = %invocation.vendor,
            tool = %invocation.tool_name,
            "Generating mock response"
        );

        match self.backend.complete(&request).await {
            Ok(text) => parse_reply(&text),
            Err(e) => {
                error!(
                    vendor = %invocation.vendor,
                    tool = %invocation.tool_name,
                    error = %e,
                    "Backend call failed"
                );
                json!({
                    "error": GENERATION_FAILURE,
                    "detail": e.to_string(),
                })
            }
        }
    }
}

/// User message for one invocation
#[must_use]
pub fn build_user_prompt(invocation: &ToolInvocation) -> String {
    let parameters = serde_json::to_string_pretty(&invocation.parameters).unwrap_or_default();
    let context = serde_json::to_string_pretty(&invocation.caller_context).unwrap_or_default();
    format!(
        "\nTOOL CALLED: {tool}\nPARAMETERS: {parameters}\n\nPORT CONTEXT:\n{context}\n\n\
         Generate a realistic {vendor} response. Return valid JSON only.\n",
        tool = invocation.tool_name,
        vendor = invocation.vendor,
    )
}
