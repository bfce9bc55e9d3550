//! Provider trait: the abstraction over the model backend.
//!
//! The core needs exactly one capability from a backend: send
//! `{system prompt, context, prompt, max tokens, temperature}` and get back
//! `{text, input tokens, output tokens}`, or fail.
//!
//! Implementations: OpenAI-compatible HTTP (Ollama), scripted doubles in tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::ProviderError;
use crate::turn::Turn;

/// One chat request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// The model to use (e.g., "llama3.2", "deepseek-r1:14b")
    pub model: String,

    /// System instructions
    #[serde(default)]
    pub system_prompt: String,

    /// Prior turns grounding the reply, oldest first
    #[serde(default)]
    pub context: Vec<Turn>,

    /// The user prompt for this exchange
    pub prompt: String,

    /// Maximum tokens the backend may spend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Temperature (0.0 = deterministic, 2.0 = very creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_temperature() -> f32 {
    0.7
}

/// A complete response from the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// The generated text
    pub text: String,

    /// Token usage as reported by the backend
    pub usage: Option<Usage>,

    /// Which model actually responded (may differ from requested)
    pub model: String,
}

impl ProviderResponse {
    /// Reported prompt tokens, or 0 when the backend sent no usage.
    pub fn input_tokens(&self) -> i32 {
        self.usage.as_ref().map_or(0, |u| u.prompt_tokens as i32)
    }

    /// Reported completion tokens, or 0 when the backend sent no usage.
    pub fn output_tokens(&self) -> i32 {
        self.usage.as_ref().map_or(0, |u| u.completion_tokens as i32)
    }
}

/// Token usage information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// The core Provider trait.
///
/// The chat session calls `complete()` without knowing which backend is in
/// use. There is no retry or timeout policy at this layer; a failure is
/// returned to the caller of the exchange.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this backend (e.g., "ollama").
    fn name(&self) -> &str;

    /// Send a request and get a complete response.
    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError>;
}
