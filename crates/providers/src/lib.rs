//! Model backend implementations for ask-ollama.
//!
//! All backends implement the `askollama_core::Provider` trait.

pub mod openai_compat;

pub use openai_compat::{OLLAMA_DEFAULT_URL, OpenAiCompatProvider};

use askollama_config::AppConfig;
use askollama_core::error::ProviderError;
use std::time::Duration;
use tracing::debug;

/// Build the configured backend.
///
/// The API key comes from `api_key` in the config file or
/// `ASK_OLLAMA_API_KEY`; Ollama itself ignores it.
pub fn build_from_config(config: &AppConfig) -> Result<OpenAiCompatProvider, ProviderError> {
    let api_url = config.backend.api_url.trim();
    if api_url.is_empty() {
        return Err(ProviderError::NotConfigured("backend.api_url is empty".into()));
    }

    let api_key = config.api_key.clone().unwrap_or_else(|| "ollama".into());
    debug!(url = %api_url, timeout_secs = config.backend.timeout_secs, "Building backend");

    OpenAiCompatProvider::new(
        "ollama",
        api_url,
        api_key,
        Duration::from_secs(config.backend.timeout_secs),
    )
}
