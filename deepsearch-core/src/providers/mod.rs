//! Concrete collaborator implementations.
//!
//! - Google Gemini for completions
//! - Tavily and Google-Serper for web search
//!
//! Use `create_llm_provider()` / `create_search_provider()` to instantiate the
//! provider named in configuration.

pub mod gemini;
pub mod serper;
pub mod tavily;

use crate::brain::{LlmProvider, MockLlmProvider};
use crate::config::{LlmConfig, SearchConfig};
use crate::error::ProviderError;
use crate::search::{MockSearchProvider, SearchProvider};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

pub use gemini::GeminiProvider;
pub use serper::SerperSearch;
pub use tavily::TavilySearch;

/// Create the completion provider named by `config.provider`.
pub fn create_llm_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>, ProviderError> {
    match config.provider.as_str() {
        "gemini" => Ok(Arc::new(GeminiProvider::new(config)?)),
        "mock" => Ok(Arc::new(MockLlmProvider::new())),
        other => Err(ProviderError::Request {
            message: format!("unknown llm provider '{other}'"),
        }),
    }
}

/// Create the search provider named by `config.provider`.
pub fn create_search_provider(
    config: &SearchConfig,
) -> Result<Arc<dyn SearchProvider>, ProviderError> {
    match config.provider.as_str() {
        "tavily" => Ok(Arc::new(TavilySearch::new(config)?)),
        "serper" => Ok(Arc::new(SerperSearch::new(config)?)),
        "mock" => Ok(Arc::new(MockSearchProvider::new())),
        other => Err(ProviderError::Request {
            message: format!("unknown search provider '{other}'"),
        }),
    }
}

/// An explicit key wins; otherwise read `env_var`.
pub(crate) fn resolve_api_key(
    explicit: Option<&str>,
    env_var: &str,
) -> Result<String, ProviderError> {
    if let Some(key) = explicit.filter(|k| !k.is_empty()) {
        return Ok(key.to_string());
    }
    std::env::var(env_var)
        .ok()
        .filter(|k| !k.is_empty())
        .ok_or_else(|| ProviderError::MissingApiKey {
            var: env_var.to_string(),
        })
}

pub(crate) fn build_client(timeout_secs: u64) -> Result<Client, ProviderError> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .build()
        .map_err(|e| ProviderError::Request {
            message: format!("Failed to build HTTP client: {e}"),
        })
}

/// Map a non-success HTTP status to the appropriate `ProviderError`.
pub(crate) fn map_http_error(
    provider: &str,
    status: reqwest::StatusCode,
    body_text: &str,
) -> ProviderError {
    match status.as_u16() {
        401 | 403 => ProviderError::AuthFailed {
            provider: provider.to_string(),
        },
        429 => ProviderError::RateLimited {
            retry_after_secs: 30,
        },
        code => ProviderError::Http {
            provider: provider.to_string(),
            status: code,
            message: body_text.chars().take(500).collect(),
        },
    }
}
