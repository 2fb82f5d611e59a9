//! Google-Serper web search provider.

use super::{build_client, map_http_error, resolve_api_key};
use crate::config::SearchConfig;
use crate::error::ProviderError;
use crate::search::SearchProvider;
use crate::types::{SearchDepth, SearchHit, SearchResponse};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

const DEFAULT_ENDPOINT: &str = "https://google.serper.dev/search";

#[derive(Debug, Deserialize)]
struct SerperResponse {
    #[serde(default)]
    organic: Vec<SerperOrganic>,
    #[serde(default, rename = "answerBox")]
    answer_box: Option<SerperAnswerBox>,
}

#[derive(Debug, Deserialize)]
struct SerperOrganic {
    #[serde(default)]
    title: String,
    link: String,
    #[serde(default)]
    snippet: String,
}

#[derive(Debug, Deserialize)]
struct SerperAnswerBox {
    #[serde(default)]
    answer: Option<String>,
}

/// Parse a Serper response, keeping at most `max_results` organic hits.
fn parse_response(body: &str, max_results: usize) -> Result<SearchResponse, ProviderError> {
    let parsed: SerperResponse =
        serde_json::from_str(body).map_err(|e| ProviderError::ResponseParse {
            message: format!("Invalid Serper response: {e}"),
        })?;
    Ok(SearchResponse {
        results: parsed
            .organic
            .into_iter()
            .take(max_results)
            .map(|o| SearchHit::new(o.title, o.link, o.snippet))
            .collect(),
        answer: parsed.answer_box.and_then(|b| b.answer),
    })
}

pub struct SerperSearch {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl SerperSearch {
    pub fn new(config: &SearchConfig) -> Result<Self, ProviderError> {
        let api_key = resolve_api_key(config.api_key.as_deref(), &config.key_env())?;
        Ok(Self {
            client: build_client(config.timeout_secs)?,
            endpoint: config
                .endpoint
                .clone()
                .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            api_key,
        })
    }
}

#[async_trait]
impl SearchProvider for SerperSearch {
    /// Serper has no depth setting; `depth` is ignored.
    async fn search(
        &self,
        query: &str,
        max_results: usize,
        _depth: SearchDepth,
    ) -> Result<SearchResponse, ProviderError> {
        debug!(query, max_results, "Sending Serper search");

        let response = self
            .client
            .post(&self.endpoint)
            .header("X-API-KEY", &self.api_key)
            .json(&json!({ "q": query }))
            .send()
            .await
            .map_err(|e| ProviderError::Request {
                message: format!("Request to Serper failed: {e}"),
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ProviderError::ResponseParse {
                message: format!("Failed to read response body: {e}"),
            })?;
        if !status.is_success() {
            return Err(map_http_error("Serper", status, &text));
        }
        parse_response(&text, max_results)
    }

    fn name(&self) -> &str {
        "serper"
    }
}
