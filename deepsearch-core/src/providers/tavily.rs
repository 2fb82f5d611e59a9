//! Tavily web search provider.

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

const DEFAULT_ENDPOINT: &str = "https://api.tavily.com/search";

/// Tavily never returns fewer than this many results per request.
const MIN_RESULTS: usize = 5;

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    answer: Option<String>,
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    #[serde(default)]
    title: String,
    url: String,
    #[serde(default)]
    content: String,
}

/// Parse a Tavily response body.
fn parse_response(body: &str) -> Result<SearchResponse, ProviderError> {
    let parsed: TavilyResponse =
        serde_json::from_str(body).map_err(|e| ProviderError::ResponseParse {
            message: format!("Invalid Tavily response: {e}"),
        })?;
    Ok(SearchResponse {
        results: parsed
            .results
            .into_iter()
            .map(|r| SearchHit::new(r.title, r.url, r.content))
            .collect(),
        answer: parsed.answer.filter(|a| !a.is_empty()),
    })
}

pub struct TavilySearch {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl TavilySearch {
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
impl SearchProvider for TavilySearch {
    async fn search(
        &self,
        query: &str,
        max_results: usize,
        depth: SearchDepth,
    ) -> Result<SearchResponse, ProviderError> {
        let body = json!({
            "api_key": self.api_key,
            "query": query,
            "max_results": max_results.max(MIN_RESULTS),
            "search_depth": depth.as_str(),
        });
        debug!(query, max_results, depth = %depth, "Sending Tavily search");

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Request {
                message: format!("Request to Tavily failed: {e}"),
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ProviderError::ResponseParse {
                message: format!("Failed to read response body: {e}"),
            })?;
        if !status.is_success() {
            return Err(map_http_error("Tavily", status, &text));
        }
        parse_response(&text)
    }

    fn name(&self) -> &str {
        "tavily"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_response() {
        let body = r#"{
            "query": "rust async",
            "answer": "Rust uses futures.",
            "results": [
                {"title": "Async book", "url": "https://rust-lang.github.io/async-book/", "content": "Futures...", "score": 0.9},
                {"url": "https://tokio.rs", "content": "Tokio runtime"}
            ]
        }"#;
        let resp = parse_response(body).unwrap();
        assert_eq!(resp.results.len(), 2);
        assert_eq!(resp.results[0].title, "Async book");
        assert_eq!(resp.results[1].title, "");
        assert_eq!(resp.answer.as_deref(), Some("Rust uses futures."));
    }

    #[test]
    fn test_parse_invalid_body() {
        assert!(matches!(
            parse_response("<html>"),
            Err(ProviderError::ResponseParse { .. })
        ));
    }

    #[test]
    fn test_endpoint_override() {
        let config = SearchConfig {
            api_key: Some("k".into()),
            endpoint: Some("http://localhost:9000/search".into()),
            ..SearchConfig::default()
        };
        let search = TavilySearch::new(&config).unwrap();
        assert_eq!(search.endpoint, "http://localhost:9000/search");
        assert_eq!(search.name(), "tavily");
    }
}
