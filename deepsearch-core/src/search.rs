//! Search service abstraction.
//!
//! Defines the `SearchProvider` trait used by area research and a scriptable
//! `MockSearchProvider` test double.

use crate::error::ProviderError;
use crate::types::{SearchDepth, SearchHit, SearchResponse};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Trait for web search providers.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Run one search and return up to `max_results` hits.
    async fn search(
        &self,
        query: &str,
        max_results: usize,
        depth: SearchDepth,
    ) -> Result<SearchResponse, ProviderError>;

    /// Human-readable provider name, used in logs.
    fn name(&self) -> &str;
}

/// One recorded call to [`MockSearchProvider::search`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedSearch {
    pub query: String,
    pub max_results: usize,
    pub depth: SearchDepth,
}

type SearchHook = Arc<dyn Fn(usize, &str) + Send + Sync>;

/// A mock search provider for testing.
///
/// Produces `hits_per_query` synthetic hits per call, numbered globally so every
/// URL is distinct. Queries containing a configured substring fail instead.
pub struct MockSearchProvider {
    hits_per_query: usize,
    failing_patterns: Vec<String>,
    fail_all: bool,
    latency: Option<Duration>,
    hook: Option<SearchHook>,
    calls: Mutex<Vec<RecordedSearch>>,
}

impl MockSearchProvider {
    pub fn new() -> Self {
        Self {
            hits_per_query: 2,
            failing_patterns: Vec::new(),
            fail_all: false,
            latency: None,
            hook: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Return this many hits per query.
    pub fn with_hits_per_query(mut self, hits: usize) -> Self {
        self.hits_per_query = hits;
        self
    }

    /// Fail every query whose text contains `pattern`.
    pub fn failing_on(mut self, pattern: impl Into<String>) -> Self {
        self.failing_patterns.push(pattern.into());
        self
    }

    /// Fail every query.
    pub fn failing_always(mut self) -> Self {
        self.fail_all = true;
        self
    }

    /// Sleep this long inside every `search` call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Run `hook(call_number, query)` at the start of every call (1-based).
    pub fn with_hook(mut self, hook: impl Fn(usize, &str) + Send + Sync + 'static) -> Self {
        self.hook = Some(Arc::new(hook));
        self
    }

    /// Number of `search` calls made so far.
    pub fn call_count(&self) -> usize {
        self.lock_calls().len()
    }

    /// All calls received so far, in order.
    pub fn calls(&self) -> Vec<RecordedSearch> {
        self.lock_calls().clone()
    }

    fn lock_calls(&self) -> std::sync::MutexGuard<'_, Vec<RecordedSearch>> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for MockSearchProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SearchProvider for MockSearchProvider {
    async fn search(
        &self,
        query: &str,
        max_results: usize,
        depth: SearchDepth,
    ) -> Result<SearchResponse, ProviderError> {
        let call_number = {
            let mut calls = self.lock_calls();
            calls.push(RecordedSearch {
                query: query.to_string(),
                max_results,
                depth,
            });
            calls.len()
        };
        if let Some(hook) = &self.hook {
            hook(call_number, query);
        }
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        if self.fail_all || self.failing_patterns.iter().any(|p| query.contains(p.as_str())) {
            return Err(ProviderError::Request {
                message: format!("mock search failure for '{query}'"),
            });
        }

        let count = self.hits_per_query.min(max_results);
        let results = (0..count)
            .map(|i| {
                let n = (call_number - 1) * self.hits_per_query + i + 1;
                SearchHit::new(
                    format!("Result {n}"),
                    format!("https://example.com/{n}"),
                    format!("Content for result {n} about {query}"),
                )
            })
            .collect();
        Ok(SearchResponse::new(results))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_search_generates_distinct_hits() {
        let provider = MockSearchProvider::new().with_hits_per_query(3);
        let first = provider.search("a", 10, SearchDepth::Basic).await.unwrap();
        let second = provider.search("b", 10, SearchDepth::Advanced).await.unwrap();
        assert_eq!(first.results.len(), 3);
        assert_eq!(second.results[0].url, "https://example.com/4");
        assert_eq!(provider.calls()[1].depth, SearchDepth::Advanced);
    }

    #[tokio::test]
    async fn test_mock_search_respects_max_results() {
        let provider = MockSearchProvider::new().with_hits_per_query(8);
        let resp = provider.search("q", 5, SearchDepth::Basic).await.unwrap();
        assert_eq!(resp.results.len(), 5);
    }

    #[tokio::test]
    async fn test_mock_search_failure_pattern() {
        let provider = MockSearchProvider::new().failing_on("broken");
        assert!(provider.search("ok query", 5, SearchDepth::Basic).await.is_ok());
        let err = provider
            .search("a broken query", 5, SearchDepth::Basic)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Request { .. }));
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn test_mock_search_hook_sees_call_numbers() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let provider = MockSearchProvider::new().with_hook(move |n, q| {
            sink.lock().unwrap().push((n, q.to_string()));
        });
        provider.search("x", 5, SearchDepth::Basic).await.unwrap();
        provider.search("y", 5, SearchDepth::Basic).await.unwrap();
        assert_eq!(
            *seen.lock().unwrap(),
            vec![(1, "x".to_string()), (2, "y".to_string())]
        );
    }
}
