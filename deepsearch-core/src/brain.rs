//! Brain module: the completion service abstraction.
//!
//! Defines the `LlmProvider` trait the research pipeline talks to, plus a
//! scriptable `MockLlmProvider` for tests and offline runs.

use crate::error::ProviderError;
use crate::types::Message;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

/// Trait for completion providers.
///
/// Implementations own transport concerns (auth, timeouts, retries); the
/// research pipeline calls `complete` once per prompt and never retries.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Send an ordered conversation and return the model's text reply.
    async fn complete(&self, messages: Vec<Message>) -> Result<String, ProviderError>;

    /// Return the model name.
    fn model_name(&self) -> &str;
}

/// A mock completion provider for testing and development.
///
/// Replies are served from a FIFO queue; once it runs dry every call gets the
/// fallback text. Every prompt is recorded for assertions.
pub struct MockLlmProvider {
    model: String,
    fallback: String,
    latency: Option<Duration>,
    responses: Mutex<VecDeque<Result<String, ProviderError>>>,
    prompts: Mutex<Vec<Vec<Message>>>,
}

impl MockLlmProvider {
    pub fn new() -> Self {
        Self {
            model: "mock-model".to_string(),
            fallback: "I'm a mock LLM. No queued responses available.".to_string(),
            latency: None,
            responses: Mutex::new(VecDeque::new()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Create a MockLlmProvider that always returns the given text.
    pub fn with_response(text: &str) -> Self {
        let mut provider = Self::new();
        provider.fallback = text.to_string();
        provider
    }

    /// Sleep this long inside every `complete` call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Queue a successful reply for the next `complete` call.
    pub fn queue_response(&self, text: impl Into<String>) {
        self.lock_responses().push_back(Ok(text.into()));
    }

    /// Queue a failure for the next `complete` call.
    pub fn queue_error(&self, error: ProviderError) {
        self.lock_responses().push_back(Err(error));
    }

    /// Number of `complete` calls made so far.
    pub fn call_count(&self) -> usize {
        self.lock_prompts().len()
    }

    /// All conversations received so far, in call order.
    pub fn prompts(&self) -> Vec<Vec<Message>> {
        self.lock_prompts().clone()
    }

    fn lock_responses(&self) -> std::sync::MutexGuard<'_, VecDeque<Result<String, ProviderError>>> {
        self.responses.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_prompts(&self) -> std::sync::MutexGuard<'_, Vec<Vec<Message>>> {
        self.prompts.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for MockLlmProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmProvider for MockLlmProvider {
    async fn complete(&self, messages: Vec<Message>) -> Result<String, ProviderError> {
        self.lock_prompts().push(messages);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let next = self.lock_responses().pop_front();
        next.unwrap_or_else(|| Ok(self.fallback.clone()))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
