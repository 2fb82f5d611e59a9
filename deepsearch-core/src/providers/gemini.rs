//! Google Gemini completion provider.
//!
//! Talks to the Generative Language `generateContent` endpoint. Conversation
//! roles map user -> `user` and assistant -> `model`. The API key travels in
//! the `x-goog-api-key` header and never appears in a URL or error message.

use super::{build_client, map_http_error, resolve_api_key};
use crate::brain::LlmProvider;
use crate::config::LlmConfig;
use crate::error::ProviderError;
use crate::types::{Message, Role};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde_json::{Value, json};
use tracing::debug;

/// The default Google Gemini API base URL.
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Google Gemini API provider.
pub struct GeminiProvider {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f64,
    max_output_tokens: u32,
}

impl GeminiProvider {
    /// Create a provider from configuration.
    ///
    /// The key comes from `config.api_key`, else from the `config.api_key_env`
    /// variable; `MissingApiKey` when neither is set.
    pub fn new(config: &LlmConfig) -> Result<Self, ProviderError> {
        let api_key = resolve_api_key(config.api_key.as_deref(), &config.api_key_env)?;
        Self::new_with_key(config, api_key)
    }

    /// Create a provider with an explicitly provided API key.
    pub fn new_with_key(config: &LlmConfig, api_key: String) -> Result<Self, ProviderError> {
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        Ok(Self {
            client: build_client(config.timeout_secs)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
        })
    }

    fn build_request_body(&self, messages: &[Message]) -> Value {
        let contents: Vec<Value> = messages
            .iter()
            .map(|msg| {
                let role = match msg.role {
                    Role::User => "user",
                    Role::Assistant => "model",
                };
                json!({ "role": role, "parts": [{ "text": msg.content }] })
            })
            .collect();

        json!({
            "contents": contents,
            "generationConfig": {
                "temperature": self.temperature,
                "maxOutputTokens": self.max_output_tokens,
            }
        })
    }

    /// Concatenate the text parts of the first candidate.
    fn parse_response(body: &Value) -> Result<String, ProviderError> {
        let candidate = body["candidates"]
            .as_array()
            .and_then(|c| c.first())
            .ok_or_else(|| ProviderError::ResponseParse {
                message: "Missing or empty 'candidates' array in response".to_string(),
            })?;

        let parts = candidate["content"]["parts"]
            .as_array()
            .ok_or_else(|| ProviderError::ResponseParse {
                message: "Missing 'parts' array in candidate content".to_string(),
            })?;

        let text: String = parts
            .iter()
            .filter_map(|p| p.get("text").and_then(Value::as_str))
            .collect();
        Ok(text)
    }

    fn endpoint_url(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    fn request(&self, body: &Value) -> RequestBuilder {
        self.client
            .post(self.endpoint_url())
            .header("x-goog-api-key", &self.api_key)
            .header("content-type", "application/json")
            .json(body)
    }
}

/// Transport failure, with the request URL stripped from the message.
fn request_error(e: reqwest::Error) -> ProviderError {
    ProviderError::Request {
        message: format!("Request to Gemini API failed: {}", e.without_url()),
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    async fn complete(&self, messages: Vec<Message>) -> Result<String, ProviderError> {
        let body = self.build_request_body(&messages);

        debug!(
            model = self.model.as_str(),
            messages = messages.len(),
            "Sending Gemini completion request"
        );

        let response = self.request(&body).send().await.map_err(request_error)?;

        let status = response.status();
        let body_text = response
            .text()
            .await
            .map_err(|e| ProviderError::ResponseParse {
                message: format!("Failed to read response body: {e}"),
            })?;

        if !status.is_success() {
            return Err(map_http_error("Gemini", status, &body_text));
        }

        let response_json: Value =
            serde_json::from_str(&body_text).map_err(|e| ProviderError::ResponseParse {
                message: format!("Invalid JSON in response: {e}"),
            })?;

        Self::parse_response(&response_json)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_provider() -> GeminiProvider {
        let config = LlmConfig {
            model: "gemini-1.5-flash".to_string(),
            ..LlmConfig::default()
        };
        GeminiProvider::new_with_key(&config, "test-gemini-key".to_string())
            .expect("Provider creation should succeed")
    }

    #[test]
    fn test_new_reads_env() {
        let env_var = "GEMINI_TEST_KEY_NEW_READS";
        // SAFETY: test-only env var manipulation
        unsafe { std::env::set_var(env_var, "my-gemini-api-key") };
        let config = LlmConfig {
            api_key_env: env_var.to_string(),
            ..LlmConfig::default()
        };
        let provider = GeminiProvider::new(&config).unwrap();
        assert_eq!(provider.api_key, "my-gemini-api-key");
        assert_eq!(provider.base_url, DEFAULT_BASE_URL);
        // SAFETY: test-only env var manipulation
        unsafe { std::env::remove_var(env_var) };
    }

    #[test]
    fn test_missing_key() {
        // SAFETY: test-only env var manipulation
        unsafe { std::env::remove_var("GEMINI_MISSING_KEY_XYZ") };
        let config = LlmConfig {
            api_key_env: "GEMINI_MISSING_KEY_XYZ".to_string(),
            ..LlmConfig::default()
        };
        match GeminiProvider::new(&config) {
            Err(ProviderError::MissingApiKey { var }) => {
                assert_eq!(var, "GEMINI_MISSING_KEY_XYZ")
            }
            other => panic!("Expected MissingApiKey, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_custom_base_url() {
        let config = LlmConfig {
            base_url: Some("https://my-proxy.example.com/v1/".to_string()),
            ..LlmConfig::default()
        };
        let provider = GeminiProvider::new_with_key(&config, "k".into()).unwrap();
        assert_eq!(
            provider.endpoint_url(),
            "https://my-proxy.example.com/v1/models/gemini-1.5-flash:generateContent"
        );
    }

    #[test]
    fn test_key_sent_in_header_not_url() {
        let provider = make_provider();
        let request = provider
            .request(&provider.build_request_body(&[Message::user("Hi")]))
            .build()
            .unwrap();
        assert!(!request.url().as_str().contains("test-gemini-key"));
        assert_eq!(request.headers()["x-goog-api-key"], "test-gemini-key");
    }

    #[tokio::test]
    async fn test_transport_error_omits_key() {
        let config = LlmConfig {
            base_url: Some("http://127.0.0.1:1/v1beta".to_string()),
            timeout_secs: 5,
            ..LlmConfig::default()
        };
        let provider = GeminiProvider::new_with_key(&config, "secret-key-123".into()).unwrap();

        let err = provider
            .complete(vec![Message::user("Hi")])
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Request { .. }));
        assert!(!err.to_string().contains("secret-key-123"));
        assert!(!err.to_string().contains("127.0.0.1"));
    }

    #[test]
    fn test_request_body_maps_roles() {
        let provider = make_provider();
        let body = provider.build_request_body(&[
            Message::user("Hello"),
            Message::assistant("Hi there"),
            Message::user("Research X"),
        ]);

        let contents = body["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[0]["role"], "user");
        assert_eq!(contents[1]["role"], "model");
        assert_eq!(contents[1]["parts"][0]["text"], "Hi there");
        assert_eq!(body["generationConfig"]["temperature"], 0.7);
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 8192);
    }

    #[test]
    fn test_parse_text_response() {
        let body = json!({
            "candidates": [{
                "content": {
                    "parts": [{"text": "Hello "}, {"text": "world"}],
                    "role": "model"
                },
                "finishReason": "STOP"
            }]
        });
        assert_eq!(GeminiProvider::parse_response(&body).unwrap(), "Hello world");
    }

    #[test]
    fn test_parse_empty_candidates() {
        let body = json!({ "candidates": [] });
        assert!(matches!(
            GeminiProvider::parse_response(&body),
            Err(ProviderError::ResponseParse { .. })
        ));
    }

    #[test]
    fn test_parse_missing_parts() {
        let body = json!({ "candidates": [{ "content": {} }] });
        let err = GeminiProvider::parse_response(&body).unwrap_err();
        assert!(err.to_string().contains("parts"));
    }

    #[test]
    fn test_provider_properties() {
        assert_eq!(make_provider().model_name(), "gemini-1.5-flash");
    }
}
