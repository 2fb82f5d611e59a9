//! Error types for the deepsearch core library.
//!
//! Uses `thiserror` for public API error types. `ProviderError` covers the
//! completion and search collaborators, `ResearchError` is the taxonomy a
//! research run can surface, and `ConfigError` covers configuration loading.

use std::path::PathBuf;

/// Errors raised by an external collaborator (completion or search service).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProviderError {
    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("API key not configured: environment variable {var} is not set")]
    MissingApiKey { var: String },

    #[error("API request failed: {message}")]
    Request { message: String },

    #[error("HTTP {status} from {provider}: {message}")]
    Http {
        provider: String,
        status: u16,
        message: String,
    },

    #[error("API response parse error: {message}")]
    ResponseParse { message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },
}

/// Errors produced by a research run.
///
/// `QuestionResearch` and `AreaResearch` are recovered inside the run and turned
/// into notes; every other variant ends the run in the `Error` state.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ResearchError {
    #[error("Failed to generate research plan: {source}")]
    PlanGeneration {
        #[source]
        source: ProviderError,
    },

    #[error("Research for question '{question}' failed: {source}")]
    QuestionResearch {
        question: String,
        #[source]
        source: ProviderError,
    },

    #[error("Research for area '{area}' failed: {message}")]
    AreaResearch { area: String, message: String },

    #[error("No research data could be collected")]
    NoData,

    #[error("Failed to compile research report: {source}")]
    Compilation {
        #[source]
        source: ProviderError,
    },

    #[error("Research was cancelled")]
    Cancelled,

    #[error("A research run is already active on this engine")]
    AlreadyRunning,
}

impl ResearchError {
    /// Whether the run ended because the caller cancelled it rather than
    /// because something went wrong.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, ResearchError::Cancelled)
    }
}

/// Errors from the configuration system.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Configuration parse error: {0}")]
    Parse(#[from] Box<figment::Error>),
}

/// A type alias for results of research operations.
pub type Result<T> = std::result::Result<T, ResearchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_plan_generation() {
        let err = ResearchError::PlanGeneration {
            source: ProviderError::Request {
                message: "connection refused".into(),
            },
        };
        assert_eq!(
            err.to_string(),
            "Failed to generate research plan: API request failed: connection refused"
        );
    }

    #[test]
    fn test_error_display_question() {
        let err = ResearchError::QuestionResearch {
            question: "What changed in 2024?".into(),
            source: ProviderError::AuthFailed {
                provider: "Tavily".into(),
            },
        };
        assert_eq!(
            err.to_string(),
            "Research for question 'What changed in 2024?' failed: Authentication failed for provider Tavily"
        );
    }

    #[test]
    fn test_error_display_http() {
        let err = ProviderError::Http {
            provider: "Gemini".into(),
            status: 500,
            message: "internal".into(),
        };
        assert_eq!(err.to_string(), "HTTP 500 from Gemini: internal");
    }

    #[test]
    fn test_cancellation_is_distinguished() {
        assert!(ResearchError::Cancelled.is_cancellation());
        assert!(!ResearchError::NoData.is_cancellation());
        assert!(
            !ResearchError::Compilation {
                source: ProviderError::ResponseParse {
                    message: "empty".into()
                }
            }
            .is_cancellation()
        );
    }

    #[test]
    fn test_source_chain() {
        use std::error::Error;
        let err = ResearchError::Compilation {
            source: ProviderError::RateLimited {
                retry_after_secs: 30,
            },
        };
        let source = err.source().map(|s| s.to_string());
        assert_eq!(
            source.as_deref(),
            Some("Rate limited by provider, retry after 30s")
        );
    }
}
