//! Configuration system for deepsearch.
//!
//! Uses `figment` for layered configuration: defaults -> user file -> workspace
//! file -> explicit file -> environment -> CLI overrides.
//! Configuration is loaded from `~/.config/deepsearch/config.toml` and/or
//! `.deepsearch/config.toml` in the workspace directory.

use crate::error::ConfigError;
use crate::research::session::ResearchDepth;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeepsearchConfig {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub research: ResearchConfig,
}

/// Completion service configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name: "gemini" or "mock".
    pub provider: String,
    /// Model identifier sent to the provider.
    pub model: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    /// API key given directly; takes precedence over `api_key_env`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Override for the provider base URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    pub temperature: f64,
    pub max_output_tokens: u32,
    /// Request timeout. The pipeline itself has no timeout of its own.
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            model: "gemini-1.5-flash".to_string(),
            api_key_env: "GOOGLE_API_KEY".to_string(),
            api_key: None,
            base_url: None,
            temperature: 0.7,
            max_output_tokens: 8192,
            timeout_secs: 120,
        }
    }
}

/// Search service configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Provider name: "tavily", "serper" or "mock".
    pub provider: String,
    /// Environment variable holding the API key. When unset the provider's
    /// conventional variable is used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Override for the provider endpoint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    pub timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            provider: "tavily".to_string(),
            api_key_env: None,
            api_key: None,
            endpoint: None,
            timeout_secs: 30,
        }
    }
}

impl SearchConfig {
    /// The environment variable the API key is read from.
    pub fn key_env(&self) -> String {
        if let Some(var) = &self.api_key_env {
            return var.clone();
        }
        match self.provider.as_str() {
            "serper" => "SERPER_API_KEY".to_string(),
            _ => "TAVILY_API_KEY".to_string(),
        }
    }
}

/// Research pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResearchConfig {
    pub default_depth: ResearchDepth,
    /// Upper bound on sources in the final result.
    pub max_sources: usize,
    /// Minimum spacing between two progress emissions.
    pub progress_interval_ms: u64,
    /// Characters of hit content kept as a source snippet.
    pub snippet_chars: usize,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            default_depth: ResearchDepth::Standard,
            max_sources: 10,
            progress_interval_ms: 300,
            snippet_chars: 150,
        }
    }
}

const LLM_PROVIDERS: &[&str] = &["gemini", "mock"];
const SEARCH_PROVIDERS: &[&str] = &["tavily", "serper", "mock"];

impl DeepsearchConfig {
    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !LLM_PROVIDERS.contains(&self.llm.provider.as_str()) {
            return Err(ConfigError::Invalid {
                message: format!(
                    "unknown llm provider '{}' (expected one of: {})",
                    self.llm.provider,
                    LLM_PROVIDERS.join(", ")
                ),
            });
        }
        if !SEARCH_PROVIDERS.contains(&self.search.provider.as_str()) {
            return Err(ConfigError::Invalid {
                message: format!(
                    "unknown search provider '{}' (expected one of: {})",
                    self.search.provider,
                    SEARCH_PROVIDERS.join(", ")
                ),
            });
        }
        if self.research.progress_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                message: "research.progress_interval_ms must be greater than zero".into(),
            });
        }
        Ok(())
    }
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Explicit overrides (passed as argument)
/// 2. Environment variables (prefixed with `DEEPSEARCH_`)
/// 3. Explicit config file (`--config`)
/// 4. Workspace-local config (`.deepsearch/config.toml`)
/// 5. User config (`~/.config/deepsearch/config.toml`)
/// 6. Built-in defaults
pub fn load_config(
    workspace: Option<&Path>,
    explicit_file: Option<&Path>,
    overrides: Option<&DeepsearchConfig>,
) -> Result<DeepsearchConfig, ConfigError> {
    let mut figment = Figment::from(Serialized::defaults(DeepsearchConfig::default()));

    if let Some(config_dir) = directories::ProjectDirs::from("dev", "deepsearch", "deepsearch") {
        let user_config = config_dir.config_dir().join("config.toml");
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    if let Some(ws) = workspace {
        let ws_config = ws.join(".deepsearch").join("config.toml");
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    if let Some(path) = explicit_file {
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        figment = figment.merge(Toml::file(path));
    }

    // DEEPSEARCH_LLM__MODEL, DEEPSEARCH_RESEARCH__MAX_SOURCES, ...
    figment = figment.merge(Env::prefixed("DEEPSEARCH_").split("__"));

    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }

    let config: DeepsearchConfig = figment.extract().map_err(Box::new)?;
    config.validate()?;
    Ok(config)
}

/// Check whether a deepsearch configuration file exists (user-level or workspace-level).
pub fn config_exists(workspace: Option<&Path>) -> bool {
    if let Some(config_dir) = directories::ProjectDirs::from("dev", "deepsearch", "deepsearch") {
        if config_dir.config_dir().join("config.toml").exists() {
            return true;
        }
    }

    if let Some(ws) = workspace {
        if ws.join(".deepsearch").join("config.toml").exists() {
            return true;
        }
    }

    false
}

/// Render a configuration as TOML.
pub fn to_toml(config: &DeepsearchConfig) -> Result<String, ConfigError> {
    toml::to_string_pretty(config).map_err(|e| ConfigError::Invalid {
        message: format!("failed to serialize configuration: {e}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults_are_valid() {
        let config = DeepsearchConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.research.max_sources, 10);
        assert_eq!(config.research.progress_interval_ms, 300);
        assert_eq!(config.research.snippet_chars, 150);
        assert_eq!(config.llm.model, "gemini-1.5-flash");
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let mut config = DeepsearchConfig::default();
        config.search.provider = "bing".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("bing"));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let mut config = DeepsearchConfig::default();
        config.research.progress_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_search_key_env_follows_provider() {
        let mut search = SearchConfig::default();
        assert_eq!(search.key_env(), "TAVILY_API_KEY");
        search.provider = "serper".into();
        assert_eq!(search.key_env(), "SERPER_API_KEY");
        search.api_key_env = Some("MY_KEY".into());
        assert_eq!(search.key_env(), "MY_KEY");
    }

    #[test]
    fn test_workspace_file_layering() {
        let dir = tempfile::tempdir().unwrap();
        let cfg_dir = dir.path().join(".deepsearch");
        std::fs::create_dir_all(&cfg_dir).unwrap();
        std::fs::write(
            cfg_dir.join("config.toml"),
            "[research]\nmax_sources = 15\ndefault_depth = \"exhaustive\"\n\n[search]\nprovider = \"serper\"\n",
        )
        .unwrap();

        let config = load_config(Some(dir.path()), None, None).unwrap();
        assert_eq!(config.research.max_sources, 15);
        assert_eq!(config.research.default_depth, ResearchDepth::Exhaustive);
        assert_eq!(config.search.provider, "serper");
        // Untouched fields keep their defaults.
        assert_eq!(config.research.snippet_chars, 150);
    }

    #[test]
    fn test_config_exists_finds_workspace_file() {
        let dir = tempfile::tempdir().unwrap();
        let cfg_dir = dir.path().join(".deepsearch");
        std::fs::create_dir_all(&cfg_dir).unwrap();
        std::fs::write(cfg_dir.join("config.toml"), "[research]\nmax_sources = 4\n").unwrap();
        assert!(config_exists(Some(dir.path())));
    }

    #[test]
    fn test_explicit_file_beats_workspace() {
        let dir = tempfile::tempdir().unwrap();
        let cfg_dir = dir.path().join(".deepsearch");
        std::fs::create_dir_all(&cfg_dir).unwrap();
        std::fs::write(cfg_dir.join("config.toml"), "[research]\nmax_sources = 15\n").unwrap();
        let explicit = dir.path().join("custom.toml");
        std::fs::write(&explicit, "[research]\nmax_sources = 5\n").unwrap();

        let config = load_config(Some(dir.path()), Some(&explicit), None).unwrap();
        assert_eq!(config.research.max_sources, 5);
    }

    #[test]
    fn test_missing_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        let err = load_config(None, Some(&missing), None).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound { .. }));
    }

    #[test]
    fn test_overrides_win() {
        let mut overrides = DeepsearchConfig::default();
        overrides.llm.provider = "mock".into();
        overrides.search.provider = "mock".into();
        let config = load_config(None, None, Some(&overrides)).unwrap();
        assert_eq!(config.llm.provider, "mock");
        assert_eq!(config.search.provider, "mock");
    }

    #[test]
    fn test_toml_round_trip() {
        let config = DeepsearchConfig::default();
        let rendered = to_toml(&config).unwrap();
        assert!(rendered.contains("[research]"));
        let parsed: DeepsearchConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed, config);
    }
}
