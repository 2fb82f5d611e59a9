//! # Deepsearch Core
//!
//! Core library for the deepsearch research pipeline.
//! Provides the research orchestrator, the completion (brain) and search
//! collaborator interfaces with concrete providers, configuration, and
//! fundamental types.

pub mod brain;
pub mod config;
pub mod error;
pub mod providers;
pub mod research;
pub mod search;
pub mod types;

// Re-export commonly used types at the crate root.
pub use brain::{LlmProvider, MockLlmProvider};
pub use config::{DeepsearchConfig, LlmConfig, ResearchConfig, SearchConfig, load_config};
pub use error::{ConfigError, ProviderError, ResearchError, Result};
pub use providers::{create_llm_provider, create_search_provider};
pub use research::{
    AreaResult, CancellationController, NoOpResearchCallback, RecordingCallback,
    RelatedQuestions, ResearchCallback, ResearchDepth, ResearchEngine, ResearchHandle,
    ResearchNote, ResearchOptions, ResearchPlan, ResearchProgress, ResearchResult, ResearchStatus,
    Source,
};
pub use search::{MockSearchProvider, SearchProvider};
pub use types::{Message, Role, SearchDepth, SearchHit, SearchResponse};
