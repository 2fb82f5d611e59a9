//! Follow-up question suggestions for a query.

use crate::brain::LlmProvider;
use crate::types::Message;
use regex::Regex;
use std::sync::{Arc, LazyLock};
use tracing::warn;

static NUMBERED_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\d+\.\s+(.+)$").expect("valid numbered-line regex"));

const MAX_RELATED: usize = 3;

/// Extract up to three `N. text` lines from a model reply.
pub fn parse_related(response: &str) -> Vec<String> {
    response
        .lines()
        .filter_map(|line| NUMBERED_LINE.captures(line))
        .filter_map(|c| c.get(1).map(|m| m.as_str().trim().to_string()))
        .filter(|q| !q.is_empty())
        .take(MAX_RELATED)
        .collect()
}

/// Suggests follow-up questions. Never fails: errors yield an empty list.
pub struct RelatedQuestions {
    llm: Arc<dyn LlmProvider>,
}

impl RelatedQuestions {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }

    pub async fn generate(&self, query: &str) -> Vec<String> {
        let prompt = format!(
            "Based on the user's search query: \"{query}\", generate 3 related follow-up questions \
             that they might be interested in. Return only the questions as a numbered list without any additional text."
        );
        match self.llm.complete(vec![Message::user(prompt)]).await {
            Ok(text) => parse_related(&text),
            Err(e) => {
                warn!(error = %e, "Failed to generate related questions");
                Vec::new()
            }
        }
    }
}
