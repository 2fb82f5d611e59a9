//! Report compilation: one completion call over the plan and every note.

use super::session::{AreaResult, ResearchPlan};
use crate::brain::LlmProvider;
use crate::error::ResearchError;
use crate::types::Message;
use std::sync::Arc;
use tracing::info;

/// Build the compilation prompt.
pub fn compile_prompt(query: &str, plan: &ResearchPlan, notes: &[AreaResult]) -> String {
    // Both types are plain data; serialization cannot fail.
    let plan_json = serde_json::to_string_pretty(plan).unwrap_or_default();
    let notes_json = serde_json::to_string_pretty(notes).unwrap_or_default();

    format!(
        "I've conducted deep research on \"{query}\" and gathered the following notes. \
         Please compile a comprehensive, well-structured research report based on these notes.\n\n\
         The report should include:\n\
         1. An executive summary\n\
         2. An introduction to the topic\n\
         3. Sections for each research area with detailed findings\n\
         4. A conclusion\n\
         5. Suggestions for further research\n\n\
         Use markdown formatting for headings and structure.\n\n\
         Research Plan:\n{plan_json}\n\n\
         Research Notes:\n{notes_json}"
    )
}

/// Turns the collected notes into the final markdown report.
pub struct ReportCompiler {
    llm: Arc<dyn LlmProvider>,
}

impl ReportCompiler {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }

    pub async fn compile(
        &self,
        query: &str,
        plan: &ResearchPlan,
        notes: &[AreaResult],
    ) -> Result<String, ResearchError> {
        let prompt = compile_prompt(query, plan, notes);
        let report = self
            .llm
            .complete(vec![Message::user(prompt)])
            .await
            .map_err(|source| ResearchError::Compilation { source })?;

        info!(chars = report.len(), "Research report compiled");
        Ok(report)
    }
}
