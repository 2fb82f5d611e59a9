//! Per-area research: one search and one analysis per question, strictly in
//! order.

use super::cancellation::CancellationController;
use super::session::{AreaResult, ResearchArea, ResearchDepth, ResearchNote, Source};
use crate::brain::LlmProvider;
use crate::error::{ProviderError, ResearchError};
use crate::search::SearchProvider;
use crate::types::{Message, SearchHit};
use std::sync::Arc;
use tracing::{debug, warn};

/// Something the orchestrator needs to hear about while an area is running.
#[derive(Debug, Clone, PartialEq)]
pub enum AreaEvent {
    /// A question is about to be searched.
    QuestionStarted {
        index: usize,
        total: usize,
        question: String,
    },
    /// Sources returned by a successful search, in hit order.
    SourcesFound(Vec<Source>),
}

/// Keep the first `max_chars` characters of `content`, appending "..." only
/// when something was cut.
pub fn snippet(content: &str, max_chars: usize) -> String {
    match content.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &content[..cut]),
        None => content.to_string(),
    }
}

/// Build the analysis prompt for one question.
pub fn analysis_prompt(query: &str, question: &str, hits: &[SearchHit]) -> String {
    let results = hits
        .iter()
        .enumerate()
        .map(|(i, hit)| {
            format!(
                "[{}] \"{}\"\nURL: {}\n{}",
                i + 1,
                hit.title,
                hit.url,
                hit.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "Based on the following search results for the question \"{question}\" related to \"{query}\", \
         provide a concise but detailed analysis (about 2 paragraphs) that synthesizes the key information. \
         Focus on factual information, different perspectives, and noteworthy insights.\n\n\
         Search Results:\n{results}"
    )
}

/// Researches the questions of one plan area.
pub struct AreaResearcher {
    llm: Arc<dyn LlmProvider>,
    search: Arc<dyn SearchProvider>,
    snippet_chars: usize,
}

impl AreaResearcher {
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        search: Arc<dyn SearchProvider>,
        snippet_chars: usize,
    ) -> Self {
        Self {
            llm,
            search,
            snippet_chars,
        }
    }

    /// Research every question of `area` in order.
    ///
    /// Every question attempted yields exactly one note; a failing question
    /// becomes an error note and the loop moves on. Only an area without any
    /// question fails with `AreaResearch`. Cancellation is checked before each
    /// question and propagates as `Cancelled`.
    pub async fn research(
        &self,
        query: &str,
        area: &ResearchArea,
        depth: ResearchDepth,
        controller: &CancellationController,
        observer: &mut (dyn FnMut(AreaEvent) + Send),
    ) -> Result<AreaResult, ResearchError> {
        if area.questions.is_empty() {
            return Err(ResearchError::AreaResearch {
                area: area.name.clone(),
                message: "area has no questions".to_string(),
            });
        }

        let total = area.questions.len();
        let mut notes = Vec::with_capacity(total);
        let mut failed = 0usize;

        for (index, question) in area.questions.iter().enumerate() {
            controller.check()?;
            observer(AreaEvent::QuestionStarted {
                index,
                total,
                question: question.clone(),
            });

            match self.research_question(query, question, depth, observer).await {
                Ok(note) => {
                    debug!(
                        area = %area.name,
                        question = %question,
                        sources = note.source_urls.len(),
                        "Question researched"
                    );
                    notes.push(note);
                }
                Err(source) => {
                    let err = ResearchError::QuestionResearch {
                        question: question.clone(),
                        source,
                    };
                    warn!(
                        area = %area.name,
                        question = %question,
                        error = %err,
                        "Question research failed"
                    );
                    notes.push(ResearchNote::failed(question.clone(), &err));
                    failed += 1;
                }
            }
        }

        if failed == total {
            warn!(area = %area.name, "Every question in the area failed");
        }

        Ok(AreaResult {
            area: area.name.clone(),
            notes,
        })
    }

    /// Search, then analyse. Sources are reported as soon as the search
    /// returns, so they count even when the analysis fails.
    async fn research_question(
        &self,
        query: &str,
        question: &str,
        depth: ResearchDepth,
        observer: &mut (dyn FnMut(AreaEvent) + Send),
    ) -> Result<ResearchNote, ProviderError> {
        let (max_results, search_depth) = depth.search_params();
        let search_query = format!("{query} {question}");
        let response = self
            .search
            .search(&search_query, max_results, search_depth)
            .await?;

        let sources: Vec<Source> = response
            .results
            .iter()
            .map(|hit| Source {
                title: hit.title.clone(),
                url: hit.url.clone(),
                snippet: snippet(&hit.content, self.snippet_chars),
            })
            .collect();

        let mut source_urls: Vec<String> = Vec::with_capacity(sources.len());
        for source in &sources {
            if !source_urls.contains(&source.url) {
                source_urls.push(source.url.clone());
            }
        }
        observer(AreaEvent::SourcesFound(sources));

        let prompt = analysis_prompt(query, question, &response.results);
        let analysis = self.llm.complete(vec![Message::user(prompt)]).await?;

        Ok(ResearchNote {
            question: question.to_string(),
            analysis,
            source_urls,
        })
    }
}
