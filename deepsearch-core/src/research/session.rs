//! Research run data model and status state machine.
//!
//! Everything here is plain data: the engine owns the mutable run state and
//! hands callers immutable snapshots of it.

use crate::error::ResearchError;
use crate::types::SearchDepth;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// Status of a research run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResearchStatus {
    Idle,
    Planning,
    Searching,
    Analyzing,
    Compiling,
    Finalizing,
    Complete,
    Error,
}

impl ResearchStatus {
    /// `Complete` and `Error` end a run.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ResearchStatus::Complete | ResearchStatus::Error)
    }

    /// The only status that may follow this one on the success path.
    pub fn next(&self) -> Option<ResearchStatus> {
        match self {
            ResearchStatus::Idle => Some(ResearchStatus::Planning),
            ResearchStatus::Planning => Some(ResearchStatus::Searching),
            ResearchStatus::Searching => Some(ResearchStatus::Analyzing),
            ResearchStatus::Analyzing => Some(ResearchStatus::Compiling),
            ResearchStatus::Compiling => Some(ResearchStatus::Finalizing),
            ResearchStatus::Finalizing => Some(ResearchStatus::Complete),
            ResearchStatus::Complete | ResearchStatus::Error => None,
        }
    }

    /// Whether moving from `self` to `to` is a legal transition.
    pub fn can_transition_to(&self, to: ResearchStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        to == ResearchStatus::Error || self.next() == Some(to)
    }
}

impl std::fmt::Display for ResearchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ResearchStatus::Idle => "idle",
            ResearchStatus::Planning => "planning",
            ResearchStatus::Searching => "searching",
            ResearchStatus::Analyzing => "analyzing",
            ResearchStatus::Compiling => "compiling",
            ResearchStatus::Finalizing => "finalizing",
            ResearchStatus::Complete => "complete",
            ResearchStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// Research depth level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResearchDepth {
    #[default]
    Standard,
    Comprehensive,
    Exhaustive,
}

impl ResearchDepth {
    /// Result count and search depth requested per question.
    pub fn search_params(&self) -> (usize, SearchDepth) {
        match self {
            ResearchDepth::Standard => (5, SearchDepth::Basic),
            ResearchDepth::Comprehensive => (8, SearchDepth::Advanced),
            ResearchDepth::Exhaustive => (12, SearchDepth::Advanced),
        }
    }
}

impl std::str::FromStr for ResearchDepth {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "standard" => Ok(ResearchDepth::Standard),
            "comprehensive" => Ok(ResearchDepth::Comprehensive),
            "exhaustive" => Ok(ResearchDepth::Exhaustive),
            other => Err(format!(
                "unknown research depth '{other}' (expected standard, comprehensive or exhaustive)"
            )),
        }
    }
}

/// Per-run options passed to `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchOptions {
    pub depth: ResearchDepth,
    pub max_sources: usize,
}

impl Default for ResearchOptions {
    fn default() -> Self {
        Self {
            depth: ResearchDepth::Standard,
            max_sources: 10,
        }
    }
}

/// One thematic subdivision of the plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchArea {
    #[serde(alias = "area")]
    pub name: String,
    pub questions: Vec<String>,
}

impl ResearchArea {
    pub fn new(name: impl Into<String>, questions: Vec<String>) -> Self {
        Self {
            name: name.into(),
            questions,
        }
    }
}

/// Ordered research areas, produced once per run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchPlan {
    pub areas: Vec<ResearchArea>,
}

impl ResearchPlan {
    pub fn new(areas: Vec<ResearchArea>) -> Self {
        Self { areas }
    }

    /// A plan is usable when it has at least one area with at least one question.
    pub fn is_valid(&self) -> bool {
        self.areas.iter().any(|a| !a.questions.is_empty())
    }

    pub fn question_count(&self) -> usize {
        self.areas.iter().map(|a| a.questions.len()).sum()
    }
}

/// A single search-result citation gathered during research.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// The synthesized answer (or error placeholder) for one question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchNote {
    pub question: String,
    pub analysis: String,
    pub source_urls: Vec<String>,
}

impl ResearchNote {
    pub fn failed(question: impl Into<String>, error: &ResearchError) -> Self {
        Self {
            question: question.into(),
            analysis: format!(
                "Unable to complete research for this question due to an error: {error}"
            ),
            source_urls: Vec::new(),
        }
    }
}

/// All notes collected for one plan area.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AreaResult {
    pub area: String,
    pub notes: Vec<ResearchNote>,
}

impl AreaResult {
    /// The single-note result recorded when a whole area fails.
    pub fn failed(area: impl Into<String>, error: &ResearchError) -> Self {
        Self {
            area: area.into(),
            notes: vec![ResearchNote {
                question: "Error".to_string(),
                analysis: format!(
                    "Unable to complete research for this area due to an error: {error}"
                ),
                source_urls: Vec::new(),
            }],
        }
    }
}

/// Point-in-time view of a run, delivered to the caller's progress callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchProgress {
    pub status: ResearchStatus,
    /// 0..=100, never decreasing within a run.
    pub percent: u8,
    pub current_step: String,
    pub source_count: usize,
}

/// Final output of a successful run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchResult {
    pub query: String,
    pub report: String,
    /// Sources in discovery order, truncated to the run's `max_sources`.
    pub sources: Vec<Source>,
    pub plan: ResearchPlan,
    pub notes: Vec<AreaResult>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Callback trait for caller-facing research updates.
///
/// `on_complete` and `on_error` are mutually exclusive and each fires at most
/// once per run.
pub trait ResearchCallback: Send + Sync {
    /// Called with throttled progress snapshots.
    fn on_progress(&self, progress: &ResearchProgress);
    /// Called once when the run succeeds.
    fn on_complete(&self, result: &ResearchResult);
    /// Called once when the run fails or is cancelled.
    fn on_error(&self, error: &ResearchError);
}

/// No-op callback.
pub struct NoOpResearchCallback;

impl ResearchCallback for NoOpResearchCallback {
    fn on_progress(&self, _progress: &ResearchProgress) {}
    fn on_complete(&self, _result: &ResearchResult) {}
    fn on_error(&self, _error: &ResearchError) {}
}

/// A callback that records all events for test assertions.
#[derive(Default)]
pub struct RecordingCallback {
    progress: Mutex<Vec<ResearchProgress>>,
    completions: Mutex<Vec<ResearchResult>>,
    errors: Mutex<Vec<ResearchError>>,
}

impl RecordingCallback {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn progress(&self) -> Vec<ResearchProgress> {
        lock(&self.progress).clone()
    }

    pub fn completions(&self) -> Vec<ResearchResult> {
        lock(&self.completions).clone()
    }

    pub fn errors(&self) -> Vec<ResearchError> {
        lock(&self.errors).clone()
    }
}

impl ResearchCallback for RecordingCallback {
    fn on_progress(&self, progress: &ResearchProgress) {
        lock(&self.progress).push(progress.clone());
    }

    fn on_complete(&self, result: &ResearchResult) {
        lock(&self.completions).push(result.clone());
    }

    fn on_error(&self, error: &ResearchError) {
        lock(&self.errors).push(error.clone());
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_success_path() {
        let mut status = ResearchStatus::Idle;
        let mut seen = vec![status];
        while let Some(next) = status.next() {
            assert!(status.can_transition_to(next));
            status = next;
            seen.push(status);
        }
        assert_eq!(status, ResearchStatus::Complete);
        assert_eq!(seen.len(), 7);
    }

    #[test]
    fn test_error_reachable_from_non_terminal() {
        for status in [
            ResearchStatus::Idle,
            ResearchStatus::Planning,
            ResearchStatus::Searching,
            ResearchStatus::Analyzing,
            ResearchStatus::Compiling,
            ResearchStatus::Finalizing,
        ] {
            assert!(status.can_transition_to(ResearchStatus::Error), "{status}");
        }
        assert!(!ResearchStatus::Complete.can_transition_to(ResearchStatus::Error));
        assert!(!ResearchStatus::Error.can_transition_to(ResearchStatus::Planning));
    }

    #[test]
    fn test_no_stage_skipping() {
        assert!(!ResearchStatus::Planning.can_transition_to(ResearchStatus::Compiling));
        assert!(!ResearchStatus::Searching.can_transition_to(ResearchStatus::Planning));
    }

    #[test]
    fn test_depth_search_params() {
        use crate::types::SearchDepth;
        assert_eq!(
            ResearchDepth::Standard.search_params(),
            (5, SearchDepth::Basic)
        );
        assert_eq!(
            ResearchDepth::Comprehensive.search_params(),
            (8, SearchDepth::Advanced)
        );
        assert_eq!(
            ResearchDepth::Exhaustive.search_params(),
            (12, SearchDepth::Advanced)
        );
    }

    #[test]
    fn test_depth_from_str() {
        assert_eq!(
            "Comprehensive".parse::<ResearchDepth>().unwrap(),
            ResearchDepth::Comprehensive
        );
        assert!("deep".parse::<ResearchDepth>().is_err());
    }

    #[test]
    fn test_plan_validity() {
        assert!(!ResearchPlan::new(vec![]).is_valid());
        assert!(!ResearchPlan::new(vec![ResearchArea::new("Empty", vec![])]).is_valid());
        let plan = ResearchPlan::new(vec![ResearchArea::new("A", vec!["q".into()])]);
        assert!(plan.is_valid());
        assert_eq!(plan.question_count(), 1);
    }

    #[test]
    fn test_failed_area_has_single_note() {
        let result = AreaResult::failed(
            "History",
            &ResearchError::AreaResearch {
                area: "History".into(),
                message: "search unavailable".into(),
            },
        );
        assert_eq!(result.notes.len(), 1);
        assert!(result.notes[0].analysis.contains("search unavailable"));
        assert!(result.notes[0].source_urls.is_empty());
    }

    #[test]
    fn test_area_deserializes_from_model_json() {
        let area: ResearchArea =
            serde_json::from_str(r#"{"area":"Background","questions":["Why?"]}"#).unwrap();
        assert_eq!(area.name, "Background");
    }
}
