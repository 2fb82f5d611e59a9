//! Research plan generation.
//!
//! Asks the completion service to break a query into 3-5 areas with questions
//! and parses the reply. Parsing never fails: a reply without a usable JSON
//! array yields the fixed default plan.

use super::session::{ResearchArea, ResearchPlan};
use crate::brain::LlmProvider;
use crate::error::ResearchError;
use crate::types::Message;
use regex::Regex;
use serde_json::Value;
use std::sync::{Arc, LazyLock};
use tracing::{debug, info, warn};

static FENCED_JSON: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```(?:json|JSON)?[ \t]*\r?\n(.*?)\r?\n?```").expect("valid fenced-json regex")
});

static OBJECT_ARRAY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\[\s*\{.*\}\s*\]").expect("valid array regex"));

/// How a plan was obtained from the model reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanOutcome {
    /// Parsed from a fenced JSON block.
    Parsed(ResearchPlan),
    /// Recovered from the first bracketed array in free text.
    Recovered(ResearchPlan),
    /// Nothing usable in the reply; the default plan.
    Default(ResearchPlan),
}

impl PlanOutcome {
    pub fn plan(&self) -> &ResearchPlan {
        match self {
            PlanOutcome::Parsed(p) | PlanOutcome::Recovered(p) | PlanOutcome::Default(p) => p,
        }
    }

    pub fn into_plan(self) -> ResearchPlan {
        match self {
            PlanOutcome::Parsed(p) | PlanOutcome::Recovered(p) | PlanOutcome::Default(p) => p,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            PlanOutcome::Parsed(_) => "parsed",
            PlanOutcome::Recovered(_) => "recovered",
            PlanOutcome::Default(_) => "default",
        }
    }
}

/// The plan used when the model reply cannot be parsed.
pub fn default_plan() -> ResearchPlan {
    ResearchPlan::new(vec![
        ResearchArea::new(
            "Main Research",
            vec![
                "What are the key aspects of this topic?".to_string(),
                "What are the recent developments?".to_string(),
            ],
        ),
        ResearchArea::new(
            "Detailed Analysis",
            vec![
                "What are the different perspectives on this topic?".to_string(),
                "What are the implications?".to_string(),
            ],
        ),
    ])
}

/// Build the planning prompt for a query.
pub fn plan_prompt(query: &str) -> String {
    format!(
        "I need to conduct deep research on the following topic: \"{query}\".\n\
         Please create a detailed research plan with 3-5 main areas to investigate.\n\
         For each area, suggest specific questions to answer or aspects to explore.\n\
         Format the response as a JSON array with objects containing 'area' and 'questions' (array) properties."
    )
}

/// Parse a model reply into a plan, trying the fenced block, then the first
/// bracketed array, then falling back to [`default_plan`].
pub fn parse_plan(response: &str) -> PlanOutcome {
    if let Some(body) = FENCED_JSON.captures(response).and_then(|c| c.get(1)) {
        if let Some(plan) = plan_from_json(body.as_str()) {
            return PlanOutcome::Parsed(plan);
        }
        debug!("Fenced block did not contain a usable plan");
    }

    if let Some(array) = OBJECT_ARRAY.find(response) {
        if let Some(plan) = plan_from_json(array.as_str()) {
            return PlanOutcome::Recovered(plan);
        }
        debug!("Bracketed array did not contain a usable plan");
    }

    PlanOutcome::Default(default_plan())
}

/// Interpret JSON text as a plan. Areas without a name or without questions
/// are dropped; `None` when nothing usable remains.
fn plan_from_json(text: &str) -> Option<ResearchPlan> {
    let value: Value = serde_json::from_str(text.trim()).ok()?;
    let items = match &value {
        Value::Array(items) => items,
        Value::Object(map) => map
            .get("areas")
            .or_else(|| map.get("plan"))
            .and_then(Value::as_array)?,
        _ => return None,
    };

    let areas: Vec<ResearchArea> = items.iter().filter_map(area_from_value).collect();
    let plan = ResearchPlan::new(areas);
    plan.is_valid().then_some(plan)
}

fn area_from_value(value: &Value) -> Option<ResearchArea> {
    let obj = value.as_object()?;
    let name = obj
        .get("area")
        .or_else(|| obj.get("name"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())?;

    let questions: Vec<String> = obj
        .get("questions")
        .and_then(Value::as_array)
        .map(|qs| {
            qs.iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|q| !q.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    if questions.is_empty() {
        return None;
    }
    Some(ResearchArea::new(name, questions))
}

/// Turns a query into a research plan via the completion service.
pub struct PlanGenerator {
    llm: Arc<dyn LlmProvider>,
}

impl PlanGenerator {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }

    /// Generate a plan. Fails only when the completion call itself fails.
    pub async fn generate(&self, query: &str) -> Result<PlanOutcome, ResearchError> {
        let response = self
            .llm
            .complete(vec![Message::user(plan_prompt(query))])
            .await
            .map_err(|source| ResearchError::PlanGeneration { source })?;

        let outcome = parse_plan(&response);
        if let PlanOutcome::Default(_) = outcome {
            warn!("Could not parse research plan from model reply, using default plan");
        }
        info!(
            outcome = outcome.kind(),
            areas = outcome.plan().areas.len(),
            questions = outcome.plan().question_count(),
            "Research plan ready"
        );
        Ok(outcome)
    }
}
