//! Property-based tests for plan parsing, snippets and progress throttling.

use proptest::prelude::*;

use deepsearch_core::research::area::snippet;
use deepsearch_core::research::decomposition::{PlanOutcome, default_plan, parse_plan};
use deepsearch_core::research::{
    CallbackGate, ProgressReporter, RecordingCallback, ResearchProgress, ResearchStatus,
};
use std::sync::Arc;
use std::time::Duration;

// --- Plan parsing properties ---

proptest! {
    #[test]
    fn parse_plan_never_panics_and_is_valid(text in ".{0,400}") {
        let outcome = parse_plan(&text);
        prop_assert!(outcome.plan().is_valid());
    }

    #[test]
    fn parse_plan_of_prose_is_default(text in "[a-zA-Z ,.!?]{0,200}") {
        prop_assert_eq!(parse_plan(&text), PlanOutcome::Default(default_plan()));
    }

    #[test]
    fn parse_plan_recovers_generated_plans(
        areas in prop::collection::vec(
            ("[A-Za-z][A-Za-z ]{0,20}", prop::collection::vec("[A-Za-z][A-Za-z ?]{0,30}", 1..4)),
            1..5,
        ),
        wrap in any::<bool>(),
    ) {
        let json = serde_json::to_string(
            &areas
                .iter()
                .map(|(name, questions)| serde_json::json!({"area": name, "questions": questions}))
                .collect::<Vec<_>>(),
        )
        .unwrap();
        let text = if wrap {
            format!("Plan:\n```json\n{json}\n```\n")
        } else {
            format!("Plan: {json} end")
        };

        let outcome = parse_plan(&text);
        prop_assert_ne!(outcome.kind(), "default");
        let plan = outcome.into_plan();
        prop_assert_eq!(plan.areas.len(), areas.len());
        for (area, (name, questions)) in plan.areas.iter().zip(&areas) {
            prop_assert_eq!(&area.name, name.trim());
            let kept = questions.iter().filter(|q| !q.trim().is_empty()).count();
            prop_assert_eq!(area.questions.len(), kept);
        }
    }
}

// --- Snippet properties ---

proptest! {
    #[test]
    fn snippet_is_bounded(content in ".{0,300}", max in 0usize..200) {
        let cut = snippet(&content, max);
        let chars = cut.chars().count();
        if content.chars().count() > max {
            prop_assert_eq!(chars, max + 3);
            prop_assert!(cut.ends_with("..."));
        } else {
            prop_assert_eq!(cut, content);
        }
    }
}

// --- Progress properties ---

proptest! {
    #[test]
    fn emitted_percent_never_decreases(percents in prop::collection::vec(0u8..=120, 1..40)) {
        let callback = Arc::new(RecordingCallback::new());
        // Outside a runtime every accepted report is delivered immediately.
        let reporter = ProgressReporter::new(
            callback.clone(),
            Duration::from_millis(300),
            CallbackGate::new(),
        );
        for (i, percent) in percents.iter().enumerate() {
            reporter.report(ResearchProgress {
                status: ResearchStatus::Searching,
                percent: *percent,
                current_step: format!("step {i}"),
                source_count: i,
            });
        }

        let delivered: Vec<u8> = callback.progress().iter().map(|p| p.percent).collect();
        prop_assert_eq!(delivered.len(), percents.len());
        prop_assert!(delivered.windows(2).all(|w| w[0] <= w[1]));
        prop_assert!(delivered.iter().all(|p| *p <= 100));
    }
}
