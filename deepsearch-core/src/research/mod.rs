//! Deep research pipeline.
//!
//! One query runs through a fixed sequence of stages:
//! 1. **Plan**: the completion service splits the query into areas and questions
//! 2. **Search**: each question is searched and analysed, one at a time
//! 3. **Analyze**: collected notes are checked for usable data
//! 4. **Compile**: the completion service writes the final report
//! 5. **Finalize**: sources are bounded and the result assembled
//!
//! Progress is throttled through [`ProgressReporter`]; cancellation is
//! cooperative through [`CancellationController`].

pub mod area;
pub mod cancellation;
pub mod decomposition;
pub mod engine;
pub mod progress;
pub mod related;
pub mod report;
pub mod session;

pub use area::AreaResearcher;
pub use cancellation::CancellationController;
pub use decomposition::{PlanGenerator, PlanOutcome};
pub use engine::{ResearchEngine, ResearchHandle};
pub use progress::{CallbackGate, ProgressReporter};
pub use related::RelatedQuestions;
pub use report::ReportCompiler;
pub use session::{
    AreaResult, NoOpResearchCallback, RecordingCallback, ResearchArea, ResearchCallback,
    ResearchDepth, ResearchNote, ResearchOptions, ResearchPlan, ResearchProgress, ResearchResult,
    ResearchStatus, Source,
};
