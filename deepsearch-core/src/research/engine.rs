//! Research engine: drives one run through the stage sequence.
//!
//! `Idle -> Planning -> Searching -> Analyzing -> Compiling -> Finalizing -> Complete`,
//! with `Error` reachable from any non-terminal stage. Stages, areas and
//! questions run strictly one after another.

use super::area::{AreaEvent, AreaResearcher};
use super::cancellation::CancellationController;
use super::decomposition::PlanGenerator;
use super::progress::{CallbackGate, ProgressReporter};
use super::report::ReportCompiler;
use super::session::{
    AreaResult, ResearchCallback, ResearchOptions, ResearchProgress, ResearchResult,
    ResearchStatus, Source,
};
use crate::brain::LlmProvider;
use crate::config::ResearchConfig;
use crate::error::ResearchError;
use crate::search::SearchProvider;
use chrono::Utc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{Instrument, error, info, info_span, warn};
use uuid::Uuid;

/// Marks the engine busy for as long as it lives.
struct ActiveRun {
    flag: Arc<AtomicBool>,
}

impl ActiveRun {
    fn acquire(flag: &Arc<AtomicBool>) -> Result<Self, ResearchError> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| ResearchError::AlreadyRunning)?;
        Ok(Self { flag: flag.clone() })
    }
}

impl Drop for ActiveRun {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// The research orchestrator.
///
/// At most one run is active per engine; clones share that restriction,
/// separately constructed engines do not.
#[derive(Clone)]
pub struct ResearchEngine {
    llm: Arc<dyn LlmProvider>,
    search: Arc<dyn SearchProvider>,
    config: ResearchConfig,
    active: Arc<AtomicBool>,
}

impl ResearchEngine {
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        search: Arc<dyn SearchProvider>,
        config: ResearchConfig,
    ) -> Self {
        Self {
            llm,
            search,
            config,
            active: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn config(&self) -> &ResearchConfig {
        &self.config
    }

    /// Options built from the configured defaults.
    pub fn default_options(&self) -> ResearchOptions {
        ResearchOptions {
            depth: self.config.default_depth,
            max_sources: self.config.max_sources,
        }
    }

    /// Whether a run is currently active on this engine.
    pub fn is_running(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Spawn a run on the current tokio runtime and return its handle.
    ///
    /// Fails with `AlreadyRunning`, without touching the active run, when the
    /// engine is busy. Must be called from within a tokio runtime.
    pub fn start(
        &self,
        query: impl Into<String>,
        options: ResearchOptions,
        callback: Arc<dyn ResearchCallback>,
    ) -> Result<ResearchHandle, ResearchError> {
        let guard = ActiveRun::acquire(&self.active)?;
        let run_id = Uuid::new_v4();
        let controller = CancellationController::new();
        let reporter = self.reporter(callback.clone());
        let query = query.into();

        let engine = self.clone();
        let task_controller = controller.clone();
        let task_reporter = reporter.clone();
        let task = tokio::spawn(async move {
            let _guard = guard;
            engine
                .execute(run_id, &query, options, callback, &task_controller, task_reporter)
                .await
        });

        Ok(ResearchHandle {
            run_id,
            controller,
            reporter,
            task,
        })
    }

    /// Run to completion on the current task, cancellable through `controller`.
    pub async fn run(
        &self,
        query: &str,
        options: ResearchOptions,
        callback: Arc<dyn ResearchCallback>,
        controller: CancellationController,
    ) -> Result<ResearchResult, ResearchError> {
        let _guard = ActiveRun::acquire(&self.active)?;
        let reporter = self.reporter(callback.clone());
        self.execute(Uuid::new_v4(), query, options, callback, &controller, reporter)
            .await
    }

    fn reporter(&self, callback: Arc<dyn ResearchCallback>) -> ProgressReporter {
        ProgressReporter::new(
            callback,
            Duration::from_millis(self.config.progress_interval_ms),
            CallbackGate::new(),
        )
    }

    async fn execute(
        &self,
        run_id: Uuid,
        query: &str,
        options: ResearchOptions,
        callback: Arc<dyn ResearchCallback>,
        controller: &CancellationController,
        reporter: ProgressReporter,
    ) -> Result<ResearchResult, ResearchError> {
        let span = info_span!("research", %run_id, depth = ?options.depth);
        async {
            info!(query, max_sources = options.max_sources, "Research started");
            let gate = reporter.gate().clone();
            let mut run = RunState::new(reporter);

            let outcome = self.pipeline(query, options, controller, &mut run).await;
            match outcome {
                Ok(result) => {
                    run.enter(ResearchStatus::Complete, 100, "Research complete");
                    run.finish();
                    info!(
                        sources = result.sources.len(),
                        areas = result.notes.len(),
                        "Research complete"
                    );
                    if gate.is_open() {
                        callback.on_complete(&result);
                    }
                    Ok(result)
                }
                Err(err) => {
                    run.fail(&err);
                    run.finish();
                    if err.is_cancellation() {
                        info!("Research cancelled");
                    } else {
                        error!(error = %err, "Research failed");
                    }
                    if gate.is_open() {
                        callback.on_error(&err);
                    }
                    Err(err)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn pipeline(
        &self,
        query: &str,
        options: ResearchOptions,
        controller: &CancellationController,
        run: &mut RunState,
    ) -> Result<ResearchResult, ResearchError> {
        let started_at = Utc::now();

        controller.check()?;
        run.enter(ResearchStatus::Planning, 5, "Planning research approach");
        let plan = PlanGenerator::new(self.llm.clone())
            .generate(query)
            .await?
            .into_plan();

        controller.check()?;
        let first_step = plan
            .areas
            .first()
            .map(|a| format!("Researching area: {}", a.name))
            .unwrap_or_else(|| "Researching".to_string());
        run.enter(ResearchStatus::Searching, 15, first_step);

        let researcher = AreaResearcher::new(
            self.llm.clone(),
            self.search.clone(),
            self.config.snippet_chars,
        );
        let area_count = plan.areas.len().max(1);
        let mut notes: Vec<AreaResult> = Vec::with_capacity(plan.areas.len());

        for (i, area) in plan.areas.iter().enumerate() {
            controller.check()?;
            run.update(run.percent, format!("Researching area: {}", area.name));

            let outcome = researcher
                .research(query, area, options.depth, controller, &mut |event| {
                    run.observe(event)
                })
                .await;
            match outcome {
                Ok(result) => notes.push(result),
                Err(err) if err.is_cancellation() => return Err(err),
                Err(err) => {
                    warn!(area = %area.name, error = %err, "Area research failed");
                    notes.push(AreaResult::failed(area.name.clone(), &err));
                }
            }

            let percent = (15 + (i + 1) * 50 / area_count).min(65) as u8;
            run.update(percent, run.step.clone());
        }

        ensure_collected(&notes)?;

        controller.check()?;
        run.enter(ResearchStatus::Analyzing, 70, "Analyzing research findings");

        controller.check()?;
        run.enter(ResearchStatus::Compiling, 85, "Compiling comprehensive report");
        let report = ReportCompiler::new(self.llm.clone())
            .compile(query, &plan, &notes)
            .await?;

        controller.check()?;
        run.enter(ResearchStatus::Finalizing, 95, "Finalizing research report");
        let mut sources = run.sources.clone();
        if sources.len() > options.max_sources {
            info!(
                collected = sources.len(),
                kept = options.max_sources,
                "Truncating sources"
            );
            sources.truncate(options.max_sources);
        }
        let result = ResearchResult {
            query: query.to_string(),
            report,
            sources,
            plan,
            notes,
            started_at,
            finished_at: Utc::now(),
        };

        controller.check()?;
        Ok(result)
    }
}

/// `NoData` unless at least one note, error notes included, was collected.
fn ensure_collected(notes: &[AreaResult]) -> Result<(), ResearchError> {
    if notes.iter().all(|area| area.notes.is_empty()) {
        return Err(ResearchError::NoData);
    }
    Ok(())
}

/// Mutable state of one run. Only the orchestrator touches it.
struct RunState {
    status: ResearchStatus,
    percent: u8,
    step: String,
    sources: Vec<Source>,
    reporter: ProgressReporter,
}

impl RunState {
    fn new(reporter: ProgressReporter) -> Self {
        Self {
            status: ResearchStatus::Idle,
            percent: 0,
            step: String::new(),
            sources: Vec::new(),
            reporter,
        }
    }

    fn enter(&mut self, to: ResearchStatus, percent: u8, step: impl Into<String>) {
        debug_assert!(
            self.status.can_transition_to(to),
            "illegal research transition {} -> {}",
            self.status,
            to
        );
        info!(from = %self.status, to = %to, "Research stage");
        self.status = to;
        self.update(percent, step);
    }

    fn update(&mut self, percent: u8, step: impl Into<String>) {
        self.percent = percent.max(self.percent);
        self.step = step.into();
        self.emit();
    }

    fn fail(&mut self, err: &ResearchError) {
        if self.status.is_terminal() {
            return;
        }
        self.status = ResearchStatus::Error;
        self.step = err.to_string();
        self.emit();
    }

    /// Deliver the terminal snapshot now and ignore anything reported later.
    fn finish(&self) {
        self.reporter.flush();
        self.reporter.dispose();
    }

    fn observe(&mut self, event: AreaEvent) {
        match event {
            AreaEvent::QuestionStarted { question, .. } => {
                self.update(self.percent, format!("Researching: {question}"));
            }
            AreaEvent::SourcesFound(found) => {
                self.sources.extend(found);
                self.emit();
            }
        }
    }

    fn emit(&self) {
        self.reporter.report(ResearchProgress {
            status: self.status,
            percent: self.percent,
            current_step: self.step.clone(),
            source_count: self.sources.len(),
        });
    }
}

/// Handle to a spawned run.
///
/// `cancel` asks the run to stop at its next check; `dispose` also silences
/// every further callback for the run and drops any pending progress.
pub struct ResearchHandle {
    run_id: Uuid,
    controller: CancellationController,
    reporter: ProgressReporter,
    task: JoinHandle<Result<ResearchResult, ResearchError>>,
}

impl ResearchHandle {
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn cancel(&self) {
        self.controller.cancel();
    }

    pub fn dispose(&self) {
        self.reporter.gate().mute();
        self.reporter.dispose();
        self.controller.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the run to end.
    pub async fn join(self) -> Result<ResearchResult, ResearchError> {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(_) => Err(ResearchError::Cancelled),
        }
    }
}
