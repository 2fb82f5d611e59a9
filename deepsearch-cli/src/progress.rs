//! Terminal rendering of research progress.

use deepsearch_core::{ResearchCallback, ResearchError, ResearchProgress, ResearchResult};
use std::io::Write;

/// Prints each progress snapshot as one stderr line.
pub struct TerminalProgress {
    quiet: bool,
}

impl TerminalProgress {
    pub fn new(quiet: bool) -> Self {
        Self { quiet }
    }
}

pub(crate) fn format_progress(progress: &ResearchProgress) -> String {
    let sources = match progress.source_count {
        0 => String::new(),
        1 => " (1 source)".to_string(),
        n => format!(" ({n} sources)"),
    };
    format!(
        "[{:>3}%] {}{}",
        progress.percent, progress.current_step, sources
    )
}

impl ResearchCallback for TerminalProgress {
    fn on_progress(&self, progress: &ResearchProgress) {
        if self.quiet {
            return;
        }
        let mut stderr = std::io::stderr().lock();
        let _ = writeln!(stderr, "{}", format_progress(progress));
    }

    fn on_complete(&self, _result: &ResearchResult) {}

    // Failures are reported by `main` once the run returns.
    fn on_error(&self, _error: &ResearchError) {}
}
