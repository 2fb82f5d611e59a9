//! Cooperative cancellation for research runs.

use crate::error::ResearchError;
use tokio_util::sync::CancellationToken;

/// Wraps a single cancel signal for one run.
///
/// Checked at every stage entry and before every area and question. A
/// collaborator call already in flight is never interrupted; the first check
/// after it returns observes the cancellation.
#[derive(Debug, Clone, Default)]
pub struct CancellationController {
    token: CancellationToken,
}

impl CancellationController {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        if !self.token.is_cancelled() {
            tracing::debug!("Research cancellation requested");
        }
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Suspension-point check: `Err(Cancelled)` once `cancel` has been called.
    pub fn check(&self) -> Result<(), ResearchError> {
        if self.token.is_cancelled() {
            Err(ResearchError::Cancelled)
        } else {
            Ok(())
        }
    }
}
