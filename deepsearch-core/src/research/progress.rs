//! Throttled progress emission.
//!
//! The engine reports every stage/step change; the reporter forwards at most
//! one snapshot per interval to the caller. Updates arriving inside a window
//! collapse into the most recent one, which is delivered when the window
//! elapses. A single pending timer exists at any time.

use super::session::{ResearchCallback, ResearchProgress};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::trace;

/// Shared switch that silences every callback of a run once closed.
#[derive(Debug, Clone, Default)]
pub struct CallbackGate {
    muted: Arc<AtomicBool>,
}

impl CallbackGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mute(&self) {
        self.muted.store(true, Ordering::SeqCst);
    }

    pub fn is_open(&self) -> bool {
        !self.muted.load(Ordering::SeqCst)
    }
}

struct ReporterState {
    pending: Option<(u64, ResearchProgress)>,
    timer: Option<JoinHandle<()>>,
    last_submitted: Option<ResearchProgress>,
    high_water: u8,
    seq: u64,
    disposed: bool,
}

struct Shared {
    callback: Arc<dyn ResearchCallback>,
    gate: CallbackGate,
    state: Mutex<ReporterState>,
    /// Sequence number of the newest snapshot handed to the callback.
    delivered: Mutex<u64>,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, ReporterState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Hand a snapshot to the callback unless a newer one already went out.
    fn deliver(&self, seq: u64, progress: ResearchProgress) {
        let mut delivered = self.delivered.lock().unwrap_or_else(|e| e.into_inner());
        if seq <= *delivered || !self.gate.is_open() {
            return;
        }
        *delivered = seq;
        trace!(
            status = %progress.status,
            percent = progress.percent,
            sources = progress.source_count,
            "Emitting research progress"
        );
        self.callback.on_progress(&progress);
    }
}

/// Forwards run progress to a [`ResearchCallback`] with throttling.
///
/// Clones share the same pending snapshot and timer.
#[derive(Clone)]
pub struct ProgressReporter {
    shared: Arc<Shared>,
    interval: Duration,
}

impl ProgressReporter {
    pub fn new(
        callback: Arc<dyn ResearchCallback>,
        interval: Duration,
        gate: CallbackGate,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                callback,
                gate,
                state: Mutex::new(ReporterState {
                    pending: None,
                    timer: None,
                    last_submitted: None,
                    high_water: 0,
                    seq: 0,
                    disposed: false,
                }),
                delivered: Mutex::new(0),
            }),
            interval,
        }
    }

    /// Submit a snapshot. Never blocks on the callback.
    ///
    /// Percent is clamped so emitted values never decrease; a snapshot equal to
    /// the previous submission is ignored.
    pub fn report(&self, mut progress: ResearchProgress) {
        let mut state = self.shared.state();
        if state.disposed {
            return;
        }
        progress.percent = progress.percent.min(100).max(state.high_water);
        if state.last_submitted.as_ref() == Some(&progress) {
            return;
        }
        state.high_water = progress.percent;
        state.last_submitted = Some(progress.clone());
        state.seq += 1;
        let seq = state.seq;
        state.pending = Some((seq, progress));

        if state.timer.is_some() {
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let shared = self.shared.clone();
                let interval = self.interval;
                state.timer = Some(handle.spawn(async move {
                    tokio::time::sleep(interval).await;
                    let pending = {
                        let mut state = shared.state();
                        state.timer = None;
                        state.pending.take()
                    };
                    if let Some((seq, progress)) = pending {
                        shared.deliver(seq, progress);
                    }
                }));
            }
            Err(_) => {
                // No runtime to schedule on: emit immediately.
                let pending = state.pending.take();
                drop(state);
                if let Some((seq, progress)) = pending {
                    self.shared.deliver(seq, progress);
                }
            }
        }
    }

    /// Cancel the pending timer and deliver the latest snapshot right away.
    pub fn flush(&self) {
        let pending = {
            let mut state = self.shared.state();
            if let Some(timer) = state.timer.take() {
                timer.abort();
            }
            state.pending.take()
        };
        if let Some((seq, progress)) = pending {
            self.shared.deliver(seq, progress);
        }
    }

    /// Cancel the pending timer and drop any undelivered snapshot. Later
    /// reports are ignored.
    pub fn dispose(&self) {
        let mut state = self.shared.state();
        state.disposed = true;
        state.pending = None;
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.shared.state().disposed
    }

    pub fn gate(&self) -> &CallbackGate {
        &self.shared.gate
    }
}
