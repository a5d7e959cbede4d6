use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum ProgressPhase {
    Submitting,
    Collecting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressEvent {
    pub phase: ProgressPhase,
    pub done: u64,
    pub total: u64,
}

impl ProgressEvent {
    /// Completion in percent (0..=100).
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.done as f64 / self.total as f64) * 100.0
    }
}

pub type ProgressFn = Arc<dyn Fn(ProgressEvent) + Send + Sync + 'static>;

/// Submission and collection counters of a run.
///
/// Both counters only move forward. Every change is forwarded to the sink on the caller's
/// path, so sinks must stay cheap and never block.
pub struct ProgressTracker {
    total: u64,
    submitted: AtomicU64,
    completed: AtomicU64,
    sink: Option<ProgressFn>,
}

impl ProgressTracker {
    pub fn new(total: u64, sink: Option<ProgressFn>) -> Self {
        Self {
            total,
            submitted: AtomicU64::new(0),
            completed: AtomicU64::new(0),
            sink,
        }
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }

    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    pub fn on_submitted(&self) -> u64 {
        let done = self.submitted.fetch_add(1, Ordering::Relaxed).saturating_add(1);
        self.emit(ProgressPhase::Submitting, done);
        done
    }

    pub fn on_completed(&self) -> u64 {
        let done = self.completed.fetch_add(1, Ordering::Relaxed).saturating_add(1);
        self.emit(ProgressPhase::Collecting, done);
        done
    }

    fn emit(&self, phase: ProgressPhase, done: u64) {
        if let Some(sink) = &self.sink {
            (sink)(ProgressEvent {
                phase,
                done: done.min(self.total),
                total: self.total,
            });
        }
    }
}

impl std::fmt::Debug for ProgressTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressTracker")
            .field("total", &self.total)
            .field("submitted", &self.submitted())
            .field("completed", &self.completed())
            .finish_non_exhaustive()
    }
}
