use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::time::Duration;

use super::probe::JobOutcome;
use super::query::ErrorKind;

/// Aggregate state of a run.
///
/// `succeeded + failed == completed <= submitted` holds for every snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunStats {
    pub submitted: u64,
    pub completed: u64,
    pub succeeded: u64,
    pub failed: u64,
    /// Latencies of successful jobs, in arrival order.
    pub latencies_ms: Vec<f64>,
    pub failures_by_kind: BTreeMap<ErrorKind, u64>,
    /// Admissions per unix second.
    pub per_second: BTreeMap<i64, u64>,
}

impl RunStats {
    pub fn in_flight(&self) -> u64 {
        self.submitted.saturating_sub(self.completed)
    }
}

/// Owns [`RunStats`]; every mutation goes through one lock.
#[derive(Debug, Default)]
pub struct StatsAggregator {
    inner: Mutex<RunStats>,
}

impl StatsAggregator {
    fn lock(&self) -> MutexGuard<'_, RunStats> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn record_submitted(&self, unix_second: i64) {
        let mut stats = self.lock();
        stats.submitted = stats.submitted.saturating_add(1);
        *stats.per_second.entry(unix_second).or_insert(0) += 1;
    }

    pub fn record(&self, outcome: &JobOutcome) {
        let mut stats = self.lock();
        stats.completed = stats.completed.saturating_add(1);
        match outcome {
            JobOutcome::Success { latency_ms, .. } => {
                stats.succeeded = stats.succeeded.saturating_add(1);
                stats.latencies_ms.push(*latency_ms);
            }
            JobOutcome::Failure { error, .. } => {
                stats.failed = stats.failed.saturating_add(1);
                *stats.failures_by_kind.entry(error.kind).or_insert(0) += 1;
            }
        }
    }

    pub fn snapshot(&self) -> RunStats {
        self.lock().clone()
    }

    pub fn finalize(&self, planned: u64, end: RunEnd, elapsed: Duration) -> RunReport {
        RunReport::from_stats(self.snapshot(), planned, end, elapsed)
    }
}

/// Nearest-rank percentile of an ascending slice: index `ceil(pct/100 * n) - 1`.
///
/// `pct` is resolved to basis points so that e.g. 99% of 100 samples is exactly rank 99.
pub fn percentile(sorted: &[f64], pct: f64) -> Option<f64> {
    let n = sorted.len() as u64;
    if n == 0 {
        return None;
    }

    let bps = (pct.clamp(0.0, 100.0) * 100.0).round() as u64;
    let rank = (n * bps).div_ceil(10_000);
    let idx = rank.saturating_sub(1).min(n - 1) as usize;
    sorted.get(idx).copied()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum RunEnd {
    Completed,
    /// Stopped by an interrupt; the report covers finished jobs only.
    Interrupted,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub end: RunEnd,
    /// Jobs requested by the configuration.
    pub planned: u64,
    /// Jobs admitted.
    pub total: u64,
    pub completed: u64,
    /// Admitted jobs that never reported back.
    pub unaccounted: u64,
    pub succeeded: u64,
    pub failed: u64,
    /// Percent of completed jobs that succeeded.
    pub success_rate: f64,
    pub avg_ms: Option<f64>,
    pub min_ms: Option<f64>,
    pub max_ms: Option<f64>,
    pub p50_ms: Option<f64>,
    pub p90_ms: Option<f64>,
    pub p95_ms: Option<f64>,
    pub p99_ms: Option<f64>,
    pub failures_by_kind: BTreeMap<ErrorKind, u64>,
    pub per_second: BTreeMap<i64, u64>,
    pub elapsed: Duration,
}

impl RunReport {
    pub fn from_stats(stats: RunStats, planned: u64, end: RunEnd, elapsed: Duration) -> Self {
        let RunStats {
            submitted,
            completed,
            succeeded,
            failed,
            mut latencies_ms,
            failures_by_kind,
            per_second,
        } = stats;

        latencies_ms.sort_by(f64::total_cmp);
        let avg_ms = (!latencies_ms.is_empty())
            .then(|| latencies_ms.iter().sum::<f64>() / latencies_ms.len() as f64);

        let success_rate = if completed == 0 {
            0.0
        } else {
            (succeeded as f64 / completed as f64) * 100.0
        };

        Self {
            end,
            planned,
            total: submitted,
            completed,
            unaccounted: submitted.saturating_sub(completed),
            succeeded,
            failed,
            success_rate,
            avg_ms,
            min_ms: latencies_ms.first().copied(),
            max_ms: latencies_ms.last().copied(),
            p50_ms: percentile(&latencies_ms, 50.0),
            p90_ms: percentile(&latencies_ms, 90.0),
            p95_ms: percentile(&latencies_ms, 95.0),
            p99_ms: percentile(&latencies_ms, 99.0),
            failures_by_kind,
            per_second,
            elapsed,
        }
    }

    pub fn is_partial(&self) -> bool {
        self.end == RunEnd::Interrupted
    }
}
