use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write as _;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use pingr_core::{Preflight, ProgressEvent, ProgressFn, ProgressPhase, RunConfig, RunReport};

use super::OutputFormatter;

const NO_PERCENT: u64 = u64::MAX;

pub(crate) struct JsonOutput {
    throttle: Arc<PercentThrottle>,
}

impl JsonOutput {
    pub(crate) fn new() -> Self {
        Self {
            throttle: Arc::new(PercentThrottle::default()),
        }
    }
}

impl OutputFormatter for JsonOutput {
    fn print_header(&self, _cfg: &RunConfig) {}

    fn print_preflight(&self, target: &str, preflight: &Preflight) {
        let line = JsonPreflightLine {
            kind: "preflight",
            target,
            status: preflight.reply.status,
            server: preflight.reply.server.as_deref(),
            bytes_received: preflight.reply.bytes_received,
            latency_ms: preflight.latency_ms,
        };
        emit_json_line(&line);
    }

    fn progress(&self) -> Option<ProgressFn> {
        let throttle = self.throttle.clone();
        Some(Arc::new(move |event| {
            if let Some(line) = throttle.line(&event) {
                emit_json_line(&line);
            }
        }))
    }

    fn print_summary(&self, report: &RunReport) -> anyhow::Result<()> {
        let line = build_summary_line(report);
        emit_json_line(&line);
        Ok(())
    }
}

/// Lets one progress line through per phase and whole percent.
struct PercentThrottle {
    last: [AtomicU64; 2],
}

impl Default for PercentThrottle {
    fn default() -> Self {
        Self {
            last: [AtomicU64::new(NO_PERCENT), AtomicU64::new(NO_PERCENT)],
        }
    }
}

impl PercentThrottle {
    fn line(&self, event: &ProgressEvent) -> Option<JsonProgressLine> {
        let percent = event.percent().floor() as u64;
        let slot = match event.phase {
            ProgressPhase::Submitting => &self.last[0],
            ProgressPhase::Collecting => &self.last[1],
        };

        let prev = slot.load(Ordering::Relaxed);
        if prev != NO_PERCENT && percent <= prev {
            return None;
        }
        slot.compare_exchange(prev, percent, Ordering::Relaxed, Ordering::Relaxed)
            .ok()?;

        Some(JsonProgressLine {
            kind: "progress",
            phase: event.phase.to_string(),
            done: event.done,
            total: event.total,
            percent,
        })
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonPreflightLine<'a> {
    pub kind: &'static str,
    pub target: &'a str,
    pub status: Option<u16>,
    pub server: Option<&'a str>,
    pub bytes_received: u64,
    pub latency_ms: f64,
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonProgressLine {
    pub kind: &'static str,
    pub phase: String,
    pub done: u64,
    pub total: u64,
    pub percent: u64,
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonSummaryLine {
    pub kind: &'static str,
    pub end: String,
    pub planned: u64,
    pub total: u64,
    pub completed: u64,
    pub unaccounted: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub success_rate: f64,
    pub elapsed_secs: f64,
    pub latency: JsonLatencySummary,
    pub failures_by_kind: BTreeMap<String, u64>,
    /// Admitted requests keyed by unix second.
    pub per_second: BTreeMap<i64, u64>,
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonLatencySummary {
    pub avg: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub p50: Option<f64>,
    pub p90: Option<f64>,
    pub p95: Option<f64>,
    pub p99: Option<f64>,
}

fn build_summary_line(report: &RunReport) -> JsonSummaryLine {
    JsonSummaryLine {
        kind: "summary",
        end: report.end.to_string(),
        planned: report.planned,
        total: report.total,
        completed: report.completed,
        unaccounted: report.unaccounted,
        succeeded: report.succeeded,
        failed: report.failed,
        success_rate: report.success_rate,
        elapsed_secs: report.elapsed.as_secs_f64(),
        latency: JsonLatencySummary {
            avg: report.avg_ms,
            min: report.min_ms,
            max: report.max_ms,
            p50: report.p50_ms,
            p90: report.p90_ms,
            p95: report.p95_ms,
            p99: report.p99_ms,
        },
        failures_by_kind: report
            .failures_by_kind
            .iter()
            .map(|(k, v)| (k.to_string(), *v))
            .collect(),
        per_second: report.per_second.clone(),
    }
}

fn emit_json_line<T: Serialize>(line: &T) {
    let mut out = std::io::stdout().lock();
    if serde_json::to_writer(&mut out, line).is_ok() {
        let _ = writeln!(out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pingr_core::{ErrorKind, RunEnd, RunStats};
    use serde_json::Value;
    use std::time::Duration;

    fn event(phase: ProgressPhase, done: u64, total: u64) -> ProgressEvent {
        ProgressEvent { phase, done, total }
    }

    #[test]
    fn progress_is_throttled_to_whole_percent() {
        let throttle = PercentThrottle::default();

        let emitted = (1..=1000)
            .filter_map(|done| throttle.line(&event(ProgressPhase::Submitting, done, 1000)))
            .count();
        // 0% through 100% inclusive.
        assert_eq!(emitted, 101);

        // Phases are throttled independently.
        let line = throttle.line(&event(ProgressPhase::Collecting, 1, 1000));
        let line = match line {
            Some(v) => v,
            None => panic!("expected a collecting line"),
        };
        assert_eq!(line.percent, 0);
        assert_eq!(line.phase, "collecting");
    }

    #[test]
    fn summary_line_has_counts_and_latency() {
        let stats = RunStats {
            submitted: 4,
            completed: 4,
            succeeded: 3,
            failed: 1,
            latencies_ms: vec![10.0, 20.0, 30.0],
            failures_by_kind: BTreeMap::from([(ErrorKind::ProtocolError, 1)]),
            per_second: BTreeMap::from([(1_700_000_000, 4)]),
        };
        let report = RunReport::from_stats(stats, 4, RunEnd::Completed, Duration::from_secs(1));

        let line = build_summary_line(&report);
        let v: Value = match serde_json::to_value(&line) {
            Ok(v) => v,
            Err(err) => panic!("to_value failed: {err}"),
        };

        assert_eq!(v.get("kind").and_then(Value::as_str), Some("summary"));
        assert_eq!(v.get("end").and_then(Value::as_str), Some("completed"));
        assert_eq!(v.get("succeeded").and_then(Value::as_u64), Some(3));
        assert_eq!(v.pointer("/latency/max").and_then(Value::as_f64), Some(30.0));
        assert_eq!(
            v.pointer("/failures_by_kind/protocol_error")
                .and_then(Value::as_u64),
            Some(1)
        );
        assert_eq!(
            v.pointer("/per_second/1700000000").and_then(Value::as_u64),
            Some(4)
        );
    }
}
