use std::fmt::Write as _;

use pingr_core::RunReport;

use super::format::*;

pub(crate) fn render(report: &RunReport) -> String {
    let mut out = String::new();

    if report.is_partial() {
        out.push_str("summary (interrupted, partial results)\n");
    } else {
        out.push_str("summary\n");
    }

    writeln!(
        &mut out,
        "  requests: {} of {} admitted, {} completed",
        report.total, report.planned, report.completed
    )
    .ok();
    if report.unaccounted > 0 {
        writeln!(
            &mut out,
            "  unaccounted: {} (still in flight when the run ended)",
            report.unaccounted
        )
        .ok();
    }
    writeln!(
        &mut out,
        "  results: succeeded {} failed {} (success rate {:.2}%)",
        report.succeeded, report.failed, report.success_rate
    )
    .ok();

    if report.succeeded > 0 {
        writeln!(
            &mut out,
            "  latency = avg={} min={} max={}",
            format_latency_ms(report.avg_ms),
            format_latency_ms(report.min_ms),
            format_latency_ms(report.max_ms)
        )
        .ok();
        writeln!(
            &mut out,
            "  latency = p50={} p90={} p95={} p99={}",
            format_latency_ms(report.p50_ms),
            format_latency_ms(report.p90_ms),
            format_latency_ms(report.p95_ms),
            format_latency_ms(report.p99_ms)
        )
        .ok();
    } else {
        out.push_str("  latency: n/a\n");
    }

    if !report.failures_by_kind.is_empty() {
        out.push_str("  failures:\n");
        for (kind, count) in &report.failures_by_kind {
            writeln!(&mut out, "    {kind}: {count}").ok();
        }
    }

    let secs = report.elapsed.as_secs_f64().max(1e-9);
    writeln!(
        &mut out,
        "  elapsed: {} rate: rps={}",
        format_elapsed(report.elapsed),
        format_rate((report.completed as f64) / secs)
    )
    .ok();

    if !report.per_second.is_empty() {
        out.push_str("\nrequests per second\n");
        for (second, count) in &report.per_second {
            writeln!(&mut out, "  {}  {count}", format_local_second(*second)).ok();
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pingr_core::{ErrorKind, RunEnd, RunStats};
    use std::collections::BTreeMap;
    use std::time::Duration;

    fn stats() -> RunStats {
        RunStats {
            submitted: 10,
            completed: 10,
            succeeded: 9,
            failed: 1,
            latencies_ms: (1..=9u32).map(|v| f64::from(v * 10)).collect(),
            failures_by_kind: BTreeMap::from([(ErrorKind::Timeout, 1)]),
            per_second: BTreeMap::from([(1_700_000_000, 6), (1_700_000_001, 4)]),
        }
    }

    #[test]
    fn completed_run_lists_everything() {
        let report = RunReport::from_stats(stats(), 10, RunEnd::Completed, Duration::from_secs(2));
        let text = render(&report);

        assert!(text.starts_with("summary\n"), "{text}");
        assert!(text.contains("requests: 10 of 10 admitted, 10 completed"), "{text}");
        assert!(text.contains("success rate 90.00%"), "{text}");
        assert!(text.contains("p50=50.00ms"), "{text}");
        assert!(text.contains("    timeout: 1\n"), "{text}");
        assert!(!text.contains("unaccounted"), "{text}");

        let histogram: Vec<_> = text
            .lines()
            .skip_while(|l| *l != "requests per second")
            .skip(1)
            .collect();
        assert_eq!(histogram.len(), 2, "{text}");
        assert!(histogram[0].ends_with("  6"), "{text}");
    }

    #[test]
    fn interrupted_run_is_labelled_partial() {
        let mut s = stats();
        s.submitted = 12;
        let report =
            RunReport::from_stats(s, 100, RunEnd::Interrupted, Duration::from_millis(500));
        let text = render(&report);

        assert!(text.starts_with("summary (interrupted, partial results)\n"), "{text}");
        assert!(text.contains("requests: 12 of 100 admitted"), "{text}");
        assert!(text.contains("unaccounted: 2"), "{text}");
    }

    #[test]
    fn no_successes_has_no_latency() {
        let s = RunStats {
            submitted: 1,
            completed: 1,
            failed: 1,
            failures_by_kind: BTreeMap::from([(ErrorKind::ConnectionError, 1)]),
            ..RunStats::default()
        };
        let report = RunReport::from_stats(s, 1, RunEnd::Completed, Duration::from_millis(5));
        let text = render(&report);

        assert!(text.contains("latency: n/a"), "{text}");
        assert!(text.contains("connection_error: 1"), "{text}");
    }
}
