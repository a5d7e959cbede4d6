use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use pingr_core::DEFAULT_CONCURRENCY;

fn parse_duration(input: &str) -> Result<Duration, String> {
    let s = input.trim();
    if s.is_empty() {
        return Err("duration cannot be empty (expected e.g. 5s, 250ms, 1m)".to_string());
    }

    let number_end = s
        .char_indices()
        .find(|(_, ch)| !ch.is_ascii_digit())
        .map_or(s.len(), |(idx, _)| idx);

    if number_end == 0 {
        return Err(format!("invalid duration '{s}' (expected e.g. 5s, 250ms, 1m)"));
    }

    let (number_str, unit_str) = s.split_at(number_end);
    let value: u64 = number_str
        .parse()
        .map_err(|_| format!("invalid duration '{s}' (expected e.g. 5s, 250ms, 1m)"))?;

    match unit_str.trim() {
        // Bare numbers are seconds.
        "" | "s" | "sec" | "secs" | "second" | "seconds" => Ok(Duration::from_secs(value)),
        "ms" | "msec" | "msecs" | "millisecond" | "milliseconds" => {
            Ok(Duration::from_millis(value))
        }
        "m" | "min" | "mins" | "minute" | "minutes" => {
            let secs = value
                .checked_mul(60)
                .ok_or_else(|| format!("duration '{s}' is too large"))?;
            Ok(Duration::from_secs(secs))
        }
        "h" | "hr" | "hrs" | "hour" | "hours" => {
            let secs = value
                .checked_mul(60 * 60)
                .ok_or_else(|| format!("duration '{s}' is too large"))?;
            Ok(Duration::from_secs(secs))
        }
        _ => Err(format!("invalid duration '{s}' (expected e.g. 5s, 250ms, 1m)")),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Progress bars and a human-readable summary.
    HumanReadable,
    /// Emit JSON progress and summary lines (NDJSON) to stdout.
    Json,
}

#[derive(Debug, Parser)]
#[command(
    name = "pingr",
    author,
    version,
    about = "Concurrent status-query load generator",
    long_about = "pingr fires a fixed number of status queries at a single endpoint with bounded concurrency and an optional rate limit, then reports success rate, latency percentiles and per-second throughput.\n\nCtrl-C stops admitting new queries; in-flight ones get a short grace window and the report covers what finished.",
    after_help = "Examples:\n  pingr run http://127.0.0.1:8080/status --total 1000\n  pingr run https://example.com/health --total 500 --concurrency 20 --qps 100\n  pingr run http://127.0.0.1:8080/status --total 100 --retries 2 --output json\n\nEvery flag can also be set through a PINGR_* environment variable."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a load test against a status endpoint
    Run(RunArgs),
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Status endpoint to query (http:// or https://)
    #[arg(env = "PINGR_TARGET")]
    pub target: String,

    /// Number of queries to send
    #[arg(long, env = "PINGR_TOTAL")]
    pub total: u64,

    /// Maximum number of queries in flight
    #[arg(long, env = "PINGR_CONCURRENCY", default_value_t = DEFAULT_CONCURRENCY)]
    pub concurrency: usize,

    /// Maximum queries started per second (0 = unlimited)
    #[arg(long, env = "PINGR_QPS", default_value_t = 0)]
    pub qps: u64,

    /// Deadline of a single query attempt (e.g. 5s, 250ms)
    #[arg(long, env = "PINGR_TIMEOUT", value_parser = parse_duration, default_value = "5s")]
    pub timeout: Duration,

    /// Extra attempts after a failed query
    #[arg(long, env = "PINGR_RETRIES", default_value_t = 0)]
    pub retries: u32,

    /// How long in-flight queries may finish after Ctrl-C
    #[arg(long, env = "PINGR_GRACE", value_parser = parse_duration, default_value = "100ms")]
    pub grace: Duration,

    /// Append per-query log lines (INFO and above) to this file
    #[arg(long, env = "PINGR_LOG_FILE", value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Output format
    #[arg(long, env = "PINGR_OUTPUT", value_enum, default_value_t = OutputFormat::HumanReadable)]
    pub output: OutputFormat,

    /// Do not send the single check query before the load phase
    #[arg(long, env = "PINGR_SKIP_PREFLIGHT")]
    pub skip_preflight: bool,
}
