use std::sync::Arc;

mod format;
mod progress;
mod summary;

use format::{format_bytes, format_latency_ms, format_qps};
use progress::HumanProgress;
use summary::render;

use pingr_core::{Preflight, ProgressFn, RunConfig, RunReport};

use super::OutputFormatter;

pub(crate) struct HumanReadableOutput {
    progress: Arc<HumanProgress>,
}

impl HumanReadableOutput {
    pub(crate) fn new() -> Self {
        Self {
            progress: Arc::new(HumanProgress::new()),
        }
    }
}

impl OutputFormatter for HumanReadableOutput {
    fn print_header(&self, cfg: &RunConfig) {
        println!("target: {}", cfg.target);
        println!(
            "total={} concurrency={} qps={} timeout={:?} retries={}",
            cfg.total,
            cfg.concurrency,
            format_qps(cfg.qps),
            cfg.timeout,
            cfg.retries
        );
    }

    fn print_preflight(&self, _target: &str, preflight: &Preflight) {
        let reply = &preflight.reply;
        let status = reply
            .status
            .map_or_else(|| "-".to_string(), |s| s.to_string());
        println!(
            "preflight: status={status} server={} size={} latency={}",
            reply.server.as_deref().unwrap_or("-"),
            format_bytes(reply.bytes_received),
            format_latency_ms(Some(preflight.latency_ms))
        );
        println!();
    }

    fn progress(&self) -> Option<ProgressFn> {
        let progress = self.progress.clone();
        Some(Arc::new(move |event| progress.update(event)))
    }

    fn print_summary(&self, report: &RunReport) -> anyhow::Result<()> {
        self.progress.finish();
        print!("{}", render(report));
        Ok(())
    }
}
