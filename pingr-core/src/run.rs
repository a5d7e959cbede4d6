use std::sync::Arc;

use tokio::time::{Instant, sleep_until};

use super::cancel::CancellationController;
use super::clock::{Clock, SystemClock};
use super::config::RunConfig;
use super::dispatch::Dispatcher;
use super::error::Result;
use super::limiter::RateLimiter;
use super::probe::RetryingProbe;
use super::progress::{ProgressFn, ProgressTracker};
use super::query::QueryClient;
use super::stats::{RunEnd, RunReport, StatsAggregator};

/// A configured load run against one target.
pub struct LoadTest<C, K = SystemClock> {
    config: RunConfig,
    client: Arc<C>,
    clock: Arc<K>,
    progress: Option<ProgressFn>,
    controller: CancellationController,
}

impl<C: QueryClient> LoadTest<C, SystemClock> {
    pub fn new(config: RunConfig, client: Arc<C>) -> Self {
        let controller = CancellationController::new(config.grace);
        Self {
            config,
            client,
            clock: Arc::new(SystemClock),
            progress: None,
            controller,
        }
    }
}

impl<C: QueryClient, K: Clock> LoadTest<C, K> {
    pub fn with_clock<K2: Clock>(self, clock: Arc<K2>) -> LoadTest<C, K2> {
        LoadTest {
            config: self.config,
            client: self.client,
            clock,
            progress: self.progress,
            controller: self.controller,
        }
    }

    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Handle used to interrupt the run from outside.
    pub fn controller(&self) -> CancellationController {
        self.controller.clone()
    }

    /// Runs every job (or until interrupted) and returns the report.
    ///
    /// Invalid configuration is rejected before anything is dispatched. An interrupt is
    /// not an error: the report then covers the jobs that finished within the grace window.
    pub async fn run(self) -> Result<RunReport> {
        let Self {
            config,
            client,
            clock,
            progress,
            controller,
        } = self;

        config.validate()?;

        tracing::info!(
            target = %config.target,
            total = config.total,
            concurrency = config.concurrency,
            qps = config.qps,
            timeout = ?config.timeout,
            retries = config.retries,
            "starting load run"
        );

        let started = Instant::now();
        let stats = Arc::new(StatsAggregator::default());
        let tracker = Arc::new(ProgressTracker::new(config.total, progress));
        let token = controller.token();

        let mut dispatch = Dispatcher::new(
            RetryingProbe::new(client),
            Arc::new(config.job_spec()),
            RateLimiter::new(config.qps),
            clock,
            stats.clone(),
            tracker.clone(),
            token.clone(),
        )
        .spawn(config.total, config.concurrency);

        let mut drain_deadline: Option<Instant> = None;
        loop {
            tokio::select! {
                biased;
                outcome = dispatch.outcomes.recv() => match outcome {
                    Some(outcome) => {
                        stats.record(&outcome);
                        tracker.on_completed();
                    }
                    None => break,
                },
                _ = token.cancelled(), if drain_deadline.is_none() => {
                    drain_deadline = Some(Instant::now() + controller.grace());
                }
                _ = async move {
                    match drain_deadline {
                        Some(deadline) => sleep_until(deadline).await,
                        None => std::future::pending::<()>().await,
                    }
                }, if drain_deadline.is_some() => {
                    let pending = stats.snapshot().in_flight();
                    tracing::warn!(pending, "grace window elapsed, finalizing partial results");
                    break;
                }
            }
        }

        let admitted = dispatch.admission.await?;
        let end = if admitted < config.total || drain_deadline.is_some() {
            RunEnd::Interrupted
        } else {
            RunEnd::Completed
        };

        if end == RunEnd::Completed {
            for worker in dispatch.workers {
                worker.await?;
            }
        }
        // After an interrupt, stragglers are left running; their outcomes are discarded.

        controller.finish();
        let report = stats.finalize(config.total, end, started.elapsed());

        tracing::info!(
            end = %report.end,
            total = report.total,
            succeeded = report.succeeded,
            failed = report.failed,
            "load run finished"
        );

        Ok(report)
    }
}

impl<C, K> std::fmt::Debug for LoadTest<C, K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadTest")
            .field("config", &self.config)
            .field("controller", &self.controller)
            .finish_non_exhaustive()
    }
}
