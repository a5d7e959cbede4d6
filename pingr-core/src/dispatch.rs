use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::clock::Clock;
use super::config::JobSpec;
use super::limiter::RateLimiter;
use super::probe::{JobOutcome, RetryingProbe};
use super::progress::ProgressTracker;
use super::query::QueryClient;
use super::stats::StatsAggregator;

/// Extra job queue capacity on top of one slot per worker.
pub const JOB_QUEUE_SLACK: usize = 16;

#[derive(Debug, Clone, Copy)]
struct Job {
    seq: u64,
}

/// Admits jobs through the rate limiter and runs them on a fixed worker pool.
pub struct Dispatcher<C, K> {
    probe: RetryingProbe<C>,
    spec: Arc<JobSpec>,
    limiter: RateLimiter,
    clock: Arc<K>,
    stats: Arc<StatsAggregator>,
    progress: Arc<ProgressTracker>,
    cancel: CancellationToken,
}

/// Handles of a started dispatch.
#[derive(Debug)]
pub struct Dispatch {
    /// Outcomes in completion order. Closed once every worker has exited.
    pub outcomes: mpsc::Receiver<JobOutcome>,
    /// Resolves to the number of admitted jobs.
    pub admission: JoinHandle<u64>,
    pub workers: Vec<JoinHandle<()>>,
}

impl<C: QueryClient, K: Clock> Dispatcher<C, K> {
    pub fn new(
        probe: RetryingProbe<C>,
        spec: Arc<JobSpec>,
        limiter: RateLimiter,
        clock: Arc<K>,
        stats: Arc<StatsAggregator>,
        progress: Arc<ProgressTracker>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            probe,
            spec,
            limiter,
            clock,
            stats,
            progress,
            cancel,
        }
    }

    /// Starts `min(concurrency, total)` workers and the admission loop for `total` jobs.
    ///
    /// Admission blocks on the bounded job queue, so at most
    /// `concurrency + JOB_QUEUE_SLACK` admitted jobs wait for a worker at any time.
    pub fn spawn(self, total: u64, concurrency: usize) -> Dispatch {
        let concurrency = usize::try_from(total).map_or(concurrency, |t| t.min(concurrency));
        let capacity = concurrency.saturating_add(JOB_QUEUE_SLACK);
        let (job_tx, job_rx) = mpsc::channel::<Job>(capacity);
        let (outcome_tx, outcome_rx) = mpsc::channel::<JobOutcome>(capacity);
        let job_rx = Arc::new(Mutex::new(job_rx));

        let mut workers = Vec::with_capacity(concurrency);
        for worker in 0..concurrency {
            workers.push(tokio::spawn(work(
                worker,
                self.probe.clone(),
                self.spec.clone(),
                job_rx.clone(),
                outcome_tx.clone(),
                self.cancel.clone(),
            )));
        }
        drop(outcome_tx);

        let admission = tokio::spawn(admit(
            total,
            self.limiter,
            job_tx,
            self.clock,
            self.stats,
            self.progress,
            self.cancel,
        ));

        Dispatch {
            outcomes: outcome_rx,
            admission,
            workers,
        }
    }
}

async fn admit<K: Clock>(
    total: u64,
    mut limiter: RateLimiter,
    jobs: mpsc::Sender<Job>,
    clock: Arc<K>,
    stats: Arc<StatsAggregator>,
    progress: Arc<ProgressTracker>,
    cancel: CancellationToken,
) -> u64 {
    let mut admitted = 0u64;

    while admitted < total {
        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            permit = async {
                // Pace after the queue slot is secured, so slots freed together
                // still go out one interval apart.
                let permit = jobs.reserve().await?;
                limiter.acquire().await;
                Ok::<_, mpsc::error::SendError<()>>(permit)
            } => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };

        admitted += 1;
        // Counted before the send so no worker can report it first.
        stats.record_submitted(clock.now_unix_second());
        permit.send(Job { seq: admitted });
        progress.on_submitted();
    }

    if admitted < total {
        tracing::warn!(admitted, total, "admission stopped early");
    } else {
        tracing::info!(admitted, "all jobs admitted");
    }
    admitted
}

async fn work<C: QueryClient>(
    worker: usize,
    probe: RetryingProbe<C>,
    spec: Arc<JobSpec>,
    jobs: Arc<Mutex<mpsc::Receiver<Job>>>,
    outcomes: mpsc::Sender<JobOutcome>,
    cancel: CancellationToken,
) {
    loop {
        let job = { jobs.lock().await.recv().await };
        let Some(job) = job else {
            break;
        };

        // Queued jobs that never started are left unaccounted after an interrupt.
        if cancel.is_cancelled() {
            tracing::debug!(worker, seq = job.seq, "skipping queued job after interrupt");
            continue;
        }

        let outcome = probe.run(&spec).await;
        if let JobOutcome::Failure { error, attempts } = &outcome {
            tracing::error!(worker, seq = job.seq, attempts, %error, "job failed");
        }

        if outcomes.send(outcome).await.is_err() {
            break;
        }
    }
}

impl<C, K> std::fmt::Debug for Dispatcher<C, K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("spec", &self.spec)
            .field("limiter", &self.limiter)
            .field("progress", &self.progress)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{ErrorInfo, QueryReply};
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::time::Instant;

    #[derive(Debug, Default)]
    struct CountingClient {
        active: AtomicUsize,
        max_active: AtomicUsize,
        calls: AtomicU64,
        delay: Duration,
    }

    impl QueryClient for CountingClient {
        async fn query(&self, _target: &str, _timeout: Duration) -> Result<QueryReply, ErrorInfo> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(QueryReply::default())
        }
    }

    struct FixedClock(i64);

    impl Clock for FixedClock {
        fn now_unix_second(&self) -> i64 {
            self.0
        }
    }

    fn dispatcher(
        client: Arc<CountingClient>,
        qps: u64,
        total: u64,
        cancel: CancellationToken,
    ) -> (
        Dispatcher<CountingClient, FixedClock>,
        Arc<StatsAggregator>,
        Arc<ProgressTracker>,
    ) {
        let stats = Arc::new(StatsAggregator::default());
        let progress = Arc::new(ProgressTracker::new(total, None));
        let spec = Arc::new(JobSpec {
            target: Arc::from("test"),
            timeout: Duration::from_secs(5),
            retries: 0,
        });
        let d = Dispatcher::new(
            RetryingProbe::new(client),
            spec,
            RateLimiter::new(qps),
            Arc::new(FixedClock(42)),
            stats.clone(),
            progress.clone(),
            cancel,
        );
        (d, stats, progress)
    }

    async fn drain(mut dispatch: Dispatch) -> (u64, Vec<JobOutcome>) {
        let mut outcomes = Vec::new();
        while let Some(o) = dispatch.outcomes.recv().await {
            outcomes.push(o);
        }
        let admitted = match dispatch.admission.await {
            Ok(v) => v,
            Err(err) => panic!("admission task failed: {err}"),
        };
        for w in dispatch.workers {
            if let Err(err) = w.await {
                panic!("worker task failed: {err}");
            }
        }
        (admitted, outcomes)
    }

    #[tokio::test(start_paused = true)]
    async fn never_exceeds_concurrency() {
        let client = Arc::new(CountingClient {
            delay: Duration::from_millis(10),
            ..CountingClient::default()
        });
        let (d, stats, progress) = dispatcher(client.clone(), 0, 200, CancellationToken::new());

        let (admitted, outcomes) = drain(d.spawn(200, 7)).await;

        assert_eq!(admitted, 200);
        assert_eq!(outcomes.len(), 200);
        assert_eq!(client.calls.load(Ordering::SeqCst), 200);
        assert_eq!(client.max_active.load(Ordering::SeqCst), 7);
        assert_eq!(progress.submitted(), 200);

        let s = stats.snapshot();
        assert_eq!(s.submitted, 200);
        assert_eq!(s.per_second.get(&42), Some(&200));
    }

    #[tokio::test(start_paused = true)]
    async fn admissions_follow_the_rate_limit() {
        let client = Arc::new(CountingClient::default());
        let (d, _stats, _progress) = dispatcher(client, 20, 11, CancellationToken::new());

        let started = Instant::now();
        let (admitted, outcomes) = drain(d.spawn(11, 4)).await;

        assert_eq!(admitted, 11);
        assert_eq!(outcomes.len(), 11);
        // 11 admissions at 20/s span at least 10 * 50ms.
        assert!(started.elapsed() >= Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_before_start_admits_nothing() {
        let client = Arc::new(CountingClient::default());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let (d, stats, _progress) = dispatcher(client.clone(), 0, 50, cancel);

        let (admitted, outcomes) = drain(d.spawn(50, 2)).await;

        assert_eq!(admitted, 0);
        assert!(outcomes.is_empty());
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
        assert_eq!(stats.snapshot().submitted, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn queue_bounds_admission_ahead_of_workers() {
        let client = Arc::new(CountingClient {
            delay: Duration::from_secs(3600),
            ..CountingClient::default()
        });
        let (d, _stats, progress) = dispatcher(client, 0, 10_000, CancellationToken::new());

        let _dispatch = d.spawn(10_000, 3);
        tokio::time::sleep(Duration::from_secs(1)).await;

        // Three jobs running, the queue full behind them.
        assert_eq!(progress.submitted(), (3 + 3 + JOB_QUEUE_SLACK) as u64);
    }

    /// The first two calls hold both workers until ~10s, the rest return at once.
    #[derive(Debug, Default)]
    struct StallingClient {
        calls: AtomicU64,
    }

    impl QueryClient for StallingClient {
        async fn query(&self, _target: &str, _timeout: Duration) -> Result<QueryReply, ErrorInfo> {
            let delay = match self.calls.fetch_add(1, Ordering::SeqCst) {
                0 => Duration::from_secs(10),
                1 => Duration::from_millis(9_900),
                _ => Duration::ZERO,
            };
            tokio::time::sleep(delay).await;
            Ok(QueryReply::default())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn freed_queue_slots_do_not_burst_past_the_rate_limit() {
        let admitted_at = Arc::new(std::sync::Mutex::new(Vec::<Instant>::new()));
        let sink = {
            let admitted_at = admitted_at.clone();
            let sink: crate::progress::ProgressFn = Arc::new(move |event| {
                if event.phase == crate::progress::ProgressPhase::Submitting {
                    admitted_at
                        .lock()
                        .unwrap_or_else(|poisoned| poisoned.into_inner())
                        .push(Instant::now());
                }
            });
            sink
        };

        let total = 40;
        let spec = Arc::new(JobSpec {
            target: Arc::from("test"),
            timeout: Duration::from_secs(60),
            retries: 0,
        });
        let d = Dispatcher::new(
            RetryingProbe::new(Arc::new(StallingClient::default())),
            spec,
            RateLimiter::new(10),
            Arc::new(FixedClock(42)),
            Arc::new(StatsAggregator::default()),
            Arc::new(ProgressTracker::new(total, Some(sink))),
            CancellationToken::new(),
        );

        let (admitted, outcomes) = drain(d.spawn(total, 2)).await;
        assert_eq!(admitted, total);
        assert_eq!(outcomes.len(), 40);

        let times = admitted_at
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        assert_eq!(times.len(), 40);
        for (i, pair) in times.windows(2).enumerate() {
            let gap = pair[1] - pair[0];
            assert!(
                gap >= Duration::from_millis(100),
                "admissions #{} and #{} only {gap:?} apart",
                i + 1,
                i + 2
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn small_runs_spawn_one_worker_per_job() {
        let client = Arc::new(CountingClient::default());
        let (d, _stats, _progress) = dispatcher(client.clone(), 0, 3, CancellationToken::new());

        let dispatch = d.spawn(3, 50);
        assert_eq!(dispatch.workers.len(), 3);

        let (admitted, outcomes) = drain(dispatch).await;
        assert_eq!(admitted, 3);
        assert_eq!(outcomes.len(), 3);
        assert_eq!(client.calls.load(Ordering::SeqCst), 3);
    }
}
