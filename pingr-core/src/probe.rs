use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use super::config::JobSpec;
use super::query::{ErrorInfo, QueryClient, QueryReply};

/// Result of one job, after all of its attempts.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Success { latency_ms: f64, attempts: u32 },
    Failure { error: ErrorInfo, attempts: u32 },
}

/// Reply of the single query issued before the load phase.
#[derive(Debug, Clone, PartialEq)]
pub struct Preflight {
    pub reply: QueryReply,
    pub latency_ms: f64,
}

/// Runs a query with a bounded number of immediate retries.
#[derive(Debug)]
pub struct RetryingProbe<C> {
    client: Arc<C>,
}

impl<C> Clone for RetryingProbe<C> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
        }
    }
}

impl<C: QueryClient> RetryingProbe<C> {
    pub fn new(client: Arc<C>) -> Self {
        Self { client }
    }

    pub async fn run(&self, spec: &JobSpec) -> JobOutcome {
        let max_attempts = spec.max_attempts();
        let mut attempts = 0u32;

        loop {
            attempts = attempts.saturating_add(1);
            let (result, elapsed) = self.attempt(spec).await;

            match result {
                Ok(_) => {
                    let latency_ms = elapsed.as_secs_f64() * 1000.0;
                    tracing::info!(latency_ms, attempts, "query succeeded");
                    return JobOutcome::Success {
                        latency_ms,
                        attempts,
                    };
                }
                Err(error) if attempts < max_attempts => {
                    tracing::warn!(attempt = attempts, max_attempts, %error, "query failed, retrying");
                }
                Err(error) => return JobOutcome::Failure { error, attempts },
            }
        }
    }

    /// A single attempt, no retries.
    pub async fn preflight(&self, spec: &JobSpec) -> Result<Preflight, ErrorInfo> {
        let (result, elapsed) = self.attempt(spec).await;
        result.map(|reply| Preflight {
            reply,
            latency_ms: elapsed.as_secs_f64() * 1000.0,
        })
    }

    async fn attempt(&self, spec: &JobSpec) -> (Result<QueryReply, ErrorInfo>, Duration) {
        let started = Instant::now();
        let result = match tokio::time::timeout(
            spec.timeout,
            self.client.query(&spec.target, spec.timeout),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(ErrorInfo::timeout(spec.timeout)),
        };
        (result, started.elapsed())
    }
}
