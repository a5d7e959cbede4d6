use std::sync::Arc;
use std::time::Duration;

use super::error::{Error, Result};

pub const DEFAULT_CONCURRENCY: usize = 50;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_GRACE: Duration = Duration::from_millis(100);
/// Upper bound on `concurrency`; one worker task is spawned per unit.
pub const MAX_CONCURRENCY: usize = 65_536;

/// Immutable input of a load run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub target: String,
    /// Upper bound on probes running at the same time.
    pub concurrency: usize,
    /// Number of jobs to admit.
    pub total: u64,
    /// Admissions per second; `0` disables pacing.
    pub qps: u64,
    /// Deadline of a single query attempt.
    pub timeout: Duration,
    /// Extra attempts after the first failed one.
    pub retries: u32,
    /// How long in-flight jobs may keep running after an interrupt.
    pub grace: Duration,
}

impl RunConfig {
    pub fn new(target: impl Into<String>, total: u64) -> Self {
        Self {
            target: target.into(),
            concurrency: DEFAULT_CONCURRENCY,
            total,
            qps: 0,
            timeout: DEFAULT_TIMEOUT,
            retries: 0,
            grace: DEFAULT_GRACE,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.target.trim().is_empty() {
            return Err(Error::InvalidTarget);
        }
        if self.total == 0 {
            return Err(Error::InvalidTotal);
        }
        if self.concurrency == 0 || self.concurrency > MAX_CONCURRENCY {
            return Err(Error::InvalidConcurrency);
        }
        if self.timeout.is_zero() {
            return Err(Error::InvalidTimeout);
        }
        Ok(())
    }

    #[must_use]
    pub fn job_spec(&self) -> JobSpec {
        JobSpec {
            target: Arc::from(self.target.as_str()),
            timeout: self.timeout,
            retries: self.retries,
        }
    }
}

/// Parameters shared by every job of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSpec {
    pub target: Arc<str>,
    pub timeout: Duration,
    pub retries: u32,
}

impl JobSpec {
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = RunConfig::new("http://127.0.0.1:8080/status", 10);
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.concurrency, DEFAULT_CONCURRENCY);
        assert_eq!(cfg.qps, 0);
        assert_eq!(cfg.grace, DEFAULT_GRACE);
    }

    #[test]
    fn rejects_non_positive_values() {
        let base = RunConfig::new("http://127.0.0.1:8080/status", 10);

        let cfg = RunConfig { total: 0, ..base.clone() };
        assert!(matches!(cfg.validate(), Err(Error::InvalidTotal)));

        let cfg = RunConfig {
            concurrency: 0,
            ..base.clone()
        };
        assert!(matches!(cfg.validate(), Err(Error::InvalidConcurrency)));

        let cfg = RunConfig {
            concurrency: usize::MAX,
            ..base.clone()
        };
        assert!(matches!(cfg.validate(), Err(Error::InvalidConcurrency)));

        let cfg = RunConfig {
            concurrency: MAX_CONCURRENCY,
            ..base.clone()
        };
        assert!(cfg.validate().is_ok());

        let cfg = RunConfig {
            timeout: Duration::ZERO,
            ..base.clone()
        };
        assert!(matches!(cfg.validate(), Err(Error::InvalidTimeout)));

        let cfg = RunConfig {
            target: "  ".to_string(),
            ..base
        };
        let err = match cfg.validate() {
            Ok(()) => panic!("expected blank target to be rejected"),
            Err(err) => err,
        };
        assert!(err.is_config());
    }

    #[test]
    fn job_spec_counts_first_attempt() {
        let mut cfg = RunConfig::new("t", 1);
        cfg.retries = 2;
        let spec = cfg.job_spec();
        assert_eq!(spec.max_attempts(), 3);
        assert_eq!(&*spec.target, "t");

        cfg.retries = u32::MAX;
        assert_eq!(cfg.job_spec().max_attempts(), u32::MAX);
    }
}
