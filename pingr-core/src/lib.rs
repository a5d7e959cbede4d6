mod cancel;
mod clock;
mod config;
mod dispatch;
mod error;
mod limiter;
mod probe;
mod progress;
mod query;
mod run;
mod stats;

pub use cancel::{CancellationController, RunState};
pub use clock::{Clock, SystemClock};
pub use config::{DEFAULT_CONCURRENCY, DEFAULT_GRACE, DEFAULT_TIMEOUT, JobSpec, MAX_CONCURRENCY, RunConfig};
pub use dispatch::{Dispatch, Dispatcher, JOB_QUEUE_SLACK};
pub use error::{Error, Result};
pub use limiter::RateLimiter;
pub use probe::{JobOutcome, Preflight, RetryingProbe};
pub use progress::{ProgressEvent, ProgressFn, ProgressPhase, ProgressTracker};
pub use query::{ErrorInfo, ErrorKind, QueryClient, QueryReply};
pub use run::LoadTest;
pub use stats::{RunEnd, RunReport, RunStats, StatsAggregator, percentile};
