use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum RunState {
    Running,
    /// Interrupted: nothing new is admitted, in-flight jobs may still finish.
    Draining,
    Finished,
}

const RUNNING: u8 = 0;
const DRAINING: u8 = 1;
const FINISHED: u8 = 2;

impl RunState {
    fn from_u8(v: u8) -> Self {
        match v {
            RUNNING => Self::Running,
            DRAINING => Self::Draining,
            _ => Self::Finished,
        }
    }
}

/// Turns an external interrupt into a graceful drain of the run.
#[derive(Debug, Clone)]
pub struct CancellationController {
    token: CancellationToken,
    done: CancellationToken,
    state: Arc<AtomicU8>,
    grace: Duration,
}

impl CancellationController {
    pub fn new(grace: Duration) -> Self {
        Self {
            token: CancellationToken::new(),
            done: CancellationToken::new(),
            state: Arc::new(AtomicU8::new(RUNNING)),
            grace,
        }
    }

    /// Cancelled once an interrupt has been observed.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn grace(&self) -> Duration {
        self.grace
    }

    pub fn state(&self) -> RunState {
        RunState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Moves `Running -> Draining`. Returns `false` if the run was already draining or
    /// finished, in which case nothing happens.
    pub fn cancel(&self) -> bool {
        let first = self
            .state
            .compare_exchange(RUNNING, DRAINING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();

        if first {
            tracing::warn!(grace = ?self.grace, "interrupt received, draining in-flight jobs");
            self.token.cancel();
        }
        first
    }

    pub(crate) fn finish(&self) {
        self.state.store(FINISHED, Ordering::Release);
        self.done.cancel();
    }

    /// Cancels the run when `interrupt` resolves, unless the run finishes first.
    pub fn cancel_on<F>(&self, interrupt: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let this = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = interrupt => {
                    this.cancel();
                }
                _ = this.done.cancelled() => {}
            }
        })
    }
}

impl Default for CancellationController {
    fn default() -> Self {
        Self::new(super::config::DEFAULT_GRACE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_is_observed_once() {
        let ctl = CancellationController::default();
        assert_eq!(ctl.state(), RunState::Running);

        assert!(ctl.cancel());
        assert_eq!(ctl.state(), RunState::Draining);
        assert!(ctl.token().is_cancelled());

        assert!(!ctl.cancel());
        assert_eq!(ctl.state(), RunState::Draining);

        ctl.finish();
        assert_eq!(ctl.state(), RunState::Finished);
        assert!(!ctl.cancel());
        assert_eq!(ctl.state(), RunState::Finished);
    }

    #[test]
    fn cancel_after_finish_is_ignored() {
        let ctl = CancellationController::default();
        ctl.finish();
        assert!(!ctl.cancel());
        assert!(!ctl.is_cancelled());
    }

    #[tokio::test]
    async fn cancel_on_fires_on_interrupt() {
        let ctl = CancellationController::new(Duration::from_millis(10));
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();

        let watcher = ctl.cancel_on(async move {
            let _ = rx.await;
        });
        let _ = tx.send(());

        if let Err(err) = watcher.await {
            panic!("watcher task failed: {err}");
        }
        assert!(ctl.is_cancelled());
        assert_eq!(ctl.state(), RunState::Draining);
    }

    #[tokio::test]
    async fn cancel_on_exits_when_run_finishes() {
        let ctl = CancellationController::default();
        let watcher = ctl.cancel_on(std::future::pending());

        ctl.finish();

        if let Err(err) = watcher.await {
            panic!("watcher task failed: {err}");
        }
        assert!(!ctl.is_cancelled());
    }
}
