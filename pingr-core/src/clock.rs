use std::time::{SystemTime, UNIX_EPOCH};

/// Wall-clock source used to bucket admissions per second.
pub trait Clock: Send + Sync + 'static {
    fn now_unix_second(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_unix_second(&self) -> i64 {
        match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(d) => d.as_secs() as i64,
            Err(before) => -(before.duration().as_secs() as i64),
        }
    }
}
