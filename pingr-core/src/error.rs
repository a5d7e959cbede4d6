pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("`target` must not be empty")]
    InvalidTarget,

    #[error("`total` must be a positive integer")]
    InvalidTotal,

    #[error("`concurrency` must be between 1 and {max}", max = crate::config::MAX_CONCURRENCY)]
    InvalidConcurrency,

    #[error("`timeout` must be a positive duration")]
    InvalidTimeout,
}

impl Error {
    /// Configuration errors are raised before any job is dispatched.
    #[must_use]
    pub fn is_config(&self) -> bool {
        !matches!(self, Self::Join(_))
    }
}
