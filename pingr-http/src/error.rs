use std::time::Duration;

use pingr_core::{ErrorInfo, ErrorKind};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("only http:// and https:// targets are supported: {0}")]
    UnsupportedScheme(String),

    #[error("http request build failed: {0}")]
    RequestBuild(#[from] http::Error),

    #[error("http request failed: {0}")]
    Request(#[from] hyper_util::client::legacy::Error),

    #[error("http request timed out after {0:?}")]
    Timeout(Duration),

    #[error("failed to read response body: {0}")]
    BodyRead(#[from] hyper::Error),

    #[error("unexpected status {0}")]
    UnexpectedStatus(u16),
}

impl Error {
    /// Coarse classification used by the load engine.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::Request(_) => ErrorKind::ConnectionError,
            Self::InvalidUrl(_)
            | Self::UnsupportedScheme(_)
            | Self::RequestBuild(_)
            | Self::BodyRead(_)
            | Self::UnexpectedStatus(_) => ErrorKind::ProtocolError,
        }
    }
}

impl From<Error> for ErrorInfo {
    fn from(err: Error) -> Self {
        ErrorInfo::new(err.kind(), err.to_string())
    }
}
