use std::future::Future;
use std::time::Duration;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    strum::Display,
    strum::EnumString,
    strum::IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    Timeout,
    ConnectionError,
    ProtocolError,
}

/// Why a single query attempt failed. The kind is informational only.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ErrorInfo {
    pub kind: ErrorKind,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn timeout(after: Duration) -> Self {
        Self::new(ErrorKind::Timeout, format!("no reply within {after:?}"))
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ConnectionError, message)
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ProtocolError, message)
    }
}

/// Metadata of a successful status query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryReply {
    pub status: Option<u16>,
    pub server: Option<String>,
    pub bytes_received: u64,
}

/// One round trip against the target. Implementations must give up after `timeout`.
pub trait QueryClient: Send + Sync + 'static {
    fn query(
        &self,
        target: &str,
        timeout: Duration,
    ) -> impl Future<Output = Result<QueryReply, ErrorInfo>> + Send;
}
