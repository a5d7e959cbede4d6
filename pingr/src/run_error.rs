use crate::exit_codes::ExitCode;

#[derive(Debug)]
pub enum RunError {
    InvalidInput(anyhow::Error),
    PreflightFailed(anyhow::Error),
    RuntimeError(anyhow::Error),
}

impl RunError {
    #[must_use]
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::InvalidInput(_) => ExitCode::InvalidInput,
            Self::PreflightFailed(_) => ExitCode::PreflightFailed,
            Self::RuntimeError(_) => ExitCode::RuntimeError,
        }
    }

    #[must_use]
    pub fn anyhow(&self) -> &anyhow::Error {
        match self {
            Self::InvalidInput(e) | Self::PreflightFailed(e) | Self::RuntimeError(e) => e,
        }
    }
}

impl From<pingr_core::Error> for RunError {
    fn from(err: pingr_core::Error) -> Self {
        if err.is_config() {
            Self::InvalidInput(anyhow::Error::new(err).context("invalid run configuration"))
        } else {
            Self::RuntimeError(anyhow::Error::new(err).context("load run failed"))
        }
    }
}

impl std::fmt::Display for RunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#}", self.anyhow())
    }
}

impl std::error::Error for RunError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.anyhow().as_ref())
    }
}
