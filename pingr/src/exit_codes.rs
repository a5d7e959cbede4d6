#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// The run finished, whether or not individual queries failed or it was interrupted.
    Success = 0,

    /// The single query sent before the load phase failed.
    PreflightFailed = 20,

    /// Invalid CLI/config/options (bad flags, invalid durations, unsupported target, etc.).
    InvalidInput = 30,

    /// Internal/runtime error (IO errors, worker join failures).
    RuntimeError = 40,
}

impl ExitCode {
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}
