#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,

    /// Invalid CLI/config/options (bad flags, unreadable data file, invalid URL or headers, etc.).
    InvalidInput = 30,

    /// Internal/runtime error (IO errors writing output, panicked workers).
    RuntimeError = 40,

    /// The run was stopped by Ctrl-C; the partial summary was still printed.
    Interrupted = 130,
}

impl ExitCode {
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    #[must_use]
    pub fn from_summary(summary: &reqbench_core::runner::Summary) -> Self {
        if summary.interrupted {
            Self::Interrupted
        } else {
            Self::Success
        }
    }
}
