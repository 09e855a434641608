#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,

    /// One or more thresholds failed.
    ThresholdsFailed = 11,

    /// Invalid CLI/profile/options (bad flags, invalid durations, invalid threshold syntax, etc.).
    InvalidInput = 30,

    /// Internal/runtime error (IO errors, task failures).
    RuntimeError = 40,
}

impl ExitCode {
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Failed checks are reported but only thresholds decide the exit status.
    #[must_use]
    pub fn from_thresholds(thresholds_passed: bool) -> Self {
        if thresholds_passed {
            Self::Success
        } else {
            Self::ThresholdsFailed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(ExitCode::Success.as_i32(), 0);
        assert_eq!(ExitCode::ThresholdsFailed.as_i32(), 11);
        assert_eq!(ExitCode::InvalidInput.as_i32(), 30);
        assert_eq!(ExitCode::RuntimeError.as_i32(), 40);
        assert_eq!(ExitCode::from_thresholds(false), ExitCode::ThresholdsFailed);
    }
}
