use std::time::Duration;

use reqwest::StatusCode;

/// Classification of a single probe attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
    /// A response was received with any status other than 400 or 500.
    Success,
    /// The server answered 400 or 500.
    Failed,
    /// No response: connect, DNS, timeout or protocol failure.
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ProbeRecord {
    outcome: Outcome,
    elapsed: Duration,
}

#[cfg(test)]
impl Default for ProbeRecord {
    fn default() -> Self {
        Self::error()
    }
}

impl ProbeRecord {
    pub(crate) fn success(elapsed: Duration) -> Self {
        Self {
            outcome: Outcome::Success,
            elapsed,
        }
    }

    pub(crate) fn failed(elapsed: Duration) -> Self {
        Self {
            outcome: Outcome::Failed,
            elapsed,
        }
    }

    /// Errors are never timed, so the elapsed time stays at zero.
    pub(crate) fn error() -> Self {
        Self {
            outcome: Outcome::Error,
            elapsed: Duration::ZERO,
        }
    }

    pub(crate) fn classify(status: StatusCode, elapsed: Duration) -> Self {
        match status {
            StatusCode::BAD_REQUEST | StatusCode::INTERNAL_SERVER_ERROR => Self::failed(elapsed),
            _ => Self::success(elapsed),
        }
    }

    pub(crate) fn outcome(&self) -> Outcome {
        self.outcome
    }

    pub(crate) fn is_success(&self) -> bool {
        self.outcome == Outcome::Success
    }

    pub(crate) fn is_failed(&self) -> bool {
        self.outcome == Outcome::Failed
    }

    pub(crate) fn is_error(&self) -> bool {
        self.outcome == Outcome::Error
    }

    pub(crate) fn elapsed_secs(&self) -> f64 {
        self.elapsed.as_secs_f64()
    }
}
