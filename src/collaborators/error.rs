use std::time::Duration;
use thiserror::Error;

/// Why a single collaborator call failed.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CallError {
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),
    #[error("call timed out after {0:?}")]
    Timeout(Duration),
    #[error("server error (HTTP {status})")]
    Server { status: u16 },
    #[error("request rejected (HTTP {status})")]
    Rejected { status: u16 },
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("cancelled by tick deadline")]
    Cancelled,
}

impl CallError {
    /// Upper bound on attempts for this kind of failure, given the policy's
    /// own limit. Malformed payloads get one retry at most, rejected
    /// requests and cancellations none.
    pub fn attempt_limit(&self, max_attempts: u32) -> u32 {
        match self {
            CallError::Unavailable(_) | CallError::Timeout(_) | CallError::Server { .. } => max_attempts,
            CallError::Malformed(_) => max_attempts.min(2),
            CallError::Rejected { .. } | CallError::Cancelled => 1,
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            CallError::Unavailable(_) => FailureKind::Unavailable,
            CallError::Timeout(_) => FailureKind::Timeout,
            CallError::Server { .. } => FailureKind::Server,
            CallError::Rejected { .. } => FailureKind::Rejected,
            CallError::Malformed(_) => FailureKind::Malformed,
            CallError::Cancelled => FailureKind::Cancelled,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Unavailable,
    Timeout,
    Server,
    Rejected,
    Malformed,
    Cancelled,
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum LocatorError {
    #[error("no endpoints registered for service {0}")]
    NoEndpoints(String),
    #[error("service locator unreachable: {0}")]
    Unreachable(String),
    #[error("service locator returned an unreadable answer: {0}")]
    Malformed(String),
}

impl From<LocatorError> for CallError {
    fn from(err: LocatorError) -> Self {
        CallError::Unavailable(err.to_string())
    }
}
