//! Error returned by supervised calls.

use crate::UpstreamFailure;
use portgate_error::AdmissionError;
use std::fmt;

/// Outcome of a failed `CallSupervisor::call`.
///
/// Operation failures are carried untouched so callers can match on their own
/// error type; admission failures come from the supervisor itself.
#[derive(Debug)]
pub enum CallError<E> {
    /// No slot opened within the attempt budget, or the wait was cancelled.
    Admission(AdmissionError),
    /// The operation failed (and was not retried, or failed again on retry).
    Operation(E),
}

impl<E> CallError<E> {
    /// True when admission ran out of attempts.
    pub fn is_exhausted(&self) -> bool {
        matches!(self, CallError::Admission(e) if e.is_exhausted())
    }

    /// True when the admission wait was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, CallError::Admission(e) if e.is_cancelled())
    }

    /// The admission error, if that is what this is.
    pub fn as_admission(&self) -> Option<&AdmissionError> {
        match self {
            CallError::Admission(e) => Some(e),
            CallError::Operation(_) => None,
        }
    }

    /// The operation's own error, if that is what this is.
    pub fn as_operation(&self) -> Option<&E> {
        match self {
            CallError::Admission(_) => None,
            CallError::Operation(e) => Some(e),
        }
    }

    /// Unwrap the operation's error, handing back admission errors unchanged.
    pub fn into_operation(self) -> Result<E, AdmissionError> {
        match self {
            CallError::Admission(e) => Err(e),
            CallError::Operation(e) => Ok(e),
        }
    }
}

impl<E: fmt::Display> fmt::Display for CallError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallError::Admission(e) => write!(f, "{}", e),
            CallError::Operation(e) => write!(f, "Operation failed: {}", e),
        }
    }
}

impl<E> std::error::Error for CallError<E>
where
    E: std::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CallError::Admission(e) => Some(e),
            CallError::Operation(e) => Some(e),
        }
    }
}

impl<E> From<AdmissionError> for CallError<E> {
    fn from(err: AdmissionError) -> Self {
        CallError::Admission(err)
    }
}

impl<E: UpstreamFailure> UpstreamFailure for CallError<E> {
    fn status_code(&self) -> Option<u16> {
        match self {
            CallError::Admission(e) => e.status_code(),
            CallError::Operation(e) => e.status_code(),
        }
    }

    fn error_details(&self) -> Option<&serde_json::Value> {
        match self {
            CallError::Admission(e) => e.error_details(),
            CallError::Operation(e) => e.error_details(),
        }
    }
}
