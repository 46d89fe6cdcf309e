//! Admission error types.

use crate::RateLimitError;

/// Ways an admission wait can end without a slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum AdmissionErrorKind {
    /// The attempt budget ran out while the port stayed saturated
    #[display("Port '{}' still saturated after {} attempts: {}", port, attempts, error)]
    Exhausted {
        /// Port that never freed up
        port: String,
        /// Attempt counter at the moment of rejection
        attempts: u32,
        /// Error built by the configured factory
        error: RateLimitError,
    },
    /// The wait was cancelled before a slot opened
    #[display("Admission to port '{}' cancelled", port)]
    Cancelled {
        /// Port that was being waited on
        port: String,
    },
}

/// Admission error with location tracking.
///
/// # Examples
///
/// ```
/// use portgate_error::{AdmissionError, AdmissionErrorKind, RateLimitError};
///
/// let err = AdmissionError::new(AdmissionErrorKind::Exhausted {
///     port: "drive".to_string(),
///     attempts: 42,
///     error: RateLimitError::default(),
/// });
/// assert!(err.is_exhausted());
/// assert_eq!(err.rate_limit_error().map(|e| e.status_code), Some(403));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Admission Error: {} at line {} in {}", kind, line, file)]
pub struct AdmissionError {
    /// The kind of error that occurred
    pub kind: AdmissionErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl AdmissionError {
    /// Create a new admission error with automatic location tracking.
    #[track_caller]
    pub fn new(kind: AdmissionErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Get the error kind.
    pub fn kind(&self) -> &AdmissionErrorKind {
        &self.kind
    }

    /// True when the attempt budget was exhausted.
    pub fn is_exhausted(&self) -> bool {
        matches!(self.kind, AdmissionErrorKind::Exhausted { .. })
    }

    /// True when the wait was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self.kind, AdmissionErrorKind::Cancelled { .. })
    }

    /// The factory-built error, if the budget was exhausted.
    pub fn rate_limit_error(&self) -> Option<&RateLimitError> {
        match &self.kind {
            AdmissionErrorKind::Exhausted { error, .. } => Some(error),
            AdmissionErrorKind::Cancelled { .. } => None,
        }
    }

    /// Port the failed wait was for.
    pub fn port(&self) -> &str {
        match &self.kind {
            AdmissionErrorKind::Exhausted { port, .. } => port,
            AdmissionErrorKind::Cancelled { port } => port,
        }
    }
}

/// Result type for admission waits.
pub type AdmissionResult<T> = std::result::Result<T, AdmissionError>;
