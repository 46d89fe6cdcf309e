//! The terminal error raised when a port never frees up.

/// Name carried by the default [`RateLimitError`].
pub const DEFAULT_RATE_LIMIT_NAME: &str = "RATE_LIMIT_EXCEEDED";

/// Message carried by the default [`RateLimitError`].
pub const DEFAULT_RATE_LIMIT_MESSAGE: &str =
    "Sorry, Due to high Requests, Limit is exceeded. Please, try again after some time.";

/// Status code carried by the default [`RateLimitError`].
pub const DEFAULT_RATE_LIMIT_STATUS: u16 = 403;

/// Error produced by a supervisor's error factory once the attempt budget runs out.
///
/// Callers that surface this to their own clients (an HTTP handler, say) can read the
/// name and status code directly instead of matching on message text.
///
/// # Examples
///
/// ```
/// use portgate_error::RateLimitError;
///
/// let err = RateLimitError::default();
/// assert_eq!(err.status_code, 403);
/// assert_eq!(err.name, "RATE_LIMIT_EXCEEDED");
///
/// let custom = RateLimitError::new("QUOTA", "Drive quota exhausted", 429);
/// assert!(format!("{}", custom).starts_with("QUOTA"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display, derive_more::Error)]
#[display("{}: {} (status {})", name, message, status_code)]
pub struct RateLimitError {
    /// Short machine-readable name
    pub name: String,
    /// Human-readable message
    pub message: String,
    /// Status code reported to upstream callers
    pub status_code: u16,
}

impl RateLimitError {
    /// Create a rate limit error with explicit fields.
    pub fn new(name: impl Into<String>, message: impl Into<String>, status_code: u16) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            status_code,
        }
    }
}

impl Default for RateLimitError {
    fn default() -> Self {
        Self::new(
            DEFAULT_RATE_LIMIT_NAME,
            DEFAULT_RATE_LIMIT_MESSAGE,
            DEFAULT_RATE_LIMIT_STATUS,
        )
    }
}
