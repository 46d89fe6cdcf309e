//! Deciding which operation failures count as upstream rate limits.

use portgate_error::{AdmissionError, RateLimitError};
use serde_json::Value as JsonValue;
use std::fmt;
use std::sync::Arc;

/// Error domain Google APIs report for quota rejections.
pub const USAGE_LIMITS_DOMAIN: &str = "usageLimits";

/// Status code the default classifier treats as a rate limit.
pub const FORBIDDEN_STATUS: u16 = 403;

/// Shape information the built-in classifiers look at.
///
/// Implement this for your operation's error type to use
/// [`Classifier::forbidden_status`] or [`Classifier::usage_limits`]. Both methods
/// default to `None`, so an implementation only provides what it knows.
///
/// # Example
///
/// ```
/// use portgate_limiter::{Classifier, UpstreamFailure};
///
/// struct ApiError {
///     status: u16,
/// }
///
/// impl UpstreamFailure for ApiError {
///     fn status_code(&self) -> Option<u16> {
///         Some(self.status)
///     }
/// }
///
/// let classifier = Classifier::<ApiError>::forbidden_status();
/// assert!(classifier.is_rate_limit(&ApiError { status: 403 }));
/// assert!(!classifier.is_rate_limit(&ApiError { status: 500 }));
/// ```
pub trait UpstreamFailure {
    /// Status code reported by the upstream, if any.
    fn status_code(&self) -> Option<u16> {
        None
    }

    /// Structured error body, expected to carry an `errors` array.
    fn error_details(&self) -> Option<&JsonValue> {
        None
    }
}

/// JSON errors read `statusCode` at the top level and use themselves as the body.
impl UpstreamFailure for JsonValue {
    fn status_code(&self) -> Option<u16> {
        self.get("statusCode")
            .and_then(JsonValue::as_u64)
            .and_then(|code| u16::try_from(code).ok())
    }

    fn error_details(&self) -> Option<&JsonValue> {
        Some(self)
    }
}

impl UpstreamFailure for RateLimitError {
    fn status_code(&self) -> Option<u16> {
        Some(self.status_code)
    }
}

/// An exhausted admission reports its factory error's status, so a supervisor
/// wrapping another supervisor sees the inner rejection as a rate limit.
impl UpstreamFailure for AdmissionError {
    fn status_code(&self) -> Option<u16> {
        self.rate_limit_error().map(|e| e.status_code)
    }
}

/// Predicate deciding whether a failure was an upstream rate limit.
///
/// # Example
///
/// ```
/// use portgate_limiter::Classifier;
/// use serde_json::json;
///
/// let google = Classifier::<serde_json::Value>::usage_limits();
/// assert!(google.is_rate_limit(&json!({"errors": [{"domain": "usageLimits"}]})));
/// assert!(!google.is_rate_limit(&json!({"errors": []})));
///
/// let custom = Classifier::new(|e: &String| e.contains("quota"));
/// assert!(custom.is_rate_limit(&"quota exceeded".to_string()));
/// ```
pub struct Classifier<E>(Arc<dyn Fn(&E) -> bool + Send + Sync>);

impl<E> Classifier<E> {
    /// Wrap an arbitrary predicate.
    pub fn new(predicate: impl Fn(&E) -> bool + Send + Sync + 'static) -> Self {
        Self(Arc::new(predicate))
    }

    /// Classifier that never retries.
    pub fn never() -> Self {
        Self::new(|_| false)
    }

    /// Apply the predicate.
    pub fn is_rate_limit(&self, failure: &E) -> bool {
        (self.0)(failure)
    }
}

impl<E: UpstreamFailure> Classifier<E> {
    /// Matches failures whose status code is exactly 403.
    pub fn forbidden_status() -> Self {
        Self::new(|failure: &E| failure.status_code() == Some(FORBIDDEN_STATUS))
    }

    /// Matches failures shaped `{ errors: [{ domain: "usageLimits" }, ..] }`.
    ///
    /// Only the first entry of `errors` is inspected.
    pub fn usage_limits() -> Self {
        Self::new(|failure: &E| {
            failure
                .error_details()
                .and_then(|body| body.get("errors"))
                .and_then(|errors| errors.get(0))
                .and_then(|first| first.get("domain"))
                .and_then(JsonValue::as_str)
                == Some(USAGE_LIMITS_DOMAIN)
        })
    }
}

impl<E> Clone for Classifier<E> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<E> fmt::Debug for Classifier<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Classifier(..)")
    }
}

/// Builds the error raised when a port stays saturated for the whole budget.
///
/// # Example
///
/// ```
/// use portgate_error::RateLimitError;
/// use portgate_limiter::ErrorFactory;
///
/// let factory = ErrorFactory::new(|| RateLimitError::new("DRIVE_BUSY", "Drive is busy", 429));
/// assert_eq!(factory.build().status_code, 429);
/// assert_eq!(ErrorFactory::default().build(), RateLimitError::default());
/// ```
#[derive(Clone)]
pub struct ErrorFactory(Arc<dyn Fn() -> RateLimitError + Send + Sync>);

impl ErrorFactory {
    /// Wrap a constructor.
    pub fn new(factory: impl Fn() -> RateLimitError + Send + Sync + 'static) -> Self {
        Self(Arc::new(factory))
    }

    /// Construct a fresh error.
    pub fn build(&self) -> RateLimitError {
        (self.0)()
    }
}

impl Default for ErrorFactory {
    fn default() -> Self {
        Self::new(RateLimitError::default)
    }
}

impl fmt::Debug for ErrorFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ErrorFactory(..)")
    }
}
