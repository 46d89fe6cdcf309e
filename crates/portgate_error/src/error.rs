//! Top-level error wrapper types.

use crate::{AdmissionError, BuilderError, ConfigError, JsonError};

/// Every error the portgate crates can raise on their own behalf.
///
/// Operation failures are not listed here; they travel untouched inside
/// the limiter's `CallError`.
///
/// # Examples
///
/// ```
/// use portgate_error::{ConfigError, PortgateError};
///
/// let err: PortgateError = ConfigError::new("bad file").into();
/// assert!(format!("{}", err).contains("Configuration Error"));
/// ```
#[derive(Debug, derive_more::From, derive_more::Display, derive_more::Error)]
pub enum PortgateErrorKind {
    /// Configuration error
    #[from(ConfigError)]
    Config(ConfigError),
    /// Builder error
    #[from(BuilderError)]
    Builder(BuilderError),
    /// Admission error
    #[from(AdmissionError)]
    Admission(AdmissionError),
    /// JSON merge error
    #[from(JsonError)]
    Json(JsonError),
}

/// Portgate error with kind discrimination.
///
/// # Examples
///
/// ```
/// use portgate_error::{PortgateErrorKind, PortgateResult, ConfigError};
///
/// fn might_fail() -> PortgateResult<()> {
///     Err(ConfigError::new("Missing field"))?
/// }
///
/// let err = might_fail().unwrap_err();
/// assert!(matches!(err.kind(), PortgateErrorKind::Config(_)));
/// ```
#[derive(Debug, derive_more::Display, derive_more::Error)]
#[display("Portgate Error: {}", _0)]
pub struct PortgateError(Box<PortgateErrorKind>);

impl PortgateError {
    /// Create a new error from a kind.
    pub fn new(kind: PortgateErrorKind) -> Self {
        Self(Box::new(kind))
    }

    /// Get the error kind.
    pub fn kind(&self) -> &PortgateErrorKind {
        &self.0
    }
}

// Generic From implementation for any type that converts to PortgateErrorKind
impl<T> From<T> for PortgateError
where
    T: Into<PortgateErrorKind>,
{
    fn from(err: T) -> Self {
        Self::new(err.into())
    }
}

/// Result type for portgate operations.
pub type PortgateResult<T> = std::result::Result<T, PortgateError>;
