//! Failures while loading or validating portgate configuration.

use std::path::Path;

/// A configuration layer could not be read, parsed, or accepted.
///
/// `message` names the offending source (a file path, an instance section) when
/// one is known; `line` and `file` point at the portgate code that gave up.
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Configuration Error: {} at line {} in {}", message, line, file)]
pub struct ConfigError {
    /// What went wrong, prefixed with the source when known
    pub message: String,
    /// Line of the call site that raised it
    pub line: u32,
    /// Source file of the call site that raised it
    pub file: &'static str,
}

impl ConfigError {
    /// Raise a configuration error at the caller's location.
    ///
    /// ```
    /// use portgate_error::ConfigError;
    ///
    /// let err = ConfigError::new("max_one_time_req must be greater than zero");
    /// assert!(err.message.contains("max_one_time_req"));
    /// ```
    #[track_caller]
    pub fn new(message: impl Into<String>) -> Self {
        let location = std::panic::Location::caller();
        Self {
            message: message.into(),
            line: location.line(),
            file: location.file(),
        }
    }

    /// Raise an error about one configuration file.
    ///
    /// ```
    /// use portgate_error::ConfigError;
    /// use std::path::Path;
    ///
    /// let err = ConfigError::in_file(Path::new("portgate.toml"), "unexpected key");
    /// assert_eq!(err.message, "portgate.toml: unexpected key");
    /// ```
    #[track_caller]
    pub fn in_file(path: &Path, reason: impl std::fmt::Display) -> Self {
        Self::new(format!("{}: {}", path.display(), reason))
    }
}
