//! Configuration structures for admission control.
//!
//! This module provides TOML-based configuration for supervisors. The configuration
//! system supports:
//! - Bundled defaults (include_str! from portgate.toml)
//! - User overrides (./portgate.toml or ~/.config/portgate/portgate.toml)
//! - Environment overrides (`PORTGATE__LIMITER__MAX_ATTEMPTS=10`)
//! - Automatic merging with later sources taking precedence

use crate::{Classifier, ErrorFactory, UpstreamFailure};
use config::{Config, Environment, File, FileFormat};
use derive_getters::Getters;
use portgate_cache::ClientCacheConfig;
use portgate_error::{BuilderError, BuilderErrorKind, ConfigError, PortgateError, PortgateResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, instrument};

/// Limits applied by a single supervisor.
///
/// # Example
///
/// ```toml
/// [limiter]
/// max_attempts = 42
/// max_repeat_attempts = 6
/// check_delay_ms = 1200
/// max_one_time_req = 6
/// client_field_name = "client"
/// ```
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Getters,
    derive_setters::Setters,
    derive_builder::Builder,
)]
#[setters(prefix = "with_")]
#[builder(default)]
pub struct LimiterConfig {
    /// Polling attempts before admission gives up
    #[serde(default = "default_max_attempts")]
    max_attempts: u32,

    /// Attempts left for the one retry after an upstream rate-limit failure
    #[serde(default = "default_max_repeat_attempts")]
    max_repeat_attempts: u32,

    /// Polling interval in milliseconds
    #[serde(default = "default_check_delay_ms")]
    check_delay_ms: u64,

    /// Concurrent in-flight calls allowed per port
    #[serde(default = "default_max_one_time_req")]
    max_one_time_req: usize,

    /// Field name the client handle is merged under by `Invocation::to_json`
    #[serde(default = "default_client_field_name")]
    client_field_name: String,

    /// Expiry settings for client handles
    #[serde(default)]
    cache: ClientCacheConfig,
}

fn default_max_attempts() -> u32 {
    42
}

fn default_max_repeat_attempts() -> u32 {
    6
}

fn default_check_delay_ms() -> u64 {
    1200
}

fn default_max_one_time_req() -> usize {
    6
}

fn default_client_field_name() -> String {
    "client".to_string()
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            max_repeat_attempts: default_max_repeat_attempts(),
            check_delay_ms: default_check_delay_ms(),
            max_one_time_req: default_max_one_time_req(),
            client_field_name: default_client_field_name(),
            cache: ClientCacheConfig::default(),
        }
    }
}

impl LimiterConfig {
    /// Creates a new limiter config builder.
    pub fn builder() -> LimiterConfigBuilder {
        LimiterConfigBuilder::default()
    }

    /// Polling interval as a duration.
    pub fn check_delay(&self) -> Duration {
        Duration::from_millis(self.check_delay_ms)
    }

    /// Attempt counter the retry cycle starts from.
    ///
    /// Leaves exactly `max_repeat_attempts` polls before rejection.
    pub fn retry_starting_attempt(&self) -> u32 {
        self.max_attempts.saturating_sub(self.max_repeat_attempts)
    }

    /// Worst-case admission latency for a wait starting at attempt zero.
    ///
    /// `None` when the product does not fit in a `Duration`.
    pub fn max_admission_wait(&self) -> Option<Duration> {
        self.check_delay().checked_mul(self.max_attempts)
    }

    /// Validates the limits.
    ///
    /// # Errors
    ///
    /// Returns an error if `max_attempts` or `max_one_time_req` is zero, if
    /// `max_repeat_attempts` exceeds `max_attempts`, or if `client_field_name`
    /// is empty.
    pub fn validate(&self) -> PortgateResult<()> {
        if self.max_attempts == 0 {
            return Err(invalid("max_attempts", "must be greater than zero"));
        }
        if self.max_repeat_attempts > self.max_attempts {
            return Err(invalid(
                "max_repeat_attempts",
                format!(
                    "must not exceed max_attempts ({}), got {}",
                    self.max_attempts, self.max_repeat_attempts
                ),
            ));
        }
        if self.max_one_time_req == 0 {
            return Err(invalid("max_one_time_req", "must be greater than zero"));
        }
        if self.client_field_name.is_empty() {
            return Err(invalid("client_field_name", "must not be empty"));
        }
        Ok(())
    }
}

#[track_caller]
fn invalid(field: &str, reason: impl Into<String>) -> PortgateError {
    BuilderError::new(BuilderErrorKind::InvalidField {
        field: field.to_string(),
        reason: reason.into(),
    })
    .into()
}

/// Everything needed to build a `CallSupervisor`.
///
/// `limits` is plain data and can come from a file; the classifier and the
/// error factory are code and are attached by the caller.
pub struct SupervisorConfig<E> {
    /// Numeric limits and client field name
    pub limits: LimiterConfig,
    /// Decides whether an operation failure was an upstream rate limit
    pub classifier: Classifier<E>,
    /// Builds the error raised when admission is exhausted
    pub error_factory: ErrorFactory,
}

impl<E> SupervisorConfig<E> {
    /// Pair limits with a classifier, using the default error factory.
    pub fn new(limits: LimiterConfig, classifier: Classifier<E>) -> Self {
        Self {
            limits,
            classifier,
            error_factory: ErrorFactory::default(),
        }
    }

    /// Replace the error factory.
    pub fn with_error_factory(mut self, error_factory: ErrorFactory) -> Self {
        self.error_factory = error_factory;
        self
    }
}

impl<E> Clone for SupervisorConfig<E> {
    fn clone(&self) -> Self {
        Self {
            limits: self.limits.clone(),
            classifier: self.classifier.clone(),
            error_factory: self.error_factory.clone(),
        }
    }
}

impl<E> std::fmt::Debug for SupervisorConfig<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupervisorConfig")
            .field("limits", &self.limits)
            .field("classifier", &self.classifier)
            .field("error_factory", &self.error_factory)
            .finish()
    }
}

impl<E: UpstreamFailure> Default for SupervisorConfig<E> {
    fn default() -> Self {
        Self::new(LimiterConfig::default(), Classifier::forbidden_status())
    }
}

/// Top-level portgate configuration.
///
/// Loads limiter settings from TOML files with a precedence system:
/// 1. Bundled defaults (include_str! from portgate.toml)
/// 2. User override (~/.config/portgate/portgate.toml, then ./portgate.toml)
/// 3. `PORTGATE__`-prefixed environment variables
///
/// # Example
///
/// ```no_run
/// use portgate_limiter::PortgateConfig;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = PortgateConfig::load()?;
/// let drive = config.for_instance("drive");
/// println!("drive slots: {}", drive.max_one_time_req());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, Default)]
pub struct PortgateConfig {
    /// Limits used by any supervisor without its own section
    #[serde(default)]
    pub limiter: LimiterConfig,

    /// Per-instance limits keyed by supervisor name
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub instances: HashMap<String, LimiterConfig>,
}

impl PortgateConfig {
    /// Load configuration from a specific file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<std::path::Path>) -> PortgateResult<Self> {
        debug!("Loading configuration from file");

        let path = path.as_ref();
        Config::builder()
            .add_source(File::from(path))
            .build()
            .map_err(|e| PortgateError::from(ConfigError::in_file(path, e)))?
            .try_deserialize()
            .map_err(|e| PortgateError::from(ConfigError::in_file(path, e)))
    }

    /// Load configuration with precedence: environment > current dir > home dir > bundled.
    ///
    /// User config files are optional and will be silently skipped if not found.
    #[instrument]
    pub fn load() -> PortgateResult<Self> {
        debug!("Loading configuration with precedence: env > current dir > home dir > bundled defaults");

        const DEFAULT_CONFIG: &str = include_str!("../../../portgate.toml");

        let mut builder =
            Config::builder().add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml));

        if let Some(home) = dirs::home_dir() {
            let home_config = home.join(".config/portgate/portgate.toml");
            builder = builder.add_source(File::from(home_config).required(false));
        }

        builder = builder
            .add_source(File::with_name("portgate").required(false))
            .add_source(
                Environment::with_prefix("PORTGATE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );

        builder
            .build()
            .map_err(|e| {
                PortgateError::from(ConfigError::new(format!(
                    "Failed to build configuration: {}",
                    e
                )))
            })?
            .try_deserialize()
            .map_err(|e| {
                PortgateError::from(ConfigError::new(format!(
                    "Failed to parse configuration: {}",
                    e
                )))
            })
    }

    /// Limits for the named supervisor, falling back to the shared `[limiter]` section.
    #[instrument(skip(self))]
    pub fn for_instance(&self, name: &str) -> LimiterConfig {
        match self.instances.get(name) {
            Some(limits) => {
                debug!("Using instance-specific limits");
                limits.clone()
            }
            None => self.limiter.clone(),
        }
    }

    /// Validate the shared limits and every instance section.
    pub fn validate(&self) -> PortgateResult<()> {
        self.limiter.validate()?;
        for (name, limits) in &self.instances {
            limits.validate().map_err(|e| {
                PortgateError::from(ConfigError::new(format!("Instance '{}': {}", name, e)))
            })?;
        }
        Ok(())
    }
}
