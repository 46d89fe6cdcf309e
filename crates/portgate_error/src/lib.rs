//! Error types for the portgate admission controller.
//!
//! This crate provides the foundation error types used throughout the portgate workspace.
//!
//! # Error Hierarchy
//!
//! All errors follow the `ErrorKind` + wrapper struct pattern for clean error handling:
//! - `*ErrorKind` enum defines specific error conditions
//! - `*Error` struct wraps the kind with source location tracking
//! - All errors use `#[track_caller]` for automatic location capture
//!
//! The one exception is [`RateLimitError`], the caller-configurable terminal error
//! raised when a port never frees up. It is a plain value so that error factories
//! can build it without caring about locations.
//!
//! # Examples
//!
//! ```
//! use portgate_error::{ConfigError, PortgateResult};
//!
//! fn load() -> PortgateResult<u32> {
//!     Err(ConfigError::new("max_attempts must be greater than zero"))?
//! }
//!
//! match load() {
//!     Ok(value) => println!("Got: {}", value),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod admission;
mod builder;
mod config;
mod error;
mod json;
mod rate_limit;

pub use admission::{AdmissionError, AdmissionErrorKind, AdmissionResult};
pub use builder::{BuilderError, BuilderErrorKind};
pub use config::ConfigError;
pub use error::{PortgateError, PortgateErrorKind, PortgateResult};
pub use json::JsonError;
pub use rate_limit::{
    DEFAULT_RATE_LIMIT_MESSAGE, DEFAULT_RATE_LIMIT_NAME, DEFAULT_RATE_LIMIT_STATUS,
    RateLimitError,
};
