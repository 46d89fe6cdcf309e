//! Per-port admission control for calls to rate-limited APIs.
//!
//! A [`CallSupervisor`] keeps at most `max_one_time_req` calls in flight per
//! port. Callers beyond that poll for a slot every `check_delay_ms` until one
//! frees up or `max_attempts` polls have passed. When an admitted call fails
//! with an error the [`Classifier`] recognizes as an upstream rate limit, the
//! supervisor runs it once more with a reduced budget of `max_repeat_attempts`.
//!
//! ## Layers
//!
//! - [`Gate`] - bounded in-flight counter per port
//! - [`AdmissionWaiter`] - timed polling for a gate slot
//! - [`CallSupervisor`] - admission, client injection, release, retry
//! - [`SupervisorRegistry`] - one supervisor per name
//!
//! Client handles live in a [`portgate_cache::ClientRegistry`] owned by each
//! supervisor and are handed to operations through [`Invocation`].

mod classify;
mod config;
mod error;
mod gate;
mod registry;
mod supervisor;
mod waiter;

pub use classify::{
    Classifier, ErrorFactory, FORBIDDEN_STATUS, USAGE_LIMITS_DOMAIN, UpstreamFailure,
};
pub use config::{LimiterConfig, LimiterConfigBuilder, PortgateConfig, SupervisorConfig};
pub use error::CallError;
pub use gate::{Gate, Namespace, SlotPermit};
pub use registry::SupervisorRegistry;
pub use supervisor::{CallSupervisor, Invocation};
pub use waiter::{AdmissionState, AdmissionWaiter};
