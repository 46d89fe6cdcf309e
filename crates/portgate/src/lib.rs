//! Portgate - per-port admission control for rate-limited APIs
//!
//! Portgate keeps a bounded number of calls in flight per logical "port" (one
//! upstream API, one account, one tenant) and absorbs a round of upstream rate
//! limiting with a single reduced-budget retry.
//!
//! # Quick Start
//!
//! ```rust
//! use portgate::{CallSupervisor, LimiterConfig, SupervisorConfig};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SupervisorConfig {
//!     limits: LimiterConfig::default().with_max_one_time_req(2),
//!     ..SupervisorConfig::default()
//! };
//! let supervisor: CallSupervisor<String, serde_json::Value> = CallSupervisor::new(config)?;
//! supervisor.set_client("drive", "token-abc".to_string());
//!
//! let files = supervisor
//!     .call(
//!         "drive",
//!         |invocation| async move { Ok(vec![invocation.args.to_string()]) },
//!         "root",
//!     )
//!     .await
//!     .map_err(|e| e.to_string())?;
//! assert_eq!(files, vec!["root".to_string()]);
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - `portgate_error` - Error types
//! - `portgate_cache` - TTL cache and per-port client registry
//! - `portgate_limiter` - Gates, admission waiting, supervised calls, configuration
//!
//! This crate re-exports all of them and adds tracing setup and a traffic
//! simulator used by the `portgate` binary.

pub use portgate_cache::*;
pub use portgate_error::*;
pub use portgate_limiter::*;

mod simulation;
mod telemetry;

pub use simulation::{Simulation, SimulationReport};
pub use telemetry::{init_console_tracing, init_json_tracing};
