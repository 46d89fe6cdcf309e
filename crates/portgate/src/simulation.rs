//! Synthetic traffic against a supervised port.

use derive_getters::Getters;
use portgate_error::PortgateResult;
use portgate_limiter::{
    CallSupervisor, Classifier, FORBIDDEN_STATUS, Invocation, LimiterConfig, SupervisorConfig,
};
use serde::Serialize;
use serde_json::{Value as JsonValue, json};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, instrument};

/// A burst of concurrent calls on one port.
///
/// Every call sleeps for `op_duration` while holding its slot. The first
/// `rate_limited` executions fail with a 403 body, which the supervisor's
/// classifier treats as an upstream rate limit.
///
/// # Example
///
/// ```
/// use portgate::{LimiterConfig, Simulation};
/// use std::time::Duration;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let limits = LimiterConfig::default()
///     .with_max_one_time_req(2)
///     .with_check_delay_ms(5);
/// let report = Simulation::new("drive", 4, Duration::from_millis(10))
///     .run(limits)
///     .await?;
///
/// assert_eq!(*report.succeeded(), 4);
/// assert!(*report.peak_in_flight() <= 2);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Getters, derive_setters::Setters)]
#[setters(prefix = "with_")]
pub struct Simulation {
    port: String,
    calls: usize,
    op_duration: Duration,
    rate_limited: usize,
}

impl Simulation {
    /// Simulate `calls` concurrent calls on `port`, none of them rate limited.
    pub fn new(port: impl Into<String>, calls: usize, op_duration: Duration) -> Self {
        Self {
            port: port.into(),
            calls,
            op_duration,
            rate_limited: 0,
        }
    }

    /// Run every call against a fresh supervisor built from `limits`.
    ///
    /// # Errors
    ///
    /// Returns an error if `limits` fails validation. Call failures are counted
    /// in the report, not returned.
    #[instrument(skip(self, limits), fields(port = %self.port, calls = self.calls))]
    pub async fn run(&self, limits: LimiterConfig) -> PortgateResult<SimulationReport> {
        let supervisor: CallSupervisor<String, JsonValue> =
            CallSupervisor::new(SupervisorConfig::new(limits, Classifier::forbidden_status()))?;
        supervisor.set_client(&self.port, format!("{}-client", self.port));

        let executions = AtomicUsize::new(0);
        let active = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);
        let supervisor = &supervisor;
        let (executions, active, peak) = (&executions, &active, &peak);
        let start = Instant::now();

        let calls = (0..self.calls).map(move |index| {
            supervisor.call(
                &self.port,
                move |invocation: Invocation<usize, String>| {
                    let rate_limited =
                        executions.fetch_add(1, Ordering::SeqCst) < self.rate_limited;
                    let op_duration = self.op_duration;
                    async move {
                        let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(op_duration).await;
                        active.fetch_sub(1, Ordering::SeqCst);

                        if rate_limited {
                            Err(json!({
                                "statusCode": FORBIDDEN_STATUS,
                                "call": invocation.args,
                            }))
                        } else {
                            Ok(invocation.args)
                        }
                    }
                },
                index,
            )
        });
        let outcomes = futures::future::join_all(calls).await;

        let mut report = SimulationReport {
            port: self.port.clone(),
            calls: self.calls,
            executions: executions.load(Ordering::SeqCst),
            succeeded: 0,
            failed: 0,
            exhausted: 0,
            peak_in_flight: peak.load(Ordering::SeqCst),
            elapsed_ms: start.elapsed().as_millis(),
        };
        for outcome in outcomes {
            match outcome {
                Ok(_) => report.succeeded += 1,
                Err(e) if e.is_exhausted() => report.exhausted += 1,
                Err(_) => report.failed += 1,
            }
        }

        info!(
            succeeded = report.succeeded,
            failed = report.failed,
            exhausted = report.exhausted,
            "Simulation finished"
        );
        Ok(report)
    }
}

/// What happened to a [`Simulation`]'s calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Getters)]
pub struct SimulationReport {
    port: String,
    calls: usize,
    /// Operation runs, including retries
    executions: usize,
    succeeded: usize,
    /// Calls whose operation failed, including a retry that was rate limited again
    failed: usize,
    /// Calls that never got a slot
    exhausted: usize,
    peak_in_flight: usize,
    elapsed_ms: u128,
}

impl fmt::Display for SimulationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "port:           {}", self.port)?;
        writeln!(f, "calls:          {}", self.calls)?;
        writeln!(f, "executions:     {}", self.executions)?;
        writeln!(f, "succeeded:      {}", self.succeeded)?;
        writeln!(f, "failed:         {}", self.failed)?;
        writeln!(f, "exhausted:      {}", self.exhausted)?;
        writeln!(f, "peak in flight: {}", self.peak_in_flight)?;
        write!(f, "elapsed:        {}ms", self.elapsed_ms)
    }
}
