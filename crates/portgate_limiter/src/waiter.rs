//! Timed polling for a free gate slot.

use crate::{ErrorFactory, Gate, SlotPermit};
use portgate_error::{AdmissionError, AdmissionErrorKind, AdmissionResult};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

/// Where an admission wait stands after one poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdmissionState {
    /// No slot yet; poll again as attempt `n` after the check delay.
    Polling(u32),
    /// A slot was taken.
    Admitted,
    /// The budget is spent.
    Rejected,
}

/// Polls a gate until a slot frees up or the attempt budget is spent.
///
/// There is no wake-up on release: the waiter simply re-checks every
/// `check_delay`. A wait starting at attempt `n` makes at most
/// `max_attempts - n` sleeps, so worst-case latency is
/// `(max_attempts - n) * check_delay` and best case is immediate.
#[derive(Debug, Clone, Copy)]
pub struct AdmissionWaiter<'a> {
    gate: &'a Gate,
    max_attempts: u32,
    check_delay: Duration,
    error_factory: &'a ErrorFactory,
}

impl<'a> AdmissionWaiter<'a> {
    /// Create a waiter over `gate`.
    pub fn new(
        gate: &'a Gate,
        max_attempts: u32,
        check_delay: Duration,
        error_factory: &'a ErrorFactory,
    ) -> Self {
        Self {
            gate,
            max_attempts,
            check_delay,
            error_factory,
        }
    }

    /// Run one poll for `port` at `attempt`.
    ///
    /// Takes the slot on success, so an `Admitted` result must be paired with a
    /// release.
    pub fn tick(&self, port: &str, attempt: u32) -> AdmissionState {
        if self.gate.try_acquire(port) {
            AdmissionState::Admitted
        } else if attempt >= self.max_attempts {
            AdmissionState::Rejected
        } else {
            AdmissionState::Polling(attempt + 1)
        }
    }

    /// Wait for a slot on `port`, starting the attempt counter at `starting_attempt`.
    ///
    /// # Errors
    ///
    /// Returns `AdmissionErrorKind::Exhausted` carrying the factory-built error when
    /// the budget runs out, or `AdmissionErrorKind::Cancelled` when `cancel` fires
    /// first. Neither path holds a slot.
    #[instrument(skip(self, cancel), fields(namespace = %self.gate.namespace()))]
    pub async fn wait(
        &self,
        port: &str,
        starting_attempt: u32,
        cancel: Option<&CancellationToken>,
    ) -> AdmissionResult<SlotPermit<'a>> {
        let mut attempt = starting_attempt;
        loop {
            if cancel.is_some_and(CancellationToken::is_cancelled) {
                return Err(cancelled(port));
            }

            match self.tick(port, attempt) {
                AdmissionState::Admitted => {
                    debug!(attempt, "Admitted");
                    return Ok(SlotPermit::new(self.gate, port));
                }
                AdmissionState::Rejected => {
                    warn!(attempt, "Port still saturated, giving up");
                    return Err(AdmissionError::new(AdmissionErrorKind::Exhausted {
                        port: port.to_string(),
                        attempts: attempt,
                        error: self.error_factory.build(),
                    }));
                }
                AdmissionState::Polling(next) => {
                    debug!(attempt, delay = ?self.check_delay, "Port saturated, waiting");
                    match cancel {
                        Some(token) => {
                            tokio::select! {
                                _ = token.cancelled() => return Err(cancelled(port)),
                                _ = tokio::time::sleep(self.check_delay) => {}
                            }
                        }
                        None => tokio::time::sleep(self.check_delay).await,
                    }
                    attempt = next;
                }
            }
        }
    }
}

#[track_caller]
fn cancelled(port: &str) -> AdmissionError {
    AdmissionError::new(AdmissionErrorKind::Cancelled {
        port: port.to_string(),
    })
}
