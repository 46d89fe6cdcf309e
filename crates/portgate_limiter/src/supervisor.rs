//! Supervised calls: admission, client injection, release, and one rate-limit retry.

use crate::{
    AdmissionWaiter, CallError, Classifier, ErrorFactory, Gate, LimiterConfig, Namespace,
    SupervisorConfig,
};
use portgate_cache::ClientRegistry;
use portgate_error::{AdmissionResult, JsonError, PortgateResult};
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

/// What a supervised operation receives on each execution.
///
/// `args` is a fresh clone of the caller's arguments; `client` is whatever handle
/// was bound to the port when the execution was admitted.
#[derive(Debug, Clone)]
pub struct Invocation<A, C> {
    /// Caller-supplied arguments
    pub args: A,
    /// Client handle bound to the port, if any
    pub client: Option<C>,
    client_field: Arc<str>,
}

impl<A, C> Invocation<A, C> {
    /// Name the client is merged under by [`to_json`](Self::to_json).
    pub fn client_field(&self) -> &str {
        &self.client_field
    }

    /// Split into arguments and client.
    pub fn into_parts(self) -> (A, Option<C>) {
        (self.args, self.client)
    }
}

impl<A: Serialize, C: Serialize> Invocation<A, C> {
    /// Merge the client into the arguments as `{ ...args, <client_field>: client }`.
    ///
    /// Unit-like arguments (`null`) merge into an empty object; a missing client
    /// is written as `null`.
    ///
    /// # Errors
    ///
    /// Returns an error if either side fails to serialize or the arguments are not
    /// a JSON object.
    pub fn to_json(&self) -> Result<JsonValue, JsonError> {
        let mut merged = match serde_json::to_value(&self.args)? {
            JsonValue::Object(map) => map,
            JsonValue::Null => serde_json::Map::new(),
            other => {
                return Err(JsonError::new(format!(
                    "call arguments must serialize to an object, got {}",
                    other
                )));
            }
        };
        merged.insert(
            self.client_field.to_string(),
            serde_json::to_value(&self.client)?,
        );
        Ok(JsonValue::Object(merged))
    }
}

/// Throttles calls per port and absorbs one round of upstream rate limiting.
///
/// Each `call` waits until its port has a free request slot, runs the operation
/// with the port's client handle, and releases the slot however the operation
/// ends. If the operation fails and the classifier calls it a rate limit, the
/// whole cycle runs once more with the attempt counter starting at
/// `max_attempts - max_repeat_attempts`. A second failure of any kind is returned
/// as is.
///
/// # Example
///
/// ```
/// use portgate_limiter::{CallSupervisor, SupervisorConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let supervisor: CallSupervisor<String, serde_json::Value> =
///     CallSupervisor::new(SupervisorConfig::default())?;
/// supervisor.set_client("drive", "token-abc".to_string());
///
/// let listed = supervisor
///     .call(
///         "drive",
///         |invocation| async move {
///             let client = invocation.client.unwrap_or_default();
///             Ok::<_, serde_json::Value>(format!("{} listed {}", client, invocation.args))
///         },
///         "root",
///     )
///     .await
///     .map_err(|e| e.to_string())?;
/// assert_eq!(listed, "token-abc listed root");
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct CallSupervisor<C, E> {
    limits: LimiterConfig,
    classifier: Classifier<E>,
    error_factory: ErrorFactory,
    client_field: Arc<str>,
    requests: Gate,
    background: Gate,
    clients: Arc<ClientRegistry<C>>,
    sweeper: CancellationToken,
    sweeping: AtomicBool,
}

impl<C, E> CallSupervisor<C, E>
where
    C: Send + Sync + 'static,
{
    /// Build a supervisor from validated configuration.
    ///
    /// When called inside a Tokio runtime with both `cache.std_ttl_secs` and
    /// `cache.check_period_secs` set, this also starts the client registry
    /// sweeper (see [`start_sweeper`](Self::start_sweeper)).
    ///
    /// # Errors
    ///
    /// Returns an error if the limits fail [`LimiterConfig::validate`].
    #[instrument(skip_all, fields(
        max_attempts = config.limits.max_attempts(),
        max_one_time_req = config.limits.max_one_time_req(),
    ))]
    pub fn new(config: SupervisorConfig<E>) -> PortgateResult<Self> {
        config.limits.validate()?;
        debug!("Creating call supervisor");

        let SupervisorConfig {
            limits,
            classifier,
            error_factory,
        } = config;
        let capacity = *limits.max_one_time_req();
        let supervisor = Self {
            client_field: Arc::from(limits.client_field_name().as_str()),
            requests: Gate::new(Namespace::Request, capacity),
            background: Gate::new(Namespace::Background, capacity),
            clients: Arc::new(ClientRegistry::new(limits.cache().clone())),
            limits,
            classifier,
            error_factory,
            sweeper: CancellationToken::new(),
            sweeping: AtomicBool::new(false),
        };
        supervisor.start_sweeper();
        Ok(supervisor)
    }

    /// Start purging expired client handles and port data every
    /// `cache.check_period_secs`.
    ///
    /// Returns `false` without spawning when a sweeper is already running, no
    /// TTL or period is configured, or there is no Tokio runtime to spawn on.
    /// The sweeper stops when the supervisor is dropped.
    pub fn start_sweeper(&self) -> bool {
        if tokio::runtime::Handle::try_current().is_err() {
            debug!("No runtime, client sweeper not started");
            return false;
        }
        if self.sweeping.swap(true, Ordering::SeqCst) {
            return false;
        }
        let started = self
            .clients
            .spawn_sweeper(self.sweeper.child_token())
            .is_some();
        if !started {
            self.sweeping.store(false, Ordering::SeqCst);
        }
        started
    }
}

impl<C, E> CallSupervisor<C, E> {
    /// True while a client registry sweeper runs for this supervisor.
    pub fn is_sweeping(&self) -> bool {
        self.sweeping.load(Ordering::SeqCst)
    }

    /// Limits this supervisor enforces.
    pub fn limits(&self) -> &LimiterConfig {
        &self.limits
    }

    /// Client registry backing handle injection.
    pub fn clients(&self) -> &Arc<ClientRegistry<C>> {
        &self.clients
    }

    /// Gate for one namespace.
    pub fn gate(&self, namespace: Namespace) -> &Gate {
        match namespace {
            Namespace::Request => &self.requests,
            Namespace::Background => &self.background,
        }
    }

    /// Slots in use for `port` in `namespace`.
    pub fn in_flight(&self, namespace: Namespace, port: &str) -> usize {
        self.gate(namespace).in_flight(port)
    }

    /// Start tracking `port` in both namespaces. Idempotent.
    pub fn register_key(&self, port: &str) {
        self.requests.register(port);
        self.background.register(port);
    }

    /// Bind the client handle injected into calls on `port`.
    pub fn set_client(&self, port: &str, client: C) {
        self.clients.set_client(port, client);
    }

    /// True when `port` has a live client handle.
    pub fn has_client(&self, port: &str) -> bool {
        self.clients.has_client(port)
    }

    /// Store per-port data alongside the client handle.
    pub fn set_data(&self, port: &str, key: &str, value: JsonValue, ttl: Option<Duration>) {
        self.clients.set_data(port, key, value, ttl);
    }

    /// Fetch per-port data.
    pub fn data(&self, port: &str, key: &str) -> Option<JsonValue> {
        self.clients.data(port, key)
    }

    fn waiter(&self, namespace: Namespace) -> AdmissionWaiter<'_> {
        AdmissionWaiter::new(
            self.gate(namespace),
            *self.limits.max_attempts(),
            self.limits.check_delay(),
            &self.error_factory,
        )
    }

    /// Wait for a background slot on `port` and keep it until [`release_key`](Self::release_key).
    ///
    /// # Errors
    ///
    /// Returns an exhausted admission error when no slot opens in time. Nothing is
    /// held in that case, so no release is needed.
    pub async fn acquire_key(&self, port: &str) -> AdmissionResult<()> {
        self.acquire_background(port, None).await
    }

    /// Like [`acquire_key`](Self::acquire_key), stopping early when `cancel` fires.
    pub async fn acquire_key_with_cancel(
        &self,
        port: &str,
        cancel: &CancellationToken,
    ) -> AdmissionResult<()> {
        self.acquire_background(port, Some(cancel)).await
    }

    async fn acquire_background(
        &self,
        port: &str,
        cancel: Option<&CancellationToken>,
    ) -> AdmissionResult<()> {
        self.register_key(port);
        let permit = self.waiter(Namespace::Background).wait(port, 0, cancel).await?;
        permit.detach();
        Ok(())
    }

    /// Return a background slot taken by [`acquire_key`](Self::acquire_key).
    pub fn release_key(&self, port: &str) {
        self.background.release(port);
    }
}

impl<C: Clone, E> CallSupervisor<C, E> {
    /// Current client handle for `port`.
    pub fn client(&self, port: &str) -> Option<C> {
        self.clients.client(port)
    }

    /// Run `operation` on `port` under admission control.
    ///
    /// The operation may run twice: once, and once more if its failure is
    /// classified as an upstream rate limit.
    ///
    /// # Errors
    ///
    /// `CallError::Admission` when no slot opened within the budget (on the first
    /// pass or the retry), `CallError::Operation` with the operation's own error
    /// otherwise.
    #[instrument(skip(self, operation, args))]
    pub async fn call<A, T, F, Fut>(
        &self,
        port: &str,
        operation: F,
        args: A,
    ) -> Result<T, CallError<E>>
    where
        A: Clone,
        F: Fn(Invocation<A, C>) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.run(port, operation, args, None).await
    }

    /// Like [`call`](Self::call), abandoning the admission wait when `cancel` fires.
    ///
    /// Cancellation only interrupts waiting; an operation that has started runs to
    /// completion.
    #[instrument(skip(self, operation, args, cancel))]
    pub async fn call_with_cancel<A, T, F, Fut>(
        &self,
        port: &str,
        operation: F,
        args: A,
        cancel: &CancellationToken,
    ) -> Result<T, CallError<E>>
    where
        A: Clone,
        F: Fn(Invocation<A, C>) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.run(port, operation, args, Some(cancel)).await
    }

    async fn run<A, T, F, Fut>(
        &self,
        port: &str,
        operation: F,
        args: A,
        cancel: Option<&CancellationToken>,
    ) -> Result<T, CallError<E>>
    where
        A: Clone,
        F: Fn(Invocation<A, C>) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.register_key(port);

        let mut starting_attempt = 0;
        let mut retried = false;
        loop {
            let permit = self
                .waiter(Namespace::Request)
                .wait(port, starting_attempt, cancel)
                .await?;

            let invocation = Invocation {
                args: args.clone(),
                client: self.clients.client(port),
                client_field: Arc::clone(&self.client_field),
            };
            let outcome = operation(invocation).await;
            drop(permit);

            match outcome {
                Ok(value) => return Ok(value),
                Err(failure) if !retried && self.classifier.is_rate_limit(&failure) => {
                    starting_attempt = self.limits.retry_starting_attempt();
                    retried = true;
                    warn!(
                        starting_attempt,
                        remaining = *self.limits.max_repeat_attempts(),
                        "Upstream rate limit, retrying with reduced budget"
                    );
                }
                Err(failure) => return Err(CallError::Operation(failure)),
            }
        }
    }
}

impl<C, E> Drop for CallSupervisor<C, E> {
    fn drop(&mut self) {
        self.sweeper.cancel();
    }
}
