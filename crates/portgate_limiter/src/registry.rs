//! Named supervisors shared across a process.

use crate::{CallSupervisor, SupervisorConfig};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use portgate_error::PortgateResult;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Hands out one supervisor per name, creating it on first request.
///
/// The first configuration registered under a name wins; later requests for the
/// same name get the existing instance and their configuration is ignored. Own
/// one registry at the composition root and pass it (or the supervisors it hands
/// out) to whatever needs them.
///
/// # Example
///
/// ```
/// use portgate_limiter::{LimiterConfig, SupervisorConfig, SupervisorRegistry};
/// use std::sync::Arc;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let registry: SupervisorRegistry<String, serde_json::Value> = SupervisorRegistry::new();
///
/// let first = registry.get_instance("drive", SupervisorConfig::default())?;
/// let narrow = SupervisorConfig {
///     limits: LimiterConfig::default().with_max_one_time_req(1),
///     ..SupervisorConfig::default()
/// };
/// let second = registry.get_instance("drive", narrow)?;
///
/// assert!(Arc::ptr_eq(&first, &second));
/// assert_eq!(*second.limits().max_one_time_req(), 6);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct SupervisorRegistry<C, E> {
    instances: DashMap<String, Arc<CallSupervisor<C, E>>>,
}

impl<C, E> SupervisorRegistry<C, E> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            instances: DashMap::new(),
        }
    }

    /// Supervisor registered under `name`, creating it from `config` if absent.
    ///
    /// # Errors
    ///
    /// Returns an error only when a new supervisor has to be built and `config`
    /// fails validation. Nothing is registered in that case.
    #[instrument(skip(self, config))]
    pub fn get_instance(
        &self,
        name: &str,
        config: SupervisorConfig<E>,
    ) -> PortgateResult<Arc<CallSupervisor<C, E>>>
    where
        C: Send + Sync + 'static,
    {
        if let Some(existing) = self.instances.get(name) {
            return Ok(Arc::clone(&existing));
        }

        match self.instances.entry(name.to_string()) {
            Entry::Occupied(entry) => Ok(Arc::clone(entry.get())),
            Entry::Vacant(entry) => {
                debug!("Registering new supervisor");
                let supervisor = Arc::new(CallSupervisor::new(config)?);
                entry.insert(Arc::clone(&supervisor));
                Ok(supervisor)
            }
        }
    }

    /// Supervisor registered under `name`, if any.
    pub fn get(&self, name: &str) -> Option<Arc<CallSupervisor<C, E>>> {
        self.instances.get(name).map(|entry| Arc::clone(&entry))
    }

    /// Names of every registered supervisor.
    pub fn names(&self) -> Vec<String> {
        self.instances.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Number of registered supervisors.
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    /// Check if no supervisor is registered.
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

impl<C, E> Default for SupervisorRegistry<C, E> {
    fn default() -> Self {
        Self::new()
    }
}
