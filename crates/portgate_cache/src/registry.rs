//! Port-to-client associations and per-port scratch data.

use crate::{ClientCacheConfig, TtlCache};
use serde_json::Value as JsonValue;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

/// Maps each port to the client handle injected into its calls.
///
/// The handle is opaque to the registry: an authenticated API client, a token,
/// anything cheap to clone (wrap heavy clients in `Arc`). Alongside handles the
/// registry keeps a small per-port data cache for values such as resolved folder
/// ids that callers want to reuse across calls to the same port.
///
/// Handles follow `config.std_ttl_secs`; data entries take an explicit TTL or fall
/// back to the same default.
///
/// # Example
///
/// ```
/// use portgate_cache::{ClientCacheConfig, ClientRegistry};
///
/// let registry: ClientRegistry<String> = ClientRegistry::new(ClientCacheConfig::default());
/// registry.set_client("drive", "token-abc".to_string());
/// assert!(registry.has_client("drive"));
/// assert_eq!(registry.client("drive").as_deref(), Some("token-abc"));
/// assert!(registry.client("gmail").is_none());
/// ```
#[derive(Debug)]
pub struct ClientRegistry<C> {
    config: ClientCacheConfig,
    clients: TtlCache<String, C>,
    data: TtlCache<(String, String), JsonValue>,
}

impl<C> ClientRegistry<C> {
    /// Create an empty registry.
    #[instrument(skip_all, fields(std_ttl_secs = ?config.std_ttl_secs()))]
    pub fn new(config: ClientCacheConfig) -> Self {
        debug!("Creating client registry");
        let ttl = config.std_ttl();
        Self {
            config,
            clients: TtlCache::new(ttl),
            data: TtlCache::new(ttl),
        }
    }

    /// Settings the registry was built with.
    pub fn config(&self) -> &ClientCacheConfig {
        &self.config
    }

    /// Bind `client` to `port`, replacing any previous handle and restarting its TTL.
    #[instrument(skip(self, client))]
    pub fn set_client(&self, port: &str, client: C) {
        debug!("Binding client handle to port");
        self.clients.insert(port.to_string(), client);
    }

    /// True when `port` has a live handle.
    pub fn has_client(&self, port: &str) -> bool {
        self.clients.contains(port)
    }

    /// Unbind the handle for `port`, returning it if it was still live.
    #[instrument(skip(self))]
    pub fn remove_client(&self, port: &str) -> Option<C> {
        debug!("Removing client handle");
        self.clients.remove(port)
    }

    /// Store a JSON value under `key` for `port`.
    ///
    /// `ttl` of `None` applies the registry's default TTL.
    #[instrument(skip(self, value))]
    pub fn set_data(&self, port: &str, key: &str, value: JsonValue, ttl: Option<Duration>) {
        let ttl = ttl.or(self.data.default_ttl());
        debug!(?ttl, "Caching port data");
        self.data
            .insert_with_ttl((port.to_string(), key.to_string()), value, ttl);
    }

    /// Fetch the value stored under `key` for `port`.
    pub fn data(&self, port: &str, key: &str) -> Option<JsonValue> {
        self.data.get(&(port.to_string(), key.to_string()))
    }

    /// Drop expired handles and data, returning how many entries were removed.
    pub fn purge_expired(&self) -> usize {
        let removed = self.clients.purge_expired() + self.data.purge_expired();
        if removed > 0 {
            tracing::info!(removed, "Purged expired registry entries");
        }
        removed
    }
}

impl<C: Clone> ClientRegistry<C> {
    /// Current handle for `port`, if one is bound and unexpired.
    pub fn client(&self, port: &str) -> Option<C> {
        self.clients.get(port)
    }
}

impl<C> ClientRegistry<C>
where
    C: Send + Sync + 'static,
{
    /// Spawn a task that purges expired entries every `check_period_secs`.
    ///
    /// Returns `None` when the period is zero or no TTL is configured. The task
    /// holds only a weak reference and stops when the registry is dropped or
    /// `cancel` fires.
    pub fn spawn_sweeper(self: &Arc<Self>, cancel: CancellationToken) -> Option<JoinHandle<()>> {
        let period = self.config.check_period()?;
        self.config.std_ttl()?;
        let registry: Weak<Self> = Arc::downgrade(self);
        debug!(?period, "Spawning registry sweeper");
        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let Some(registry) = registry.upgrade() else { break };
                        registry.purge_expired();
                    }
                }
            }
            debug!("Registry sweeper stopped");
        }))
    }
}

impl<C> Default for ClientRegistry<C> {
    fn default() -> Self {
        Self::new(ClientCacheConfig::default())
    }
}
