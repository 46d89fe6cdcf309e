//! Client handle storage with optional TTL expiry.
//!
//! This crate holds the association between a port and the opaque client handle
//! that portgate injects into every call made through that port. Entries may be
//! given a time-to-live, after which they read as absent.

#![warn(missing_docs)]

mod config;
mod registry;
mod store;

pub use config::{ClientCacheConfig, ClientCacheConfigBuilder};
pub use registry::ClientRegistry;
pub use store::{CacheEntry, TtlCache};
