//! Builder for CacheRouter

use crate::config::RouterConfig;
use crate::events::EventManager;
use crate::http::Fetcher;
use crate::store::BucketStore;
use std::sync::Arc;

use super::CacheRouter;

/// Builder for creating a [`CacheRouter`] with a fluent API.
///
/// Without an explicit store, the router persists buckets under
/// `config.storage_dir` (`file-store` feature) or keeps them in memory.
pub struct CacheRouterBuilder {
    config: RouterConfig,
    fetcher: Arc<dyn Fetcher>,
    store: Option<Arc<dyn BucketStore>>,
    events: Option<Arc<EventManager>>,
}

impl CacheRouterBuilder {
    pub fn new(config: RouterConfig, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            config,
            fetcher,
            store: None,
            events: None,
        }
    }

    /// Use `store` for the buckets.
    pub fn store(self, store: impl BucketStore + 'static) -> Self {
        self.shared_store(Arc::new(store))
    }

    /// Share a store between workers, e.g. an old and a new version.
    pub fn shared_store(mut self, store: Arc<dyn BucketStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Share an event manager (typically the [`Registration`](super::Registration)'s).
    pub fn events(mut self, events: Arc<EventManager>) -> Self {
        self.events = Some(events);
        self
    }

    /// Build the [`CacheRouter`].
    pub fn build(self) -> CacheRouter {
        let store = self.store.unwrap_or_else(|| default_store(&self.config));
        let events = self.events.unwrap_or_default();
        CacheRouter::from_parts(self.config, store, self.fetcher, events)
    }
}

#[cfg(feature = "file-store")]
fn default_store(config: &RouterConfig) -> Arc<dyn BucketStore> {
    Arc::new(crate::store::FileStore::for_config(config))
}

#[cfg(not(feature = "file-store"))]
fn default_store(_config: &RouterConfig) -> Arc<dyn BucketStore> {
    Arc::new(crate::store::MemoryStore::new())
}
