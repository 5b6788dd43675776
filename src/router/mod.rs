//! The cache router: classification, strategies, lifecycle and control
//!
//! A [`CacheRouter`] is one versioned worker. Hosts create it with
//! [`CacheRouter::builder`], install and activate it (directly or through a
//! [`Registration`]), then pass every intercepted request to
//! [`CacheRouter::handle_fetch`].

mod builder;
mod channel;
mod io;
mod lifecycle;
mod messages;
mod registration;
mod strategies;

pub use builder::CacheRouterBuilder;
pub use channel::{ControlChannel, ControlHandler, ControlReceiver, control_channel};
pub use lifecycle::WorkerState;
pub use messages::{CacheSizes, ControlReply, ControlRequest};
pub use registration::Registration;

use crate::config::{Bucket, BypassReason, Classification, RouterConfig};
use crate::error::Result;
use crate::events::EventManager;
use crate::http::{Fetcher, Request, Response};
use crate::store::BucketStore;
use crate::sync::MutexExt;
use crate::strategy::Strategy;

use io::RouterIo;
use log::debug;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, RwLock, Weak};
use tokio::task::JoinHandle;

/// Where a served response came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServedFrom {
    Network,
    /// Cache entry within its max age
    Cache,
    /// Cache entry past its max age, served because the network failed
    /// (or, for stale-while-revalidate, while a refresh runs)
    StaleCache,
    /// The configured offline document
    OfflineFallback,
}

/// A response handed back to the page
#[derive(Debug, Clone)]
pub struct Served {
    pub response: Response,
    pub source: ServedFrom,
    pub classification: Classification,
}

/// One versioned cache worker
///
/// Must be used from within a tokio runtime: network-first races and
/// stale-while-revalidate refreshes run as spawned tasks.
pub struct CacheRouter {
    pub(crate) config: Arc<RouterConfig>,
    pub(crate) io: RouterIo,
    pub(crate) state: RwLock<WorkerState>,
    pub(crate) skip_waiting: AtomicBool,
    pub(crate) claimed: AtomicBool,
    pub(crate) owner: RwLock<Weak<Registration>>,
    background: Mutex<Vec<JoinHandle<()>>>,
}

impl CacheRouter {
    /// Start building a router for `config` on top of `fetcher`
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use std::sync::Arc;
    /// use swcache::{CacheRouter, Fetcher, MemoryStore, Request, Response, RouterConfig};
    ///
    /// struct Offline;
    ///
    /// #[async_trait::async_trait]
    /// impl Fetcher for Offline {
    ///     async fn fetch(&self, request: &Request) -> swcache::Result<Response> {
    ///         Err(swcache::Error::Network { url: request.url().into(), reason: "offline".into() })
    ///     }
    /// }
    ///
    /// # async fn run() -> swcache::Result<()> {
    /// let config = RouterConfig::builder("bookie-pwa", "v2.1.0").build()?;
    /// let router = CacheRouter::builder(config, Arc::new(Offline))
    ///     .store(MemoryStore::new())
    ///     .build();
    /// router.install().await?;
    /// router.activate().await?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn builder(config: RouterConfig, fetcher: Arc<dyn Fetcher>) -> CacheRouterBuilder {
        CacheRouterBuilder::new(config, fetcher)
    }

    pub(crate) fn from_parts(
        config: RouterConfig,
        store: Arc<dyn BucketStore>,
        fetcher: Arc<dyn Fetcher>,
        events: Arc<EventManager>,
    ) -> Self {
        debug!(
            "Created cache router {} (prefix {})",
            config.version, config.prefix
        );
        Self {
            config: Arc::new(config),
            io: RouterIo::new(store, fetcher, events),
            state: RwLock::new(WorkerState::Parsed),
            skip_waiting: AtomicBool::new(false),
            claimed: AtomicBool::new(false),
            owner: RwLock::new(Weak::new()),
            background: Mutex::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    pub fn version(&self) -> &str {
        &self.config.version
    }

    pub fn store(&self) -> &Arc<dyn BucketStore> {
        &self.io.store
    }

    /// Event manager for registering listeners
    pub fn events(&self) -> &Arc<EventManager> {
        &self.io.events
    }

    /// Last observed network reachability
    pub fn is_online(&self) -> bool {
        self.io.is_online()
    }

    /// Serve an intercepted request
    ///
    /// Only an active worker reads or writes its buckets. Any other state
    /// passes the request straight to the network, classified as
    /// `Bypass(Inactive)`.
    ///
    /// # Errors
    ///
    /// Returns the network error when neither the network nor the cache (nor,
    /// for navigations, the offline document) can answer.
    pub async fn handle_fetch(&self, request: &Request) -> Result<Served> {
        let state = self.state();
        let classification = if state == WorkerState::Active {
            self.config.classify(request)
        } else {
            debug!("{} passed through by {state} worker {}", request.url(), self.version());
            Classification::Bypass(BypassReason::Inactive)
        };
        let (response, source) = match classification {
            Classification::Bypass(reason) => {
                debug!("{} {} bypasses cache ({reason:?})", request.method(), request.url());
                self.network_only(request).await?
            }
            Classification::Cached(bucket) => self.route(request, bucket).await?,
        };
        Ok(Served {
            response,
            source,
            classification,
        })
    }

    async fn route(&self, request: &Request, bucket: Bucket) -> Result<(Response, ServedFrom)> {
        let policy = self.config.policy(bucket);
        let name = self.config.storage_name(bucket);
        debug!(
            "{} -> {bucket} ({})",
            request.url(),
            policy.strategy.name()
        );
        match policy.strategy {
            Strategy::CacheFirst => self.cache_first(request, &name, &policy).await,
            Strategy::NetworkFirst { timeout } => {
                self.network_first(request, &name, &policy, timeout).await
            }
            Strategy::StaleWhileRevalidate => {
                self.stale_while_revalidate(request, &name, &policy).await
            }
            Strategy::NetworkOnly => self.network_only(request).await,
        }
    }

    /// Keep a background task alive until [`wait_until_idle`](Self::wait_until_idle)
    pub(crate) fn track(&self, handle: JoinHandle<()>) {
        if let Ok(mut tasks) = self.background.lock_recovered() {
            tasks.retain(|h| !h.is_finished());
            tasks.push(handle);
        }
    }

    /// Wait for every background refresh started so far (and any they start)
    pub async fn wait_until_idle(&self) {
        loop {
            let pending = match self.background.lock_recovered() {
                Ok(mut tasks) => std::mem::take(&mut *tasks),
                Err(_) => return,
            };
            if pending.is_empty() {
                return;
            }
            for handle in pending {
                let _ = handle.await;
            }
        }
    }
}
