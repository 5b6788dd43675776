//! # swcache - offline-first request cache router
//!
//! A library implementation of the caching half of a PWA service worker:
//! intercepted GET requests are classified into named buckets and answered
//! with a per-bucket strategy, while the buckets are kept bounded, versioned
//! and controllable from the page.
//!
//! ## Features
//!
//! - **Classification**: ordered `{matcher, bucket}` rules (API paths, images,
//!   fonts, scripts, styles, navigations, everything else) plus an
//!   always-fresh exclusion list
//! - **Strategies**: cache-first, network-first with timeout and offline
//!   document, stale-while-revalidate, network-only
//! - **Bounded buckets**: oldest-first eviction by entry count, lazy max-age
//!   staleness on read
//! - **Versioning**: install/activate lifecycle that purges buckets of older
//!   versions, with update notification and skip-waiting
//! - **Control channel**: typed `GET_VERSION` / `GET_CACHE_SIZES` /
//!   `CLEAR_CACHE` / `CLEAR_CACHE_BY_NAME` / `SKIP_WAITING` messages
//! - **Storage**: in-memory store (optional byte quota) or a persistent
//!   file-per-bucket store (`file-store` feature, default)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use swcache::{Bucket, CacheRouter, Fetcher, MemoryStore, Policy, Request, Response,
//!     RouterConfig, Strategy};
//!
//! struct Network;
//!
//! #[async_trait::async_trait]
//! impl Fetcher for Network {
//!     async fn fetch(&self, _request: &Request) -> swcache::Result<Response> {
//!         Ok(Response::ok("hello"))
//!     }
//! }
//!
//! # async fn run() -> swcache::Result<()> {
//! let config = RouterConfig::builder("bookie-pwa", "v2.1.0")
//!     .scope("https://bookie.example/")
//!     .offline_fallback("/offline.html")
//!     .policy(Bucket::Images, Policy::new(Strategy::CacheFirst).max_entries(200))
//!     .exclude(r"^/api/v1/telemetry")
//!     .build()?;
//!
//! let router = CacheRouter::builder(config, Arc::new(Network))
//!     .store(MemoryStore::new())
//!     .build();
//! router.install().await?;
//! router.activate().await?;
//!
//! let served = router
//!     .handle_fetch(&Request::get("https://bookie.example/img/logo.png")?)
//!     .await?;
//! println!("{:?} from {:?}", served.response.status, served.source);
//! # Ok(())
//! # }
//! ```
//!
//! ## Updates
//!
//! ```rust,no_run
//! # use std::sync::Arc;
//! # use swcache::*;
//! # async fn run(old: CacheRouter, new: CacheRouter) -> swcache::Result<()> {
//! let registration = Registration::new(Arc::new(EventManager::new()));
//! registration.events().on_update_available(|current, incoming| {
//!     println!("{incoming} is ready to replace {current}");
//! });
//!
//! registration.register(Arc::new(old)).await?; // activates at once
//! registration.register(Arc::new(new)).await?; // waits, fires the listener
//! registration.post_message(ControlRequest::SkipWaiting).await;
//! # Ok(())
//! # }
//! ```

// Core modules
mod error;
mod events;
pub mod http;
pub mod storage;
pub mod store;
mod strategy;
mod sync;

// Grouped modules
pub mod config;
pub mod router;

// Re-exports from core
pub use error::{Error, Result};
pub use events::{CacheEvent, EventCallback, EventKind, EventManager};
pub use http::{Destination, Fetcher, Method, Request, Response};
pub use storage::{JsonStorage, StorageBackend};
pub use store::{BucketStore, CacheEntry, MemoryStore};
pub use strategy::{DEFAULT_NETWORK_TIMEOUT, Strategy};

#[cfg(feature = "file-store")]
pub use store::FileStore;

// Re-exports from config
pub use config::{
    Bucket, BypassReason, Classification, Policy, RequestMatcher, RouteRule, RouterConfig,
    RouterConfigBuilder,
};

// Re-exports from router
pub use router::{
    CacheRouter, CacheRouterBuilder, CacheSizes, ControlChannel, ControlHandler, ControlReceiver,
    ControlReply, ControlRequest, Registration, Served, ServedFrom, WorkerState, control_channel,
};
