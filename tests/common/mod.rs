//! Common test utilities for swcache integration tests
//!
//! Provides a scriptable network, a store that counts its calls, and a
//! fixture that builds an installed, active router.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use swcache::{
    BucketStore, CacheEntry, CacheRouter, Error, EventManager, Fetcher, MemoryStore, Request,
    Response, Result, RouterConfig, RouterConfigBuilder,
};
use tokio::sync::Notify;

pub const ORIGIN: &str = "https://bookie.test";

/// Absolute URL for a path on the test origin
pub fn url(path: &str) -> String {
    format!("{ORIGIN}{path}")
}

pub fn get(path: &str) -> Request {
    Request::get(&url(path)).expect("valid url")
}

pub fn navigate(path: &str) -> Request {
    Request::navigate(&url(path)).expect("valid url")
}

/// Route `log` output through the test harness (`RUST_LOG=debug` to see it)
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Config builder preset for the test origin
pub fn config(version: &str) -> RouterConfigBuilder {
    RouterConfig::builder("bookie", version)
        .scope(format!("{ORIGIN}/"))
        .offline_fallback("/offline.html")
}

// =============================================================================
// Mock Network
// =============================================================================

/// Scriptable network with a call counter
///
/// Unknown URLs answer `200` with body `"network:{url}"`.
#[derive(Default)]
pub struct MockFetcher {
    responses: Mutex<HashMap<String, Response>>,
    calls: AtomicUsize,
    log: Mutex<Vec<String>>,
    offline: AtomicBool,
    hang: AtomicBool,
    gate: Mutex<Option<Arc<Notify>>>,
}

impl MockFetcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, path: &str, response: Response) {
        self.responses.lock().unwrap().insert(url(path), response);
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Never answer (to exercise timeouts)
    pub fn set_hang(&self, hang: bool) {
        self.hang.store(hang, Ordering::SeqCst);
    }

    /// Hold every fetch until `gate` is notified
    pub fn set_gate(&self, gate: Arc<Notify>) {
        *self.gate.lock().unwrap() = Some(gate);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn calls_to(&self, path: &str) -> usize {
        let target = url(path);
        self.log.lock().unwrap().iter().filter(|u| **u == target).count()
    }

    pub fn reset_calls(&self) {
        self.calls.store(0, Ordering::SeqCst);
        self.log.lock().unwrap().clear();
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.log.lock().unwrap().push(request.url().to_string());

        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if self.hang.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::Network {
                url: request.url().to_string(),
                reason: "offline".into(),
            });
        }

        let scripted = self.responses.lock().unwrap().get(request.url()).cloned();
        Ok(scripted.unwrap_or_else(|| Response::ok(format!("network:{}", request.url()))))
    }
}

// =============================================================================
// Counting Store
// =============================================================================

/// `MemoryStore` wrapper that counts reads and writes
pub struct CountingStore {
    inner: MemoryStore,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl CountingStore {
    pub fn new(inner: MemoryStore) -> Arc<Self> {
        Arc::new(Self {
            inner,
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
        })
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn reset_counts(&self) {
        self.reads.store(0, Ordering::SeqCst);
        self.writes.store(0, Ordering::SeqCst);
    }

    fn read(&self) {
        self.reads.fetch_add(1, Ordering::SeqCst);
    }

    fn write(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}

impl BucketStore for CountingStore {
    fn open(&self, bucket: &str) -> Result<()> {
        self.write();
        self.inner.open(bucket)
    }

    fn has_bucket(&self, bucket: &str) -> Result<bool> {
        self.read();
        self.inner.has_bucket(bucket)
    }

    fn bucket_names(&self) -> Result<Vec<String>> {
        self.read();
        self.inner.bucket_names()
    }

    fn delete_bucket(&self, bucket: &str) -> Result<bool> {
        self.write();
        self.inner.delete_bucket(bucket)
    }

    fn lookup(&self, bucket: &str, url: &str) -> Result<Option<CacheEntry>> {
        self.read();
        self.inner.lookup(bucket, url)
    }

    fn put(&self, bucket: &str, entry: CacheEntry) -> Result<()> {
        self.write();
        self.inner.put(bucket, entry)
    }

    fn delete(&self, bucket: &str, url: &str) -> Result<bool> {
        self.write();
        self.inner.delete(bucket, url)
    }

    fn keys(&self, bucket: &str) -> Result<Vec<String>> {
        self.read();
        self.inner.keys(bucket)
    }

    fn len(&self, bucket: &str) -> Result<usize> {
        self.read();
        self.inner.len(bucket)
    }
}

// =============================================================================
// Test Fixture
// =============================================================================

/// An installed and activated router over a counting memory store
pub struct TestFixture {
    pub router: Arc<CacheRouter>,
    pub fetcher: Arc<MockFetcher>,
    pub store: Arc<CountingStore>,
    pub events: Arc<EventManager>,
}

impl TestFixture {
    /// Active router with the default policies
    pub async fn new() -> Self {
        Self::with_config(config("v1")).await
    }

    pub async fn with_config(builder: RouterConfigBuilder) -> Self {
        Self::with_store(builder, MemoryStore::new()).await
    }

    pub async fn with_store(builder: RouterConfigBuilder, store: MemoryStore) -> Self {
        init_logging();
        let fetcher = MockFetcher::new();
        fetcher.respond("/offline.html", Response::ok("You are offline"));
        let store = CountingStore::new(store);
        let events = Arc::new(EventManager::new());

        let router = CacheRouter::builder(builder.build().expect("valid config"), fetcher.clone())
            .shared_store(store.clone())
            .events(events.clone())
            .build();
        router.install().await.expect("install");
        router.activate().await.expect("activate");

        fetcher.reset_calls();
        store.reset_counts();

        Self {
            router: Arc::new(router),
            fetcher,
            store,
            events,
        }
    }

    /// Another, not yet installed, worker sharing the fixture's network,
    /// store and events
    pub fn worker(&self, version: &str) -> Arc<CacheRouter> {
        Arc::new(
            CacheRouter::builder(config(version).build().expect("valid config"), self.fetcher.clone())
                .shared_store(self.store.clone())
                .events(self.events.clone())
                .build(),
        )
    }

    /// Storage name of a bucket for the fixture's version
    pub fn bucket(&self, bucket: swcache::Bucket) -> String {
        self.router.config().storage_name(bucket)
    }

    /// Seed an entry directly into a bucket
    pub fn seed(&self, bucket: swcache::Bucket, path: &str, response: Response) {
        self.store
            .put(&self.bucket(bucket), CacheEntry::new(url(path), response))
            .unwrap();
    }

    pub fn cached(&self, bucket: swcache::Bucket, path: &str) -> Option<CacheEntry> {
        self.store.lookup(&self.bucket(bucket), &url(path)).unwrap()
    }
}
