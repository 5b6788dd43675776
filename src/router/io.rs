//! Network and store plumbing shared by the strategies and background tasks

use crate::config::Policy;
use crate::error::Result;
use crate::events::{CacheEvent, EventManager};
use crate::http::{Fetcher, Method, Request, Response};
use crate::store::{BucketStore, CacheEntry};

use log::{debug, info, warn};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Cheap-to-clone handle over everything a strategy touches
///
/// Background revalidation tasks get their own clone, so they can outlive the
/// request that spawned them.
#[derive(Clone)]
pub(crate) struct RouterIo {
    pub(crate) store: Arc<dyn BucketStore>,
    pub(crate) fetcher: Arc<dyn Fetcher>,
    pub(crate) events: Arc<EventManager>,
    online: Arc<AtomicBool>,
}

impl RouterIo {
    pub(crate) fn new(
        store: Arc<dyn BucketStore>,
        fetcher: Arc<dyn Fetcher>,
        events: Arc<EventManager>,
    ) -> Self {
        Self {
            store,
            fetcher,
            events,
            online: Arc::new(AtomicBool::new(true)),
        }
    }

    pub(crate) fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Fetch from the network, tracking connectivity from the outcome
    pub(crate) async fn fetch(&self, request: &Request) -> Result<Response> {
        match self.fetcher.fetch(request).await {
            Ok(response) => {
                self.set_online(true);
                Ok(response)
            }
            Err(err) => {
                if err.is_network_error() {
                    self.set_online(false);
                }
                Err(err)
            }
        }
    }

    fn set_online(&self, online: bool) {
        if self.online.swap(online, Ordering::SeqCst) != online {
            info!("Network is now {}", if online { "online" } else { "offline" });
            self.events
                .notify(&CacheEvent::ConnectivityChanged { online });
        }
    }

    /// Read an entry; store failures read as a miss
    pub(crate) fn read(&self, bucket: &str, url: &str) -> Option<CacheEntry> {
        match self.store.lookup(bucket, url) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Cache read from {bucket} failed for {url}: {e}");
                None
            }
        }
    }

    /// Best-effort write of a network response, followed by eviction
    ///
    /// Never fails: the caller already has the response to serve.
    pub(crate) fn write(&self, bucket: &str, policy: &Policy, request: &Request, response: &Response) {
        if request.method() != Method::Get || !response.is_cacheable() {
            return;
        }

        let url = request.url();
        if let Err(e) = self
            .store
            .put(bucket, CacheEntry::new(url, response.clone()))
        {
            warn!("Cache write to {bucket} failed for {url}: {e}");
            self.events.notify(&CacheEvent::WriteFailed {
                bucket: bucket.to_string(),
                url: url.to_string(),
                reason: e.to_string(),
            });
            return;
        }
        debug!("Cached {url} in {bucket}");
        self.evict(bucket, policy.max_entries);
    }

    /// Delete oldest entries until `bucket` holds at most `max_entries`
    pub(crate) fn evict(&self, bucket: &str, max_entries: usize) {
        let keys = match self.store.keys(bucket) {
            Ok(keys) => keys,
            Err(e) => {
                warn!("Could not list {bucket} for eviction: {e}");
                return;
            }
        };
        if keys.len() <= max_entries {
            return;
        }

        let excess = keys.len() - max_entries;
        for url in keys.into_iter().take(excess) {
            match self.store.delete(bucket, &url) {
                Ok(true) => {
                    debug!("Evicted {url} from {bucket}");
                    self.events.notify(&CacheEvent::Evicted {
                        bucket: bucket.to_string(),
                        url,
                    });
                }
                Ok(false) => {}
                Err(e) => warn!("Eviction of {url} from {bucket} failed: {e}"),
            }
        }
    }
}
