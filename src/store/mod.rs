//! Cache storage: named buckets of URL-keyed responses
//!
//! [`BucketStore`] is the router's view of the browser's Cache Storage: a set of
//! named buckets, each an insertion-ordered map from URL to stored response.
//! Writing an existing key moves it to the newest position; reads never
//! reorder. Eviction policy lives in the router, not here.

mod memory;

#[cfg(feature = "file-store")]
mod file;

pub use memory::MemoryStore;

#[cfg(feature = "file-store")]
pub use file::FileStore;

use crate::error::Result;
use crate::http::Response;
use lru::LruCache;
use std::time::Duration;
use time::OffsetDateTime;

/// A stored response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub url: String,
    pub response: Response,
    pub stored_at: OffsetDateTime,
}

impl CacheEntry {
    /// New entry stamped with the current time
    pub fn new(url: impl Into<String>, response: Response) -> Self {
        Self {
            url: url.into(),
            response,
            stored_at: OffsetDateTime::now_utc(),
        }
    }

    #[must_use]
    pub fn stored_at(mut self, stored_at: OffsetDateTime) -> Self {
        self.stored_at = stored_at;
        self
    }

    /// Age at `now`; entries from the future count as brand new
    pub fn age(&self, now: OffsetDateTime) -> Duration {
        let age = now - self.stored_at;
        if age.is_negative() {
            Duration::ZERO
        } else {
            age.unsigned_abs()
        }
    }

    pub fn is_expired(&self, max_age: Duration, now: OffsetDateTime) -> bool {
        self.age(now) > max_age
    }

    pub fn size(&self) -> usize {
        self.url.len() + self.response.size()
    }
}

/// Storage abstraction for cache buckets
///
/// Every call is atomic per key; concurrent writers to the same key race and
/// the last write wins.
pub trait BucketStore: Send + Sync {
    /// Create the bucket if it does not exist
    fn open(&self, bucket: &str) -> Result<()>;

    fn has_bucket(&self, bucket: &str) -> Result<bool>;

    /// Names of all existing buckets, sorted
    fn bucket_names(&self) -> Result<Vec<String>>;

    /// Delete a whole bucket; `Ok(false)` if it did not exist
    fn delete_bucket(&self, bucket: &str) -> Result<bool>;

    /// Look up an entry without changing its position
    fn lookup(&self, bucket: &str, url: &str) -> Result<Option<CacheEntry>>;

    /// Insert or refresh an entry, creating the bucket on demand
    fn put(&self, bucket: &str, entry: CacheEntry) -> Result<()>;

    /// Delete one entry; `Ok(false)` if absent
    fn delete(&self, bucket: &str, url: &str) -> Result<bool>;

    /// Keys of a bucket, oldest first; empty for a missing bucket
    fn keys(&self, bucket: &str) -> Result<Vec<String>>;

    fn len(&self, bucket: &str) -> Result<usize> {
        Ok(self.keys(bucket)?.len())
    }
}

/// Insertion-ordered entries of one bucket
///
/// Backed by an unbounded `LruCache` used purely for ordering: `put` moves a
/// key to the newest end and lookups use `peek` so reads never reorder.
pub(crate) struct Entries {
    inner: LruCache<String, CacheEntry>,
    bytes: usize,
}

impl Entries {
    pub(crate) fn new() -> Self {
        Self {
            inner: LruCache::unbounded(),
            bytes: 0,
        }
    }

    pub(crate) fn from_oldest_first(entries: impl IntoIterator<Item = CacheEntry>) -> Self {
        let mut list = Self::new();
        for entry in entries {
            list.put(entry);
        }
        list
    }

    /// Independent copy with the same order
    pub(crate) fn duplicate(&self) -> Self {
        Self::from_oldest_first(self.oldest_first().cloned())
    }

    pub(crate) fn get(&self, url: &str) -> Option<&CacheEntry> {
        self.inner.peek(url)
    }

    /// Returns the replaced entry, if any
    pub(crate) fn put(&mut self, entry: CacheEntry) -> Option<CacheEntry> {
        self.bytes += entry.size();
        let old = self.inner.put(entry.url.clone(), entry);
        if let Some(old) = &old {
            self.bytes = self.bytes.saturating_sub(old.size());
        }
        old
    }

    pub(crate) fn remove(&mut self, url: &str) -> Option<CacheEntry> {
        let removed = self.inner.pop(url);
        if let Some(entry) = &removed {
            self.bytes = self.bytes.saturating_sub(entry.size());
        }
        removed
    }

    pub(crate) fn keys(&self) -> Vec<String> {
        self.inner.iter().rev().map(|(k, _)| k.clone()).collect()
    }

    pub(crate) fn oldest_first(&self) -> impl Iterator<Item = &CacheEntry> {
        self.inner.iter().rev().map(|(_, v)| v)
    }

    pub(crate) fn len(&self) -> usize {
        self.inner.len()
    }

    pub(crate) fn bytes(&self) -> usize {
        self.bytes
    }
}
