use crate::error::{Error, Result};
use crate::store::{BucketStore, CacheEntry, Entries};
use crate::sync::RwLockExt;

use std::collections::HashMap;
use std::sync::RwLock;

struct MemoryState {
    buckets: HashMap<String, Entries>,
}

impl MemoryState {
    fn used_bytes(&self) -> usize {
        self.buckets.values().map(Entries::bytes).sum()
    }
}

/// In-process bucket store
///
/// Optionally enforces a byte quota across all buckets; a write that would
/// exceed it fails with `Error::QuotaExceeded`, like a full browser cache.
pub struct MemoryStore {
    quota: Option<usize>,
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            quota: None,
            state: RwLock::new(MemoryState {
                buckets: HashMap::new(),
            }),
        }
    }

    /// Store limited to `bytes` in total
    pub fn with_quota(bytes: usize) -> Self {
        Self {
            quota: Some(bytes),
            ..Self::new()
        }
    }

    /// Bytes currently stored across all buckets
    pub fn used_bytes(&self) -> usize {
        self.state
            .read_recovered()
            .map(|s| s.used_bytes())
            .unwrap_or(0)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BucketStore for MemoryStore {
    fn open(&self, bucket: &str) -> Result<()> {
        let mut state = self.state.write_recovered()?;
        state
            .buckets
            .entry(bucket.to_string())
            .or_insert_with(Entries::new);
        Ok(())
    }

    fn has_bucket(&self, bucket: &str) -> Result<bool> {
        Ok(self.state.read_recovered()?.buckets.contains_key(bucket))
    }

    fn bucket_names(&self) -> Result<Vec<String>> {
        let state = self.state.read_recovered()?;
        let mut names: Vec<String> = state.buckets.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    fn delete_bucket(&self, bucket: &str) -> Result<bool> {
        Ok(self.state.write_recovered()?.buckets.remove(bucket).is_some())
    }

    fn lookup(&self, bucket: &str, url: &str) -> Result<Option<CacheEntry>> {
        let state = self.state.read_recovered()?;
        Ok(state
            .buckets
            .get(bucket)
            .and_then(|entries| entries.get(url))
            .cloned())
    }

    fn put(&self, bucket: &str, entry: CacheEntry) -> Result<()> {
        let mut state = self.state.write_recovered()?;

        if let Some(quota) = self.quota {
            let replaced = state
                .buckets
                .get(bucket)
                .and_then(|entries| entries.get(&entry.url))
                .map_or(0, CacheEntry::size);
            let available = quota.saturating_sub(state.used_bytes() - replaced);
            if entry.size() > available {
                return Err(Error::QuotaExceeded {
                    needed: entry.size(),
                    available,
                });
            }
        }

        state
            .buckets
            .entry(bucket.to_string())
            .or_insert_with(Entries::new)
            .put(entry);
        Ok(())
    }

    fn delete(&self, bucket: &str, url: &str) -> Result<bool> {
        let mut state = self.state.write_recovered()?;
        Ok(state
            .buckets
            .get_mut(bucket)
            .and_then(|entries| entries.remove(url))
            .is_some())
    }

    fn keys(&self, bucket: &str) -> Result<Vec<String>> {
        let state = self.state.read_recovered()?;
        Ok(state.buckets.get(bucket).map(Entries::keys).unwrap_or_default())
    }

    fn len(&self, bucket: &str) -> Result<usize> {
        let state = self.state.read_recovered()?;
        Ok(state.buckets.get(bucket).map_or(0, Entries::len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Response;

    fn entry(url: &str, body: &str) -> CacheEntry {
        CacheEntry::new(url, Response::ok(body.to_string()))
    }

    #[test]
    fn test_put_creates_bucket() {
        let store = MemoryStore::new();
        store.put("app-images-v1", entry("/a.png", "a")).unwrap();

        assert!(store.has_bucket("app-images-v1").unwrap());
        assert_eq!(store.len("app-images-v1").unwrap(), 1);
        assert_eq!(
            store.lookup("app-images-v1", "/a.png").unwrap().unwrap().response.body,
            "a"
        );
    }

    #[test]
    fn test_missing_bucket_is_empty() {
        let store = MemoryStore::new();
        assert!(store.keys("nope").unwrap().is_empty());
        assert!(store.lookup("nope", "/a").unwrap().is_none());
        assert!(!store.delete("nope", "/a").unwrap());
        assert!(!store.delete_bucket("nope").unwrap());
    }

    #[test]
    fn test_bucket_names_sorted() {
        let store = MemoryStore::new();
        store.open("b").unwrap();
        store.open("a").unwrap();
        store.open("a").unwrap();
        assert_eq!(store.bucket_names().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn test_quota_exceeded() {
        let small = entry("/a", "x");
        let store = MemoryStore::with_quota(small.size() + 4);
        store.put("b", small).unwrap();

        let err = store.put("b", entry("/big", "0123456789")).unwrap_err();
        assert!(matches!(err, Error::QuotaExceeded { .. }));
        assert_eq!(store.len("b").unwrap(), 1);

        // replacing an entry only counts the difference
        store.put("b", entry("/a", "y")).unwrap();
    }
}
