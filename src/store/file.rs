use crate::config::RouterConfig;
use crate::error::{Error, Result};
use crate::http::Response;
use crate::storage::{JsonStorage, StorageBackend};
use crate::store::{BucketStore, CacheEntry, Entries};
use crate::sync::RwLockExt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;
use time::OffsetDateTime;

/// Serialized form of a [`CacheEntry`]
#[derive(Serialize, Deserialize)]
struct StoredEntry {
    url: String,
    status: u16,
    #[serde(default)]
    headers: Vec<(String, String)>,
    /// base64
    body: String,
    #[serde(with = "time::serde::rfc3339")]
    stored_at: OffsetDateTime,
}

impl From<&CacheEntry> for StoredEntry {
    fn from(entry: &CacheEntry) -> Self {
        Self {
            url: entry.url.clone(),
            status: entry.response.status,
            headers: entry.response.headers.clone(),
            body: STANDARD.encode(&entry.response.body),
            stored_at: entry.stored_at,
        }
    }
}

impl TryFrom<StoredEntry> for CacheEntry {
    type Error = Error;

    fn try_from(stored: StoredEntry) -> Result<Self> {
        let body = STANDARD
            .decode(stored.body.as_bytes())
            .map_err(|e| Error::Parse(format!("bad body for '{}': {e}", stored.url)))?;
        Ok(CacheEntry {
            url: stored.url,
            response: Response {
                status: stored.status,
                headers: stored.headers,
                body: body.into(),
            },
            stored_at: stored.stored_at,
        })
    }
}

/// Persistent bucket store: one file per bucket under a root directory
///
/// Each file holds the bucket's entries oldest first, so insertion order
/// survives restarts. Buckets are loaded lazily on first access and the whole
/// file is rewritten after each mutation; a mutation whose file write fails
/// is not applied.
///
/// All calls do blocking `std::fs` I/O on the calling thread. Hosts that
/// serve many requests from a multi-threaded runtime should keep buckets
/// small or wrap the store in their own `spawn_blocking` adapter.
pub struct FileStore<S: StorageBackend = JsonStorage> {
    root: PathBuf,
    storage: S,
    loaded: RwLock<HashMap<String, Entries>>,
}

impl FileStore<JsonStorage> {
    /// File store rooted at `config.storage_dir`
    pub fn for_config(config: &RouterConfig) -> Self {
        let storage = if config.pretty_json {
            JsonStorage::new()
        } else {
            JsonStorage::compact()
        };
        Self::new(config.storage_dir.clone(), storage)
    }
}

impl<S: StorageBackend> FileStore<S> {
    pub fn new(root: impl Into<PathBuf>, storage: S) -> Self {
        Self {
            root: root.into(),
            storage,
            loaded: RwLock::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &std::path::Path {
        &self.root
    }

    fn file_path(&self, bucket: &str) -> Result<PathBuf> {
        if bucket.is_empty()
            || bucket.starts_with('.')
            || bucket.contains(['/', '\\'])
        {
            return Err(Error::Config(format!("Invalid bucket name '{bucket}'")));
        }
        Ok(self
            .root
            .join(format!("{bucket}.{}", self.storage.extension())))
    }

    /// Run `f` against a loaded bucket; `Ok(None)` if the bucket has no file
    fn with_bucket<T>(&self, bucket: &str, f: impl FnOnce(&Entries) -> T) -> Result<Option<T>> {
        if let Some(entries) = self.loaded.read_recovered()?.get(bucket) {
            return Ok(Some(f(entries)));
        }

        let mut loaded = self.loaded.write_recovered()?;
        if !loaded.contains_key(bucket) {
            let path = self.file_path(bucket)?;
            let Some(stored) = self.storage.read_optional::<Vec<StoredEntry>>(&path)? else {
                return Ok(None);
            };
            let entries = stored
                .into_iter()
                .map(CacheEntry::try_from)
                .collect::<Result<Vec<_>>>()?;
            debug!("Loaded {} entries for bucket {bucket}", entries.len());
            loaded.insert(bucket.to_string(), Entries::from_oldest_first(entries));
        }
        Ok(loaded.get(bucket).map(f))
    }

    /// Mutate a bucket (loading or creating it) and persist the result
    fn update<T>(&self, bucket: &str, f: impl FnOnce(&mut Entries) -> T) -> Result<T> {
        // make sure the on-disk contents are in memory first
        self.with_bucket(bucket, |_| ())?;

        let path = self.file_path(bucket)?;
        let mut loaded = self.loaded.write_recovered()?;
        let mut staged = loaded.get(bucket).map_or_else(Entries::new, Entries::duplicate);
        let result = f(&mut staged);

        // memory only changes once the file is on disk
        let snapshot: Vec<StoredEntry> = staged.oldest_first().map(StoredEntry::from).collect();
        self.storage.write(&path, &snapshot)?;
        loaded.insert(bucket.to_string(), staged);
        Ok(result)
    }
}

impl<S: StorageBackend> BucketStore for FileStore<S> {
    fn open(&self, bucket: &str) -> Result<()> {
        if self.has_bucket(bucket)? {
            return Ok(());
        }
        self.update(bucket, |_| ())
    }

    fn has_bucket(&self, bucket: &str) -> Result<bool> {
        Ok(self.with_bucket(bucket, |_| ())?.is_some())
    }

    fn bucket_names(&self) -> Result<Vec<String>> {
        let dir = match std::fs::read_dir(&self.root) {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(Error::DirectoryRead {
                    path: self.root.clone(),
                    source: e,
                });
            }
        };

        let ext = self.storage.extension();
        let mut names: Vec<String> = dir
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some(ext) {
                    return None;
                }
                path.file_stem().and_then(|s| s.to_str()).map(String::from)
            })
            .collect();
        names.sort();
        Ok(names)
    }

    fn delete_bucket(&self, bucket: &str) -> Result<bool> {
        let existed = self.has_bucket(bucket)?;
        self.loaded.write_recovered()?.remove(bucket);
        self.storage.remove(&self.file_path(bucket)?)?;
        Ok(existed)
    }

    fn lookup(&self, bucket: &str, url: &str) -> Result<Option<CacheEntry>> {
        Ok(self
            .with_bucket(bucket, |entries| entries.get(url).cloned())?
            .flatten())
    }

    fn put(&self, bucket: &str, entry: CacheEntry) -> Result<()> {
        self.update(bucket, |entries| {
            entries.put(entry);
        })
    }

    fn delete(&self, bucket: &str, url: &str) -> Result<bool> {
        if self.lookup(bucket, url)?.is_none() {
            return Ok(false);
        }
        self.update(bucket, |entries| entries.remove(url).is_some())
    }

    fn keys(&self, bucket: &str) -> Result<Vec<String>> {
        Ok(self.with_bucket(bucket, Entries::keys)?.unwrap_or_default())
    }

    fn len(&self, bucket: &str) -> Result<usize> {
        Ok(self.with_bucket(bucket, Entries::len)?.unwrap_or(0))
    }
}
