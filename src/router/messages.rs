//! Typed page <-> worker control protocol
//!
//! On the wire these are the JSON payloads pages post to the worker:
//!
//! ```text
//! {"type":"GET_VERSION"}                          -> {"version":"v2.1.0"}
//! {"type":"GET_CACHE_SIZES"}                      -> {"static":3,"dynamic":0,...,"total":9}
//! {"type":"CLEAR_CACHE"}                          -> {"success":true}
//! {"type":"CLEAR_CACHE_BY_NAME","cacheName":"x"}  -> {"success":false}
//! {"type":"SKIP_WAITING"}                         -> {"success":true}
//! ```
//!
//! `SKIP_WAITING` only succeeds when the worker is, or will become, active.

use crate::config::Bucket;
use crate::router::{CacheRouter, WorkerState};
use crate::sync::RwLockExt;

use log::{info, warn};
use serde::{Deserialize, Serialize};

/// A control message from the page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlRequest {
    GetVersion,
    GetCacheSizes,
    /// Delete every bucket in the store
    ClearCache,
    /// Delete one bucket, by short name (`"images"`) or full storage name
    ClearCacheByName {
        #[serde(rename = "cacheName")]
        cache_name: String,
    },
    SkipWaiting,
}

/// Entry counts per bucket
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSizes {
    #[serde(rename = "static")]
    pub static_: usize,
    pub dynamic: usize,
    pub images: usize,
    pub fonts: usize,
    pub scripts: usize,
    pub styles: usize,
    pub api: usize,
    pub total: usize,
}

impl CacheSizes {
    fn set(&mut self, bucket: Bucket, count: usize) {
        let slot = match bucket {
            Bucket::Static => &mut self.static_,
            Bucket::Dynamic => &mut self.dynamic,
            Bucket::Images => &mut self.images,
            Bucket::Fonts => &mut self.fonts,
            Bucket::Scripts => &mut self.scripts,
            Bucket::Styles => &mut self.styles,
            Bucket::Api => &mut self.api,
        };
        *slot = count;
        self.total = self.static_
            + self.dynamic
            + self.images
            + self.fonts
            + self.scripts
            + self.styles
            + self.api;
    }

    pub fn get(&self, bucket: Bucket) -> usize {
        match bucket {
            Bucket::Static => self.static_,
            Bucket::Dynamic => self.dynamic,
            Bucket::Images => self.images,
            Bucket::Fonts => self.fonts,
            Bucket::Scripts => self.scripts,
            Bucket::Styles => self.styles,
            Bucket::Api => self.api,
        }
    }
}

/// The worker's answer to a [`ControlRequest`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ControlReply {
    Version { version: String },
    CacheSizes(CacheSizes),
    Ack { success: bool },
}

impl CacheRouter {
    /// Answer a control message
    pub async fn handle_message(&self, request: ControlRequest) -> ControlReply {
        match request {
            ControlRequest::GetVersion => ControlReply::Version {
                version: self.version().to_string(),
            },
            ControlRequest::GetCacheSizes => ControlReply::CacheSizes(self.cache_sizes()),
            ControlRequest::ClearCache => ControlReply::Ack {
                success: self.clear_all(),
            },
            ControlRequest::ClearCacheByName { cache_name } => ControlReply::Ack {
                success: self.clear_by_name(&cache_name),
            },
            ControlRequest::SkipWaiting => ControlReply::Ack {
                success: self.skip_waiting().await,
            },
        }
    }

    /// Stop waiting for the previous worker
    ///
    /// Before install completes this sets the flag that [`Registration`]
    /// reads on register. A waiting worker is promoted through the
    /// registration it belongs to, or activated directly if it was never
    /// registered. Returns whether the worker is now active or will be as
    /// soon as it is installed; a redundant worker answers `false`.
    ///
    /// [`Registration`]: crate::Registration
    pub async fn skip_waiting(&self) -> bool {
        match self.state() {
            WorkerState::Parsed | WorkerState::Installing => {
                self.request_skip_waiting();
                true
            }
            WorkerState::Active => true,
            WorkerState::Redundant => false,
            WorkerState::Waiting => {
                let owner = self.owner.read_recovered().ok().and_then(|o| o.upgrade());
                let promoted = match owner {
                    Some(registration) => registration.skip_waiting_for(self).await,
                    None => self.activate().await.map(|_| ()),
                };
                promoted
                    .inspect_err(|e| warn!("Worker {} could not skip waiting: {e}", self.version()))
                    .is_ok()
            }
        }
    }

    /// Entry counts of this version's buckets
    pub fn cache_sizes(&self) -> CacheSizes {
        let mut sizes = CacheSizes::default();
        for bucket in Bucket::ALL {
            let name = self.config.storage_name(bucket);
            let count = self.io.store.len(&name).unwrap_or_else(|e| {
                warn!("Could not count {name}: {e}");
                0
            });
            sizes.set(bucket, count);
        }
        sizes
    }

    /// Delete every bucket in the store; `false` if any deletion failed
    pub fn clear_all(&self) -> bool {
        let names = match self.io.store.bucket_names() {
            Ok(names) => names,
            Err(e) => {
                warn!("Could not list buckets to clear: {e}");
                return false;
            }
        };

        let mut success = true;
        for name in names {
            if let Err(e) = self.io.store.delete_bucket(&name) {
                warn!("Could not clear {name}: {e}");
                success = false;
            }
        }
        info!("Cleared all caches (success: {success})");
        success
    }

    /// Delete one bucket; `false` if it did not exist or could not be deleted
    pub fn clear_by_name(&self, name: &str) -> bool {
        let storage_name = Bucket::from_name(name)
            .map_or_else(|| name.to_string(), |b| self.config.storage_name(b));
        match self.io.store.delete_bucket(&storage_name) {
            Ok(existed) => {
                info!("Cleared cache {storage_name} (existed: {existed})");
                existed
            }
            Err(e) => {
                warn!("Could not clear {storage_name}: {e}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_wire_format() {
        let req: ControlRequest =
            serde_json::from_value(json!({"type": "CLEAR_CACHE_BY_NAME", "cacheName": "images"}))
                .unwrap();
        assert_eq!(
            req,
            ControlRequest::ClearCacheByName {
                cache_name: "images".into()
            }
        );

        let req: ControlRequest = serde_json::from_value(json!({"type": "SKIP_WAITING"})).unwrap();
        assert_eq!(req, ControlRequest::SkipWaiting);

        assert_eq!(
            serde_json::to_value(ControlRequest::GetCacheSizes).unwrap(),
            json!({"type": "GET_CACHE_SIZES"})
        );
    }

    #[test]
    fn test_unknown_request_rejected() {
        let result: Result<ControlRequest, _> =
            serde_json::from_value(json!({"type": "FORMAT_DISK"}));
        assert!(result.is_err());
    }

    #[test]
    fn test_reply_wire_format() {
        let mut sizes = CacheSizes::default();
        sizes.set(Bucket::Static, 2);
        sizes.set(Bucket::Images, 3);

        let value = serde_json::to_value(ControlReply::CacheSizes(sizes)).unwrap();
        assert_eq!(value["static"], 2);
        assert_eq!(value["images"], 3);
        assert_eq!(value["total"], 5);

        assert_eq!(
            serde_json::to_value(ControlReply::Ack { success: true }).unwrap(),
            json!({"success": true})
        );
        let reply: ControlReply = serde_json::from_value(json!({"version": "v2"})).unwrap();
        assert_eq!(
            reply,
            ControlReply::Version {
                version: "v2".into()
            }
        );
    }
}
