//! Install / activate state machine

use crate::config::Bucket;
use crate::error::{Error, Result};
use crate::events::CacheEvent;
use crate::http::Request;
use crate::router::CacheRouter;
use crate::sync::RwLockExt;

use log::{debug, info, warn};
use std::sync::atomic::Ordering;

/// Lifecycle state of a worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerState {
    /// Built, not yet installed
    Parsed,
    Installing,
    /// Installed, waiting for the previous worker to let go
    Waiting,
    /// Controlling pages
    Active,
    /// Replaced by a newer worker
    Redundant,
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            WorkerState::Parsed => "parsed",
            WorkerState::Installing => "installing",
            WorkerState::Waiting => "waiting",
            WorkerState::Active => "active",
            WorkerState::Redundant => "redundant",
        };
        f.write_str(s)
    }
}

impl CacheRouter {
    pub fn state(&self) -> WorkerState {
        self.state
            .read_recovered()
            .map_or(WorkerState::Redundant, |s| *s)
    }

    fn set_state(&self, next: WorkerState) {
        if let Ok(mut state) = self.state.write_recovered() {
            *state = next;
        }
        info!("Worker {} is {next}", self.version());
        self.io.events.notify(&CacheEvent::StateChanged {
            version: self.version().to_string(),
            state: next,
        });
    }

    fn expect_state(&self, expected: WorkerState, action: &str) -> Result<()> {
        let current = self.state();
        if current != expected {
            return Err(Error::InvalidState {
                action: action.to_string(),
                state: current.to_string(),
            });
        }
        Ok(())
    }

    /// Open this version's buckets and precache the shell
    ///
    /// A precache asset that fails to fetch is logged and skipped; it never
    /// fails the install.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidState` unless the worker is freshly built.
    pub async fn install(&self) -> Result<()> {
        self.expect_state(WorkerState::Parsed, "install")?;
        self.set_state(WorkerState::Installing);

        for name in self.config.storage_names() {
            if let Err(e) = self.io.store.open(&name) {
                warn!("Could not open bucket {name}: {e}");
            }
        }

        let bucket = self.config.storage_name(Bucket::Static);
        let policy = self.config.policy(Bucket::Static);
        for path in &self.config.precache {
            let request = match Request::get(&self.config.scope)
                .and_then(|scope| scope.resolve(path))
            {
                Ok(request) => request,
                Err(e) => {
                    warn!("Skipping precache of {path}: {e}");
                    continue;
                }
            };
            match self.io.fetch(&request).await {
                Ok(response) if response.is_cacheable() => {
                    self.io.write(&bucket, &policy, &request, &response);
                    debug!("Precached {}", request.url());
                }
                Ok(response) => {
                    warn!("Skipping precache of {}: status {}", request.url(), response.status);
                }
                Err(e) => warn!("Skipping precache of {}: {e}", request.url()),
            }
        }

        self.set_state(WorkerState::Waiting);
        Ok(())
    }

    /// Purge buckets of other versions and take control of pages
    ///
    /// Returns the names of the purged buckets. Failure to list or delete a
    /// bucket is logged; activation still completes.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidState` unless the worker is waiting.
    pub async fn activate(&self) -> Result<Vec<String>> {
        self.expect_state(WorkerState::Waiting, "activate")?;

        let names = self.io.store.bucket_names().unwrap_or_else(|e| {
            warn!("Could not list buckets on activation: {e}");
            Vec::new()
        });

        let mut purged = Vec::new();
        for name in names.into_iter().filter(|n| !self.config.is_current(n)) {
            match self.io.store.delete_bucket(&name) {
                Ok(_) => {
                    info!("Purged bucket {name}");
                    self.io
                        .events
                        .notify(&CacheEvent::BucketPurged { name: name.clone() });
                    purged.push(name);
                }
                Err(e) => warn!("Could not purge bucket {name}: {e}"),
            }
        }

        self.claimed.store(true, Ordering::SeqCst);
        self.set_state(WorkerState::Active);
        Ok(purged)
    }

    /// Whether this worker has claimed the open pages
    pub fn is_controlling(&self) -> bool {
        self.claimed.load(Ordering::SeqCst) && self.state() == WorkerState::Active
    }

    /// Ask to activate as soon as installed instead of waiting
    pub fn request_skip_waiting(&self) {
        self.skip_waiting.store(true, Ordering::SeqCst);
    }

    pub fn skip_waiting_requested(&self) -> bool {
        self.skip_waiting.load(Ordering::SeqCst)
    }

    pub(crate) fn mark_redundant(&self) {
        self.claimed.store(false, Ordering::SeqCst);
        self.set_state(WorkerState::Redundant);
    }
}
