//! Event system for router notifications
//!
//! The page layer subscribes here to learn about updates waiting to activate,
//! connectivity changes (to show an offline toast) and cache housekeeping.

use crate::router::WorkerState;
use crate::sync::RwLockExt;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::RwLock;

/// Something the router wants the page layer to know
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
    /// A worker moved to a new lifecycle state
    StateChanged { version: String, state: WorkerState },
    /// A newer worker installed while an older one controls the pages
    UpdateAvailable { current: String, incoming: String },
    /// Network reachability flipped, as observed from fetch outcomes
    ConnectivityChanged { online: bool },
    /// An entry was evicted to keep a bucket within `max_entries`
    Evicted { bucket: String, url: String },
    /// A bucket from another version was deleted on activation
    BucketPurged { name: String },
    /// A best-effort cache write failed; the response was still served
    WriteFailed {
        bucket: String,
        url: String,
        reason: String,
    },
}

/// Discriminant of [`CacheEvent`], used to subscribe to one kind only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    StateChanged,
    UpdateAvailable,
    ConnectivityChanged,
    Evicted,
    BucketPurged,
    WriteFailed,
}

impl CacheEvent {
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            CacheEvent::StateChanged { .. } => EventKind::StateChanged,
            CacheEvent::UpdateAvailable { .. } => EventKind::UpdateAvailable,
            CacheEvent::ConnectivityChanged { .. } => EventKind::ConnectivityChanged,
            CacheEvent::Evicted { .. } => EventKind::Evicted,
            CacheEvent::BucketPurged { .. } => EventKind::BucketPurged,
            CacheEvent::WriteFailed { .. } => EventKind::WriteFailed,
        }
    }
}

/// Type alias for an event callback
pub type EventCallback = Arc<dyn Fn(&CacheEvent) + Send + Sync>;

/// Manages event listeners
pub struct EventManager {
    /// Called for every event
    global_listeners: RwLock<Vec<EventCallback>>,

    /// Called only for one event kind
    kind_listeners: RwLock<HashMap<EventKind, Vec<EventCallback>>>,
}

impl EventManager {
    #[must_use]
    pub fn new() -> Self {
        Self {
            global_listeners: RwLock::new(Vec::new()),
            kind_listeners: RwLock::new(HashMap::new()),
        }
    }

    /// Register a listener for every event
    pub fn on_event<F>(&self, callback: F)
    where
        F: Fn(&CacheEvent) + Send + Sync + 'static,
    {
        if let Ok(mut guard) = self.global_listeners.write_recovered() {
            guard.push(Arc::new(callback));
        }
    }

    /// Register a listener for one kind of event
    pub fn watch<F>(&self, kind: EventKind, callback: F)
    where
        F: Fn(&CacheEvent) + Send + Sync + 'static,
    {
        if let Ok(mut guard) = self.kind_listeners.write_recovered() {
            guard.entry(kind).or_default().push(Arc::new(callback));
        }
    }

    /// Convenience: called with `(current, incoming)` versions when an update waits
    pub fn on_update_available<F>(&self, callback: F)
    where
        F: Fn(&str, &str) + Send + Sync + 'static,
    {
        self.watch(EventKind::UpdateAvailable, move |event| {
            if let CacheEvent::UpdateAvailable { current, incoming } = event {
                callback(current, incoming);
            }
        });
    }

    /// Convenience: called with `true` when back online, `false` when offline
    pub fn on_connectivity<F>(&self, callback: F)
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        self.watch(EventKind::ConnectivityChanged, move |event| {
            if let CacheEvent::ConnectivityChanged { online } = event {
                callback(*online);
            }
        });
    }

    /// Deliver an event to global then kind-specific listeners
    ///
    /// Listeners are cloned out of the lock before being called, so a listener
    /// may register further listeners without deadlocking.
    pub fn notify(&self, event: &CacheEvent) {
        let mut callbacks: Vec<EventCallback> = Vec::new();
        if let Ok(guard) = self.global_listeners.read_recovered() {
            callbacks.extend(guard.iter().cloned());
        }
        if let Ok(guard) = self.kind_listeners.read_recovered() {
            if let Some(listeners) = guard.get(&event.kind()) {
                callbacks.extend(listeners.iter().cloned());
            }
        }
        for callback in callbacks {
            callback(event);
        }
    }

    /// Remove all listeners for one kind
    pub fn unwatch(&self, kind: EventKind) {
        if let Ok(mut guard) = self.kind_listeners.write_recovered() {
            guard.remove(&kind);
        }
    }

    /// Clear all listeners
    pub fn clear(&self) {
        if let Ok(mut guard) = self.global_listeners.write_recovered() {
            guard.clear();
        }
        if let Ok(mut guard) = self.kind_listeners.write_recovered() {
            guard.clear();
        }
    }
}

impl Default for EventManager {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================
