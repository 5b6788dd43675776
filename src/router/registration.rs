use crate::error::{Error, Result};
use crate::events::{CacheEvent, EventManager};
use crate::router::{CacheRouter, ControlReply, ControlRequest, WorkerState};
use crate::sync::RwLockExt;

use log::{debug, info};
use std::sync::{Arc, RwLock, Weak};

/// The scope's worker slots: the active (controlling) worker and at most one
/// installed worker waiting to replace it
///
/// Registered workers keep a weak link back here, so a `SKIP_WAITING`
/// posted straight to a waiting worker promotes it through its registration.
pub struct Registration {
    me: Weak<Registration>,
    active: RwLock<Option<Arc<CacheRouter>>>,
    waiting: RwLock<Option<Arc<CacheRouter>>>,
    events: Arc<EventManager>,
}

impl Registration {
    pub fn new(events: Arc<EventManager>) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            active: RwLock::new(None),
            waiting: RwLock::new(None),
            events,
        })
    }

    pub fn events(&self) -> &Arc<EventManager> {
        &self.events
    }

    /// The worker currently controlling pages
    pub fn active(&self) -> Option<Arc<CacheRouter>> {
        self.active.read_recovered().ok().and_then(|a| a.clone())
    }

    pub fn waiting(&self) -> Option<Arc<CacheRouter>> {
        self.waiting.read_recovered().ok().and_then(|w| w.clone())
    }

    /// Install `worker`, then activate it right away if nothing controls the
    /// scope (or it asked to skip waiting); otherwise park it as waiting and
    /// announce the update.
    ///
    /// Returns the state the worker ended in.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker was already installed.
    pub async fn register(&self, worker: Arc<CacheRouter>) -> Result<WorkerState> {
        worker.install().await?;
        *worker.owner.write_recovered()? = self.me.clone();

        let Some(current) = self.active() else {
            self.promote(worker).await?;
            return Ok(WorkerState::Active);
        };

        if worker.skip_waiting_requested() {
            self.promote(worker).await?;
            return Ok(WorkerState::Active);
        }

        let replaced = self.waiting.write_recovered()?.replace(worker.clone());
        if let Some(replaced) = replaced {
            replaced.mark_redundant();
        }

        info!(
            "Update {} installed, waiting for {} to release",
            worker.version(),
            current.version()
        );
        self.events.notify(&CacheEvent::UpdateAvailable {
            current: current.version().to_string(),
            incoming: worker.version().to_string(),
        });
        Ok(WorkerState::Waiting)
    }

    /// Activate the waiting worker now
    ///
    /// # Errors
    ///
    /// Returns `Error::NoWaitingWorker` if no update is waiting.
    pub async fn skip_waiting(&self) -> Result<()> {
        let worker = self
            .waiting
            .write_recovered()?
            .take()
            .ok_or(Error::NoWaitingWorker)?;
        self.promote(worker).await
    }

    /// Activate `worker` if it is the one waiting here
    ///
    /// # Errors
    ///
    /// Returns `Error::NoWaitingWorker` if `worker` is not in the waiting slot.
    pub(crate) async fn skip_waiting_for(&self, worker: &CacheRouter) -> Result<()> {
        let parked = {
            let mut waiting = self.waiting.write_recovered()?;
            let is_worker = waiting
                .as_ref()
                .is_some_and(|w| std::ptr::eq(Arc::as_ptr(w), worker));
            if is_worker { waiting.take() } else { None }
        };
        self.promote(parked.ok_or(Error::NoWaitingWorker)?).await
    }

    /// Make `worker` the active one; the previous active worker and any
    /// other waiting worker become redundant
    async fn promote(&self, worker: Arc<CacheRouter>) -> Result<()> {
        worker.activate().await?;

        let parked = self.waiting.write_recovered()?.take();
        if let Some(parked) = parked.filter(|p| !Arc::ptr_eq(p, &worker)) {
            debug!("Dropping waiting worker {} for {}", parked.version(), worker.version());
            parked.mark_redundant();
        }

        let previous = self.active.write_recovered()?.replace(worker);
        if let Some(previous) = previous {
            previous.mark_redundant();
        }
        Ok(())
    }

    /// Deliver a control message the way a page would
    ///
    /// `SKIP_WAITING` promotes the waiting worker; everything else goes to the
    /// active worker, or the waiting one if nothing is active yet.
    pub async fn post_message(&self, request: ControlRequest) -> ControlReply {
        if request == ControlRequest::SkipWaiting {
            return ControlReply::Ack {
                success: self.skip_waiting().await.is_ok(),
            };
        }
        match self.active().or_else(|| self.waiting()) {
            Some(worker) => worker.handle_message(request).await,
            None => ControlReply::Ack { success: false },
        }
    }
}
