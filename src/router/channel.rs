//! Request/response control channel, one reply port per call
//!
//! The page side holds a [`ControlChannel`]; the worker side drives a
//! [`ControlReceiver`]. A call that gets no reply within the channel timeout
//! resolves to `None` (or `false`) instead of hanging.

use crate::router::{CacheRouter, CacheSizes, ControlReply, ControlRequest, Registration};

use async_trait::async_trait;
use log::debug;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

type Envelope = (ControlRequest, oneshot::Sender<ControlReply>);

const CHANNEL_CAPACITY: usize = 16;

/// Something that answers control messages
#[async_trait]
pub trait ControlHandler: Send + Sync {
    async fn handle(&self, request: ControlRequest) -> ControlReply;
}

#[async_trait]
impl ControlHandler for CacheRouter {
    async fn handle(&self, request: ControlRequest) -> ControlReply {
        self.handle_message(request).await
    }
}

#[async_trait]
impl ControlHandler for Registration {
    async fn handle(&self, request: ControlRequest) -> ControlReply {
        self.post_message(request).await
    }
}

impl CacheRouter {
    /// Serve this worker on a spawned task and return the page-side handle
    ///
    /// Replies are awaited for `config.control_timeout`.
    pub fn connect(self: &Arc<Self>) -> ControlChannel {
        let (channel, receiver) = control_channel(CHANNEL_CAPACITY, self.config.control_timeout);
        tokio::spawn(receiver.serve(self.clone()));
        channel
    }
}

/// Create a connected channel pair
pub fn control_channel(capacity: usize, timeout: Duration) -> (ControlChannel, ControlReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (ControlChannel { tx, timeout }, ControlReceiver { rx })
}

/// Page-side handle
#[derive(Clone)]
pub struct ControlChannel {
    tx: mpsc::Sender<Envelope>,
    timeout: Duration,
}

impl ControlChannel {
    /// Send `request` and wait for the reply; `None` on timeout or if the
    /// worker side is gone
    pub async fn request(&self, request: ControlRequest) -> Option<ControlReply> {
        let (port, reply) = oneshot::channel();
        let exchange = async {
            self.tx.send((request, port)).await.ok()?;
            reply.await.ok()
        };
        match tokio::time::timeout(self.timeout, exchange).await {
            Ok(reply) => reply,
            Err(_) => {
                debug!("Control request timed out after {:?}", self.timeout);
                None
            }
        }
    }

    pub async fn version(&self) -> Option<String> {
        match self.request(ControlRequest::GetVersion).await? {
            ControlReply::Version { version } => Some(version),
            _ => None,
        }
    }

    pub async fn cache_sizes(&self) -> Option<CacheSizes> {
        match self.request(ControlRequest::GetCacheSizes).await? {
            ControlReply::CacheSizes(sizes) => Some(sizes),
            _ => None,
        }
    }

    pub async fn clear_cache(&self) -> bool {
        self.ack(ControlRequest::ClearCache).await
    }

    pub async fn clear_cache_by_name(&self, cache_name: impl Into<String>) -> bool {
        self.ack(ControlRequest::ClearCacheByName {
            cache_name: cache_name.into(),
        })
        .await
    }

    pub async fn skip_waiting(&self) -> bool {
        self.ack(ControlRequest::SkipWaiting).await
    }

    async fn ack(&self, request: ControlRequest) -> bool {
        matches!(
            self.request(request).await,
            Some(ControlReply::Ack { success: true })
        )
    }
}

/// Worker-side end of the channel
pub struct ControlReceiver {
    rx: mpsc::Receiver<Envelope>,
}

impl ControlReceiver {
    /// Answer requests until every [`ControlChannel`] clone is dropped
    pub async fn serve<H: ControlHandler + ?Sized>(mut self, handler: Arc<H>) {
        while let Some((request, port)) = self.rx.recv().await {
            debug!("Control request {request:?}");
            let reply = handler.handle(request).await;
            // the caller may have timed out and dropped its port
            let _ = port.send(reply);
        }
    }

    /// Take the next request without answering it (for custom loops)
    pub async fn recv(&mut self) -> Option<(ControlRequest, oneshot::Sender<ControlReply>)> {
        self.rx.recv().await
    }
}
