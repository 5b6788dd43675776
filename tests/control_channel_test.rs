//! Control messages and the page <-> worker channel

mod common;

use common::{TestFixture, get};
use serde_json::json;
use std::time::Duration;
use swcache::{
    Bucket, BucketStore, CacheSizes, ControlReply, ControlRequest, Registration, Response,
    WorkerState, control_channel,
};

#[tokio::test]
async fn test_get_version() {
    let fx = TestFixture::new().await;

    let reply = fx.router.handle_message(ControlRequest::GetVersion).await;

    assert_eq!(
        serde_json::to_value(&reply).unwrap(),
        json!({"version": "v1"})
    );
}

#[tokio::test]
async fn test_cache_sizes_count_entries() {
    let fx = TestFixture::new().await;
    fx.router.handle_fetch(&get("/img/a.png")).await.unwrap();
    fx.router.handle_fetch(&get("/img/b.png")).await.unwrap();
    fx.router.handle_fetch(&get("/api/v1/odds")).await.unwrap();

    let sizes = fx.router.cache_sizes();

    // precached offline page and manifest
    assert_eq!(sizes.get(Bucket::Static), 2);
    assert_eq!(sizes.images, 2);
    assert_eq!(sizes.api, 1);
    assert_eq!(sizes.dynamic, 0);
    assert_eq!(sizes.total, 5);
}

#[tokio::test]
async fn test_clear_cache_empties_everything() {
    let fx = TestFixture::new().await;
    fx.router.handle_fetch(&get("/img/a.png")).await.unwrap();

    let reply = fx.router.handle_message(ControlRequest::ClearCache).await;

    assert_eq!(reply, ControlReply::Ack { success: true });
    assert!(fx.store.bucket_names().unwrap().is_empty());
    assert_eq!(fx.router.cache_sizes(), CacheSizes::default());

    // buckets come back on demand
    fx.router.handle_fetch(&get("/img/a.png")).await.unwrap();
    assert_eq!(fx.router.cache_sizes().images, 1);
}

#[tokio::test]
async fn test_clear_cache_by_name() {
    let fx = TestFixture::new().await;
    fx.router.handle_fetch(&get("/img/a.png")).await.unwrap();
    fx.router.handle_fetch(&get("/api/v1/odds")).await.unwrap();

    let by_short = fx
        .router
        .handle_message(ControlRequest::ClearCacheByName {
            cache_name: "images".into(),
        })
        .await;
    assert_eq!(by_short, ControlReply::Ack { success: true });
    assert!(fx.cached(Bucket::Images, "/img/a.png").is_none());
    assert!(fx.cached(Bucket::Api, "/api/v1/odds").is_some());

    let by_full = fx
        .router
        .handle_message(ControlRequest::ClearCacheByName {
            cache_name: fx.bucket(Bucket::Api),
        })
        .await;
    assert_eq!(by_full, ControlReply::Ack { success: true });
    assert!(fx.cached(Bucket::Api, "/api/v1/odds").is_none());
}

#[tokio::test]
async fn test_clear_unknown_cache_reports_failure() {
    let fx = TestFixture::new().await;

    let reply = fx
        .router
        .handle_message(ControlRequest::ClearCacheByName {
            cache_name: "no-such-cache".into(),
        })
        .await;

    assert_eq!(reply, ControlReply::Ack { success: false });
}

#[tokio::test]
async fn test_skip_waiting_before_install_sets_flag() {
    let fx = TestFixture::new().await;
    let incoming = fx.worker("v2");
    assert!(!incoming.skip_waiting_requested());

    let reply = incoming.handle_message(ControlRequest::SkipWaiting).await;

    assert_eq!(reply, ControlReply::Ack { success: true });
    assert!(incoming.skip_waiting_requested());
}

#[tokio::test]
async fn test_skip_waiting_on_active_worker_is_noop() {
    let fx = TestFixture::new().await;

    let reply = fx.router.handle_message(ControlRequest::SkipWaiting).await;

    assert_eq!(reply, ControlReply::Ack { success: true });
    assert_eq!(fx.router.state(), WorkerState::Active);
    assert!(!fx.router.skip_waiting_requested());
}

#[tokio::test]
async fn test_skip_waiting_on_redundant_worker_fails() {
    let fx = TestFixture::new().await;
    let registration = Registration::new(fx.events.clone());
    let v2 = fx.worker("v2");
    registration.register(v2.clone()).await.unwrap();
    let v3 = fx.worker("v3");
    v3.request_skip_waiting();
    registration.register(v3).await.unwrap();
    assert_eq!(v2.state(), WorkerState::Redundant);

    let reply = v2.handle_message(ControlRequest::SkipWaiting).await;

    assert_eq!(reply, ControlReply::Ack { success: false });
    assert_eq!(registration.active().unwrap().version(), "v3");
}

#[tokio::test]
async fn test_unregistered_waiting_worker_activates_itself() {
    let fx = TestFixture::new().await;
    let v2 = fx.worker("v2");
    v2.install().await.unwrap();
    fx.router.handle_fetch(&get("/img/a.png")).await.unwrap();

    let reply = v2.handle_message(ControlRequest::SkipWaiting).await;

    assert_eq!(reply, ControlReply::Ack { success: true });
    assert_eq!(v2.state(), WorkerState::Active);
    assert!(!fx.store.has_bucket(&fx.bucket(Bucket::Images)).unwrap());
}

#[tokio::test]
async fn test_json_message_roundtrip_through_router() {
    let fx = TestFixture::new().await;
    fx.seed(Bucket::Fonts, "/f.woff2", Response::ok("f"));

    let request: ControlRequest =
        serde_json::from_str(r#"{"type":"GET_CACHE_SIZES"}"#).unwrap();
    let reply = serde_json::to_value(fx.router.handle_message(request).await).unwrap();

    assert_eq!(reply["fonts"], 1);
    assert_eq!(reply["static"], 2);
    assert_eq!(reply["total"], 3);
}

// =============================================================================
// Channel
// =============================================================================

#[tokio::test]
async fn test_channel_roundtrip() {
    let fx = TestFixture::new().await;
    let (channel, receiver) = control_channel(8, Duration::from_secs(5));
    tokio::spawn(receiver.serve(fx.router.clone()));

    assert_eq!(channel.version().await.as_deref(), Some("v1"));
    assert_eq!(channel.cache_sizes().await.unwrap().static_, 2);
    assert!(channel.clear_cache_by_name("static").await);
    assert!(!channel.clear_cache_by_name("static").await);
    assert!(channel.clear_cache().await);
}

#[tokio::test]
async fn test_connect_uses_router() {
    let fx = TestFixture::with_config(common::config("v7").control_timeout(Duration::from_secs(1)))
        .await;

    let channel = fx.router.connect();

    assert_eq!(channel.version().await.as_deref(), Some("v7"));
    assert!(channel.skip_waiting().await);
    assert_eq!(fx.router.state(), WorkerState::Active);
}

#[tokio::test]
async fn test_waiting_worker_channel_skip_waiting_promotes_it() {
    let fx = TestFixture::new().await;
    let registration = Registration::new(fx.events.clone());
    let v1 = fx.worker("v1");
    registration.register(v1.clone()).await.unwrap();
    let v2 = fx.worker("v2");
    registration.register(v2.clone()).await.unwrap();
    assert_eq!(v2.state(), WorkerState::Waiting);

    assert!(v2.connect().skip_waiting().await);

    assert_eq!(v2.state(), WorkerState::Active);
    assert_eq!(v1.state(), WorkerState::Redundant);
    assert_eq!(registration.active().unwrap().version(), "v2");
    assert!(registration.waiting().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_channel_times_out_without_reply() {
    let (channel, mut receiver) = control_channel(1, Duration::from_secs(5));
    let silent = tokio::spawn(async move {
        // take requests and hold the ports without answering
        let mut held = Vec::new();
        while let Some((_, port)) = receiver.recv().await {
            held.push(port);
        }
    });

    let started = tokio::time::Instant::now();
    assert_eq!(channel.version().await, None);
    assert!(!channel.clear_cache().await);
    assert!(started.elapsed() >= Duration::from_secs(10));

    drop(channel);
    silent.await.unwrap();
}

#[tokio::test]
async fn test_channel_closed_worker_resolves_none() {
    let (channel, receiver) = control_channel(1, Duration::from_secs(5));
    drop(receiver);

    assert_eq!(channel.request(ControlRequest::GetVersion).await, None);
}

#[tokio::test]
async fn test_channel_to_registration_skip_waiting() {
    let fx = TestFixture::new().await;
    let registration = Registration::new(fx.events.clone());
    let (channel, receiver) = control_channel(4, Duration::from_secs(5));
    tokio::spawn(receiver.serve(registration.clone()));

    // nothing waiting yet
    assert!(!channel.skip_waiting().await);
    assert_eq!(channel.version().await, None);
}
