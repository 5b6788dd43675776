use crate::config::Policy;
use crate::error::{Error, Result};
use crate::http::{Request, Response};
use crate::router::{CacheRouter, ServedFrom};

use log::debug;
use std::time::Duration;
use time::OffsetDateTime;

impl CacheRouter {
    /// Fresh hit: no network. Miss or expired: network, then store.
    /// Network down: an expired entry is better than nothing.
    pub(crate) async fn cache_first(
        &self,
        request: &Request,
        bucket: &str,
        policy: &Policy,
    ) -> Result<(Response, ServedFrom)> {
        let cached = self.io.read(bucket, request.url());
        if let Some(entry) = &cached {
            if !entry.is_expired(policy.max_age, OffsetDateTime::now_utc()) {
                debug!("Cache hit for {}", request.url());
                return Ok((entry.response.clone(), ServedFrom::Cache));
            }
        }

        match self.io.fetch(request).await {
            Ok(response) => {
                self.io.write(bucket, policy, request, &response);
                Ok((response, ServedFrom::Network))
            }
            Err(err) => match cached {
                Some(entry) => {
                    debug!("Serving expired {} after network error: {err}", request.url());
                    Ok((entry.response, ServedFrom::StaleCache))
                }
                None => Err(err),
            },
        }
    }

    /// Race the network against `timeout`; on failure fall back to any cached
    /// entry, then (navigations only) the offline document.
    ///
    /// A fetch that loses the race keeps running and still refreshes the
    /// bucket when it completes.
    pub(crate) async fn network_first(
        &self,
        request: &Request,
        bucket: &str,
        policy: &Policy,
        timeout: Duration,
    ) -> Result<(Response, ServedFrom)> {
        let io = self.io.clone();
        let owned_request = request.clone();
        let owned_bucket = bucket.to_string();
        let owned_policy = *policy;
        let mut task = tokio::spawn(async move {
            let result = io.fetch(&owned_request).await;
            if let Ok(response) = &result {
                io.write(&owned_bucket, &owned_policy, &owned_request, response);
            }
            result
        });

        let outcome = match tokio::time::timeout(timeout, &mut task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(Error::network(request.url(), join_err)),
            Err(_) => {
                self.track(tokio::spawn(async move {
                    let _ = task.await;
                }));
                Err(Error::Timeout {
                    url: request.url().to_string(),
                    timeout,
                })
            }
        };

        let err = match outcome {
            Ok(response) => return Ok((response, ServedFrom::Network)),
            Err(err) => err,
        };

        if let Some(entry) = self.io.read(bucket, request.url()) {
            debug!("Network failed for {} ({err}), serving cache", request.url());
            let source = if entry.is_expired(policy.max_age, OffsetDateTime::now_utc()) {
                ServedFrom::StaleCache
            } else {
                ServedFrom::Cache
            };
            return Ok((entry.response, source));
        }

        if request.is_navigation() {
            if let Some(document) = self.offline_document(request) {
                debug!("Serving offline document for {}", request.url());
                return Ok((document, ServedFrom::OfflineFallback));
            }
        }

        Err(err)
    }

    /// Serve the cached entry at once and refresh it in the background;
    /// without one, a plain fetch that populates the bucket.
    pub(crate) async fn stale_while_revalidate(
        &self,
        request: &Request,
        bucket: &str,
        policy: &Policy,
    ) -> Result<(Response, ServedFrom)> {
        let Some(entry) = self.io.read(bucket, request.url()) else {
            let response = self.io.fetch(request).await?;
            self.io.write(bucket, policy, request, &response);
            return Ok((response, ServedFrom::Network));
        };

        let io = self.io.clone();
        let owned_request = request.clone();
        let owned_bucket = bucket.to_string();
        let owned_policy = *policy;
        self.track(tokio::spawn(async move {
            match io.fetch(&owned_request).await {
                Ok(response) => io.write(&owned_bucket, &owned_policy, &owned_request, &response),
                Err(e) => debug!("Revalidation of {} failed: {e}", owned_request.url()),
            }
        }));

        let source = if entry.is_expired(policy.max_age, OffsetDateTime::now_utc()) {
            ServedFrom::StaleCache
        } else {
            ServedFrom::Cache
        };
        Ok((entry.response, source))
    }

    /// Straight to the network; the store is never touched
    pub(crate) async fn network_only(&self, request: &Request) -> Result<(Response, ServedFrom)> {
        let response = self.io.fetch(request).await?;
        Ok((response, ServedFrom::Network))
    }

    /// The precached offline document, resolved against the request's origin
    fn offline_document(&self, request: &Request) -> Option<Response> {
        let path = self.config.offline_fallback.as_deref()?;
        let fallback = request.resolve(path).ok()?;
        let bucket = self.config.storage_name(crate::config::Bucket::Static);
        self.io
            .read(&bucket, fallback.url())
            .map(|entry| entry.response)
    }
}
