//! Request and response values, and the network seam
//!
//! The router never talks to a socket itself. Hosts hand it a [`Fetcher`]
//! that performs the real request (an HTTP client, a webview bridge, a mock).

use crate::error::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use url::Url;

/// HTTP request method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
    Options,
}

impl Method {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
            Method::Options => "OPTIONS",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the page intends to do with the response (mirrors `Request.destination`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Destination {
    /// Top-level navigation
    Document,
    Image,
    Font,
    Script,
    Style,
    Manifest,
    /// `fetch()` / XHR
    #[default]
    Empty,
}

/// An intercepted outbound request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    method: Method,
    url: Url,
    destination: Destination,
}

impl Request {
    /// Create a request, parsing and normalizing the URL
    ///
    /// The fragment is dropped: it never reaches the server and must not split
    /// one resource into several cache keys.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidUrl` if `url` is not an absolute URL.
    pub fn new(method: Method, url: &str) -> Result<Self> {
        let mut parsed = Url::parse(url).map_err(|e| Error::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        parsed.set_fragment(None);
        Ok(Self {
            method,
            url: parsed,
            destination: Destination::Empty,
        })
    }

    /// Shorthand for a plain GET
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidUrl` if `url` is not an absolute URL.
    pub fn get(url: &str) -> Result<Self> {
        Self::new(Method::Get, url)
    }

    /// A GET navigation request for a document
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidUrl` if `url` is not an absolute URL.
    pub fn navigate(url: &str) -> Result<Self> {
        Ok(Self::get(url)?.with_destination(Destination::Document))
    }

    #[must_use]
    pub fn with_destination(mut self, destination: Destination) -> Self {
        self.destination = destination;
        self
    }

    pub fn method(&self) -> Method {
        self.method
    }

    /// Full URL; also the cache key
    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    pub fn path(&self) -> &str {
        self.url.path()
    }

    pub fn destination(&self) -> Destination {
        self.destination
    }

    pub fn is_navigation(&self) -> bool {
        self.destination == Destination::Document
    }

    /// Lowercased file extension of the last path segment, if any
    pub fn extension(&self) -> Option<String> {
        let segment = self.url.path_segments()?.next_back()?;
        let (stem, ext) = segment.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        Some(ext.to_ascii_lowercase())
    }

    /// Resolve a path (e.g. `/offline.html`) against this request's origin
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidUrl` if the joined URL is invalid.
    pub fn resolve(&self, path: &str) -> Result<Request> {
        let joined = self.url.join(path).map_err(|e| Error::InvalidUrl {
            url: path.to_string(),
            reason: e.to_string(),
        })?;
        Request::get(joined.as_str())
    }
}

/// A response as returned by the network or replayed from a bucket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl Response {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    /// A `200 OK` response
    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self::new(200, body)
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Only a plain `200` is ever written to a bucket
    pub fn is_cacheable(&self) -> bool {
        self.status == 200
    }

    /// Approximate stored size (body plus header text)
    pub fn size(&self) -> usize {
        self.body.len()
            + self
                .headers
                .iter()
                .map(|(k, v)| k.len() + v.len())
                .sum::<usize>()
    }
}

/// The network: performs a request and returns whatever the server sent
///
/// Implementations return `Error::Network` for transport failures (offline,
/// DNS, reset). Non-200 statuses are successful fetches, not errors.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: &Request) -> Result<Response>;
}
