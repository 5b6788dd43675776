//! Buckets, per-bucket policies and request classification rules

use crate::error::{Error, Result};
use crate::http::{Destination, Request};
use crate::strategy::Strategy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Named cache bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bucket {
    /// Navigations, the offline page and other precached shell assets
    Static,
    /// Anything not matched by a more specific rule
    Dynamic,
    Images,
    Fonts,
    Scripts,
    Styles,
    Api,
}

impl Bucket {
    pub const ALL: [Bucket; 7] = [
        Bucket::Static,
        Bucket::Dynamic,
        Bucket::Images,
        Bucket::Fonts,
        Bucket::Scripts,
        Bucket::Styles,
        Bucket::Api,
    ];

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Bucket::Static => "static",
            Bucket::Dynamic => "dynamic",
            Bucket::Images => "images",
            Bucket::Fonts => "fonts",
            Bucket::Scripts => "scripts",
            Bucket::Styles => "styles",
            Bucket::Api => "api",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.name() == name)
    }

    /// Storage name for this bucket: `{prefix}-{bucket}-{version}`
    #[must_use]
    pub fn storage_name(&self, prefix: &str, version: &str) -> String {
        format!("{prefix}-{}-{version}", self.name())
    }

    /// Split a storage name produced by [`Bucket::storage_name`] back into
    /// bucket and version. Returns `None` for names under another prefix.
    #[must_use]
    pub fn parse_storage_name<'a>(name: &'a str, prefix: &str) -> Option<(Bucket, &'a str)> {
        let rest = name.strip_prefix(prefix)?.strip_prefix('-')?;
        let (bucket, version) = rest.split_once('-')?;
        Some((Bucket::from_name(bucket)?, version))
    }

    /// Built-in policy for this bucket
    #[must_use]
    pub fn default_policy(&self) -> Policy {
        match self {
            Bucket::Static => Policy::new(Strategy::network_first())
                .max_entries(50)
                .max_age(7 * DAY),
            Bucket::Dynamic => Policy::new(Strategy::network_first())
                .max_entries(100)
                .max_age(DAY),
            Bucket::Images => Policy::new(Strategy::CacheFirst)
                .max_entries(100)
                .max_age(30 * DAY),
            Bucket::Fonts => Policy::new(Strategy::CacheFirst)
                .max_entries(30)
                .max_age(365 * DAY),
            Bucket::Scripts | Bucket::Styles => Policy::new(Strategy::StaleWhileRevalidate)
                .max_entries(60)
                .max_age(7 * DAY),
            Bucket::Api => Policy::new(Strategy::NetworkFirst {
                timeout: Duration::from_secs(10),
            })
            .max_entries(50)
            .max_age(Duration::from_secs(5 * 60)),
        }
    }
}

impl std::fmt::Display for Bucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Cache policy attached to a bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Policy {
    pub strategy: Strategy,
    pub max_entries: usize,
    pub max_age: Duration,
}

impl Policy {
    pub fn new(strategy: Strategy) -> Self {
        Self {
            strategy,
            max_entries: 100,
            max_age: DAY,
        }
    }

    #[must_use]
    pub fn max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    #[must_use]
    pub fn max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    /// # Errors
    ///
    /// Returns an error if `max_entries` is 0 or the strategy is invalid.
    pub fn validate(&self) -> Result<()> {
        if self.max_entries == 0 {
            return Err(Error::Config("max_entries must be greater than 0".into()));
        }
        self.strategy.validate()
    }
}

/// Predicate over an intercepted request
#[derive(Debug, Clone)]
pub enum RequestMatcher {
    /// Regex on the URL path
    Path(Regex),
    /// Any of the given lowercase extensions
    Extensions(Vec<String>),
    Destination(Destination),
    Navigation,
    AnyOf(Vec<RequestMatcher>),
    Any,
}

impl RequestMatcher {
    /// # Errors
    ///
    /// Returns `Error::InvalidPattern` if `pattern` is not a valid regex.
    pub fn path(pattern: &str) -> Result<Self> {
        compile(pattern).map(RequestMatcher::Path)
    }

    pub fn extensions(exts: &[&str]) -> Self {
        RequestMatcher::Extensions(exts.iter().map(|e| e.to_ascii_lowercase()).collect())
    }

    pub fn matches(&self, request: &Request) -> bool {
        match self {
            RequestMatcher::Path(re) => re.is_match(request.path()),
            RequestMatcher::Extensions(exts) => request
                .extension()
                .is_some_and(|ext| exts.iter().any(|e| *e == ext)),
            RequestMatcher::Destination(d) => request.destination() == *d,
            RequestMatcher::Navigation => request.is_navigation(),
            RequestMatcher::AnyOf(all) => all.iter().any(|m| m.matches(request)),
            RequestMatcher::Any => true,
        }
    }
}

/// `{predicate, bucket}` pair; rules are evaluated top down, first match wins
#[derive(Debug, Clone)]
pub struct RouteRule {
    pub matcher: RequestMatcher,
    pub bucket: Bucket,
}

impl RouteRule {
    pub fn new(matcher: RequestMatcher, bucket: Bucket) -> Self {
        Self { matcher, bucket }
    }
}

/// Why a request skipped the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BypassReason {
    /// Only GET is cached
    Method,
    /// Path is on the always-fresh exclusion list
    Excluded,
    /// The worker is not the active one, so its buckets are off limits
    Inactive,
}

/// Result of classifying a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Bypass(BypassReason),
    Cached(Bucket),
}

pub(crate) fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| Error::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}

/// Default always-fresh paths: analytics, tracking, log shipping and socket polling
pub const DEFAULT_EXCLUSIONS: &[&str] = &[
    r"/analytics(/|$)",
    r"/tracking(/|$)",
    r"/logs?(/|$)",
    r"^/socket\.io/",
];

pub const DEFAULT_API_PATTERN: &str = r"^/api/";

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "svg", "ico", "avif"];
const FONT_EXTENSIONS: &[&str] = &["woff", "woff2", "ttf", "otf", "eot"];
const SCRIPT_EXTENSIONS: &[&str] = &["js", "mjs"];
const STYLE_EXTENSIONS: &[&str] = &["css"];

/// Built-in classification rules after the API rule
pub(crate) fn default_rules(api: Regex) -> Vec<RouteRule> {
    let by = |dest, exts| {
        RequestMatcher::AnyOf(vec![
            RequestMatcher::Destination(dest),
            RequestMatcher::extensions(exts),
        ])
    };
    vec![
        RouteRule::new(RequestMatcher::Path(api), Bucket::Api),
        RouteRule::new(by(Destination::Image, IMAGE_EXTENSIONS), Bucket::Images),
        RouteRule::new(by(Destination::Font, FONT_EXTENSIONS), Bucket::Fonts),
        RouteRule::new(by(Destination::Script, SCRIPT_EXTENSIONS), Bucket::Scripts),
        RouteRule::new(by(Destination::Style, STYLE_EXTENSIONS), Bucket::Styles),
        RouteRule::new(RequestMatcher::Navigation, Bucket::Static),
        RouteRule::new(RequestMatcher::Any, Bucket::Dynamic),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_name_roundtrip() {
        let name = Bucket::Images.storage_name("bookie-pwa", "v2.1.0");
        assert_eq!(name, "bookie-pwa-images-v2.1.0");
        assert_eq!(
            Bucket::parse_storage_name(&name, "bookie-pwa"),
            Some((Bucket::Images, "v2.1.0"))
        );
        assert_eq!(Bucket::parse_storage_name(&name, "other"), None);
        assert_eq!(Bucket::parse_storage_name("bookie-pwa-bogus-v1", "bookie-pwa"), None);
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let policy = Policy::new(Strategy::CacheFirst).max_entries(0);
        assert!(policy.validate().is_err());
    }

    #[test]
    fn test_extension_matcher() {
        let m = RequestMatcher::extensions(&["PNG", "svg"]);
        assert!(m.matches(&Request::get("https://app.test/a.png").unwrap()));
        assert!(!m.matches(&Request::get("https://app.test/a.js").unwrap()));
    }

    #[test]
    fn test_invalid_pattern() {
        let err = RequestMatcher::path("([").unwrap_err();
        assert!(matches!(err, Error::InvalidPattern { .. }));
    }
}
