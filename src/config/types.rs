//! Router configuration and its builder

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use regex::Regex;

use crate::config::policy::{
    self, Bucket, BypassReason, Classification, DEFAULT_API_PATTERN, DEFAULT_EXCLUSIONS, Policy,
    RequestMatcher, RouteRule,
};
use crate::error::Result;
use crate::http::{Method, Request};

/// Scope used when none is configured
pub const DEFAULT_SCOPE: &str = "http://localhost/";

/// Default page-side wait for a control reply
pub const DEFAULT_CONTROL_TIMEOUT: Duration = Duration::from_secs(5);

/// Immutable configuration handed to a [`CacheRouter`](crate::CacheRouter)
///
/// Built once per deployment (or per test) with [`RouterConfig::builder`].
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Prefix of every bucket storage name (usually the app name)
    pub prefix: String,

    /// Version tag; buckets carrying any other tag are purged on activation
    pub version: String,

    /// Origin the worker controls; precache paths resolve against it
    pub scope: String,

    /// Directory used by the persistent file store
    pub storage_dir: PathBuf,

    /// Pretty-print persisted bucket files
    pub pretty_json: bool,

    /// Policy per bucket
    pub policies: BTreeMap<Bucket, Policy>,

    /// Always-fresh path patterns (never cached)
    pub exclusions: Vec<Regex>,

    /// Ordered classification rules, first match wins
    pub rules: Vec<RouteRule>,

    /// Paths fetched into the static bucket at install time
    pub precache: Vec<String>,

    /// Document served to navigations when both network and cache miss
    pub offline_fallback: Option<String>,

    /// How long the page-side channel waits for a reply
    pub control_timeout: Duration,
}

impl RouterConfig {
    /// Create a new builder for `RouterConfig`
    ///
    /// # Example
    /// ```rust
    /// use swcache::RouterConfig;
    ///
    /// let config = RouterConfig::builder("bookie-pwa", "v2.1.0")
    ///     .offline_fallback("/offline.html")
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(config.version, "v2.1.0");
    /// ```
    pub fn builder(prefix: impl Into<String>, version: impl Into<String>) -> RouterConfigBuilder {
        RouterConfigBuilder::new(prefix, version)
    }

    /// Policy for `bucket`, falling back to the built-in one
    pub fn policy(&self, bucket: Bucket) -> Policy {
        self.policies
            .get(&bucket)
            .copied()
            .unwrap_or_else(|| bucket.default_policy())
    }

    /// Storage name of `bucket` for the current version
    pub fn storage_name(&self, bucket: Bucket) -> String {
        bucket.storage_name(&self.prefix, &self.version)
    }

    /// All storage names this version owns
    pub fn storage_names(&self) -> Vec<String> {
        Bucket::ALL.iter().map(|b| self.storage_name(*b)).collect()
    }

    /// Whether `name` is one of this version's bucket storage names
    pub fn is_current(&self, name: &str) -> bool {
        matches!(
            Bucket::parse_storage_name(name, &self.prefix),
            Some((_, version)) if version == self.version
        )
    }

    /// Classify a request: non-GET and excluded paths bypass, everything else
    /// goes to the first matching rule's bucket
    pub fn classify(&self, request: &Request) -> Classification {
        if request.method() != Method::Get {
            return Classification::Bypass(BypassReason::Method);
        }
        if self.exclusions.iter().any(|re| re.is_match(request.path())) {
            return Classification::Bypass(BypassReason::Excluded);
        }
        let bucket = self
            .rules
            .iter()
            .find(|rule| rule.matcher.matches(request))
            .map_or(Bucket::Dynamic, |rule| rule.bucket);
        Classification::Cached(bucket)
    }
}

/// Builder for creating `RouterConfig` with a fluent API
#[derive(Debug, Clone)]
pub struct RouterConfigBuilder {
    prefix: String,
    version: String,
    scope: String,
    storage_dir: Option<PathBuf>,
    pretty_json: bool,
    policies: BTreeMap<Bucket, Policy>,
    exclusions: Vec<String>,
    api_pattern: String,
    custom_rules: Vec<RouteRule>,
    precache: Vec<String>,
    offline_fallback: Option<String>,
    control_timeout: Duration,
}

impl RouterConfigBuilder {
    /// Create a new builder with the bucket prefix and version tag
    pub fn new(prefix: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            version: version.into(),
            scope: DEFAULT_SCOPE.to_string(),
            storage_dir: None,
            pretty_json: true,
            policies: BTreeMap::new(),
            exclusions: DEFAULT_EXCLUSIONS.iter().map(|p| (*p).to_string()).collect(),
            api_pattern: DEFAULT_API_PATTERN.to_string(),
            custom_rules: Vec::new(),
            precache: vec!["/manifest.json".to_string()],
            offline_fallback: None,
            control_timeout: DEFAULT_CONTROL_TIMEOUT,
        }
    }

    /// Origin (and path prefix) the worker controls, e.g. `https://app.example/`
    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    /// Set the directory for persisted buckets
    ///
    /// Supports `~` expansion for home directory.
    pub fn storage_dir(mut self, path: impl Into<PathBuf>) -> Self {
        let path: PathBuf = path.into();
        let expanded = match (path.strip_prefix("~"), dirs::home_dir()) {
            (Ok(rest), Some(home)) => home.join(rest),
            _ => path,
        };
        self.storage_dir = Some(expanded);
        self
    }

    /// Write bucket files without pretty printing
    pub fn compact_json(mut self) -> Self {
        self.pretty_json = false;
        self
    }

    /// Override the policy of one bucket
    pub fn policy(mut self, bucket: Bucket, policy: Policy) -> Self {
        self.policies.insert(bucket, policy);
        self
    }

    /// Add an always-fresh path pattern (regex on the URL path)
    pub fn exclude(mut self, pattern: impl Into<String>) -> Self {
        self.exclusions.push(pattern.into());
        self
    }

    /// Drop the built-in exclusion patterns
    pub fn clear_exclusions(mut self) -> Self {
        self.exclusions.clear();
        self
    }

    /// Regex on the URL path that marks API requests (default `^/api/`)
    pub fn api_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.api_pattern = pattern.into();
        self
    }

    /// Add a classification rule evaluated before the built-in ones
    pub fn route(mut self, matcher: RequestMatcher, bucket: Bucket) -> Self {
        self.custom_rules.push(RouteRule::new(matcher, bucket));
        self
    }

    /// Add a path to precache at install time
    pub fn precache(mut self, path: impl Into<String>) -> Self {
        self.precache.push(path.into());
        self
    }

    /// Replace the precache list
    pub fn precache_list<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        self.precache = paths.into_iter().map(Into::into).collect();
        self
    }

    /// Document returned to navigations when offline with nothing cached.
    /// It is also precached.
    pub fn offline_fallback(mut self, path: impl Into<String>) -> Self {
        self.offline_fallback = Some(path.into());
        self
    }

    pub fn control_timeout(mut self, timeout: Duration) -> Self {
        self.control_timeout = timeout;
        self
    }

    /// Build the `RouterConfig`
    ///
    /// If `storage_dir` is not set, uses the system cache directory for the prefix.
    ///
    /// # Errors
    ///
    /// Returns an error if a pattern does not compile, a policy is invalid, or
    /// prefix/version are empty.
    pub fn build(self) -> Result<RouterConfig> {
        if self.prefix.is_empty() || self.version.is_empty() {
            return Err(crate::Error::Config(
                "prefix and version must not be empty".into(),
            ));
        }
        for policy in self.policies.values() {
            policy.validate()?;
        }
        url::Url::parse(&self.scope).map_err(|e| crate::Error::InvalidUrl {
            url: self.scope.clone(),
            reason: e.to_string(),
        })?;

        let exclusions = self
            .exclusions
            .iter()
            .map(|p| policy::compile(p))
            .collect::<Result<Vec<_>>>()?;

        let mut rules = self.custom_rules;
        rules.extend(policy::default_rules(policy::compile(&self.api_pattern)?));

        let mut precache = self.precache;
        if let Some(fallback) = &self.offline_fallback {
            if !precache.contains(fallback) {
                precache.insert(0, fallback.clone());
            }
        }

        let storage_dir = self.storage_dir.unwrap_or_else(|| {
            dirs::cache_dir()
                .map(|d| d.join(&self.prefix))
                .unwrap_or_else(|| PathBuf::from("."))
        });

        Ok(RouterConfig {
            prefix: self.prefix,
            version: self.version,
            scope: self.scope,
            storage_dir,
            pretty_json: self.pretty_json,
            policies: self.policies,
            exclusions,
            rules,
            precache,
            offline_fallback: self.offline_fallback,
            control_timeout: self.control_timeout,
        })
    }
}
