//! Router configuration
//!
//! - `RouterConfig` - Immutable configuration handed to the router
//! - `Bucket` / `Policy` - Named buckets and their caching policy
//! - `RouteRule` / `RequestMatcher` - Ordered classification rules

mod policy;
mod types;

pub use policy::{
    Bucket, BypassReason, Classification, DEFAULT_API_PATTERN, DEFAULT_EXCLUSIONS, Policy,
    RequestMatcher, RouteRule,
};

pub use types::{DEFAULT_CONTROL_TIMEOUT, DEFAULT_SCOPE, RouterConfig, RouterConfigBuilder};
