//! Error types for swcache

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for swcache operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for swcache
#[derive(Error, Debug)]
pub enum Error {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("Failed to read file '{path}': {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create directory '{path}': {source}")]
    DirectoryCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read directory '{path}': {source}")]
    DirectoryRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to delete file '{path}': {source}")]
    FileDelete {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Failed to serialize data: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to parse cache file: {0}")]
    Parse(String),

    // -------------------------------------------------------------------------
    // Request Errors
    // -------------------------------------------------------------------------
    #[error("Invalid request URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    // -------------------------------------------------------------------------
    // Network Errors
    // -------------------------------------------------------------------------
    #[error("Network request for '{url}' failed: {reason}")]
    Network { url: String, reason: String },

    #[error("Network request for '{url}' timed out after {timeout:?}")]
    Timeout { url: String, timeout: Duration },

    // -------------------------------------------------------------------------
    // Store Errors
    // -------------------------------------------------------------------------
    #[error("Cache quota exceeded: {needed} bytes needed, {available} available")]
    QuotaExceeded { needed: usize, available: usize },

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Invalid cache strategy: {0}")]
    InvalidCacheStrategy(String),

    // -------------------------------------------------------------------------
    // Lifecycle Errors
    // -------------------------------------------------------------------------
    #[error("Worker cannot {action} while {state}")]
    InvalidState { action: String, state: String },

    #[error("No waiting worker to activate")]
    NoWaitingWorker,
}

impl Error {
    /// Check if this error came from the network side (unreachable or timed out)
    #[must_use]
    pub fn is_network_error(&self) -> bool {
        matches!(self, Error::Network { .. } | Error::Timeout { .. })
    }

    /// Check if this error came from the cache store
    #[must_use]
    pub fn is_storage_error(&self) -> bool {
        matches!(
            self,
            Error::FileRead { .. }
                | Error::FileWrite { .. }
                | Error::DirectoryCreate { .. }
                | Error::DirectoryRead { .. }
                | Error::FileDelete { .. }
                | Error::Serialize(_)
                | Error::Parse(_)
                | Error::QuotaExceeded { .. }
        )
    }

    pub(crate) fn network(url: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Error::Network {
            url: url.into(),
            reason: reason.to_string(),
        }
    }
}
