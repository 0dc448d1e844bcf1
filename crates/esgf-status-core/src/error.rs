//! Error types for esgf-status-core
//!
//! Three layers, matching the three components:
//! - [`CacheError`]: local cache file problems (mostly recoverable)
//! - [`StatusFetchError`]: browser / page structure problems
//! - [`StatusError`]: the narrow type returned by the provider

use std::path::PathBuf;
use thiserror::Error;

/// Error reading or writing the node status cache file
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache file not found: {path}")]
    Missing { path: PathBuf },

    #[error("Failed to read cache file: {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed cache file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize node status")]
    Serialize(#[source] serde_json::Error),

    #[error("Failed to write cache file: {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create cache directory: {path}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to remove cache file: {path}")]
    Remove {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CacheError {
    /// True for faults that should be treated as a cache miss.
    ///
    /// A missing or unparseable file is a content problem and triggers a
    /// fresh fetch. Any other I/O failure (permission denied, read-only
    /// filesystem, ...) is environmental and would make every call fetch
    /// again, so it is surfaced instead.
    pub fn is_recoverable(&self) -> bool {
        match self {
            CacheError::Missing { .. } | CacheError::Parse { .. } => true,
            CacheError::Read { source, .. } => {
                source.kind() == std::io::ErrorKind::NotFound
                    || source.kind() == std::io::ErrorKind::InvalidData
            }
            _ => false,
        }
    }
}

/// Error scraping the node status page
#[derive(Error, Debug)]
pub enum StatusFetchError {
    // ===================
    // Browser
    // ===================
    #[error("Failed to launch headless browser: {message}")]
    BrowserLaunch { message: String },

    #[error("Failed to load {url}: {message}")]
    Navigation { url: String, message: String },

    #[error("Operation timed out after {timeout_secs}s: {operation}")]
    Timeout {
        operation: String,
        timeout_secs: u64,
    },

    // ===================
    // Page structure
    // ===================
    #[error("Malformed HTML at {url}: table body ({selector}) not found")]
    TableNotFound { url: String, selector: String },

    #[error("Failed to read table contents at {url}: {message}")]
    Extraction { url: String, message: String },
}

impl StatusFetchError {
    /// True when the page loaded but did not have the expected shape
    pub fn is_structural(&self) -> bool {
        matches!(self, StatusFetchError::TableNotFound { .. })
    }
}

/// Error returned by [`crate::StatusProvider`]
#[derive(Error, Debug)]
pub enum StatusError {
    #[error(transparent)]
    Fetch(#[from] StatusFetchError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("Home directory not found")]
    HomeNotFound,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_missing_and_parse_are_recoverable() {
        let missing = CacheError::Missing {
            path: PathBuf::from("/tmp/x.json"),
        };
        assert!(missing.is_recoverable());

        let parse_source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let parse = CacheError::Parse {
            path: PathBuf::from("/tmp/x.json"),
            source: parse_source,
        };
        assert!(parse.is_recoverable());
    }

    #[test]
    fn test_permission_denied_is_not_recoverable() {
        let err = CacheError::Read {
            path: PathBuf::from("/tmp/x.json"),
            source: io::Error::from(io::ErrorKind::PermissionDenied),
        };
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_read_race_with_deletion_is_recoverable() {
        let err = CacheError::Read {
            path: PathBuf::from("/tmp/x.json"),
            source: io::Error::from(io::ErrorKind::NotFound),
        };
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_write_failure_is_not_recoverable() {
        let err = CacheError::Write {
            path: PathBuf::from("/tmp/x.json"),
            source: io::Error::from(io::ErrorKind::PermissionDenied),
        };
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_fetch_error_passes_through_status_error() {
        let err: StatusError = StatusFetchError::TableNotFound {
            url: "https://example.org".to_string(),
            selector: "tbody.ant-table-tbody".to_string(),
        }
        .into();

        assert_eq!(
            err.to_string(),
            "Malformed HTML at https://example.org: table body (tbody.ant-table-tbody) not found"
        );
        match err {
            StatusError::Fetch(inner) => assert!(inner.is_structural()),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
