//! Cached access to ESGF node status
//!
//! Serves the cached mapping while it is younger than the TTL, otherwise
//! scrapes the status page once and rewrites the cache.

use crate::cache::StatusCache;
use crate::config::StatusConfig;
use crate::error::StatusError;
use crate::fetcher::{FetchNodeStatus, StatusFetcher};
use crate::models::NodeStatus;
use tracing::debug;

/// Cache-first node status lookup
#[derive(Debug)]
pub struct StatusProvider<F = StatusFetcher> {
    cache: StatusCache,
    fetcher: F,
}

impl StatusProvider<StatusFetcher> {
    /// Provider scraping with headless Chrome.
    ///
    /// Creates the cache directory; construct once per process.
    pub fn from_config(config: &StatusConfig) -> Result<Self, StatusError> {
        let cache = StatusCache::new(&config.cache_file, config.ttl);
        cache.init()?;
        Ok(Self::new(cache, StatusFetcher::from_config(config)))
    }
}

impl<F: FetchNodeStatus> StatusProvider<F> {
    /// Assemble from parts; the caller is responsible for `cache.init()`
    pub fn new(cache: StatusCache, fetcher: F) -> Self {
        Self { cache, fetcher }
    }

    pub fn cache(&self) -> &StatusCache {
        &self.cache
    }

    /// Node availability, from cache when fresh.
    ///
    /// A missing or corrupted cache file falls through to a live fetch. Fetch
    /// errors and cache I/O errors (e.g. permission denied) are returned.
    pub fn get_status(&self) -> Result<NodeStatus, StatusError> {
        if self.cache.is_valid() {
            match self.cache.load() {
                Ok(status) => {
                    debug!(path = %self.cache.path().display(), "Node status cache hit");
                    return Ok(status);
                }
                Err(e) if e.is_recoverable() => {
                    debug!(
                        error = %e,
                        "Could not load ESGF node status from cache, fetching again"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        } else {
            debug!(path = %self.cache.path().display(), "Node status cache missing or expired");
        }

        self.refresh()
    }

    /// Fetch live status and overwrite the cache, ignoring freshness
    pub fn refresh(&self) -> Result<NodeStatus, StatusError> {
        let status = self.fetcher.fetch()?;
        self.cache.write(&status)?;
        Ok(status)
    }

    /// Availability of one node; `None` when the page does not list it
    pub fn is_available(&self, node: &str) -> Result<Option<bool>, StatusError> {
        Ok(self.get_status()?.get(node))
    }
}
