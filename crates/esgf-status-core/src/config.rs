//! Provider configuration
//!
//! Defaults reproduce the fixed ESMValTool values: the cache lives in
//! `~/.esmvaltool/cache/esgf-nodes-status.json` and is fresh for 10 minutes.

use crate::error::StatusError;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// ESGF node status page (client-side rendered Ant Design table)
pub const ESGF_NODES_STATUS_URL: &str = "https://aims2.llnl.gov/nodes";

/// Cache time-to-live (10 minutes)
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(600);

/// Maximum wait for the status table to appear once the page has loaded
pub const DEFAULT_RENDER_TIMEOUT: Duration = Duration::from_secs(60);

/// Maximum wait for the page itself to finish loading
pub const DEFAULT_NAVIGATION_TIMEOUT: Duration = Duration::from_secs(30);

pub const DEFAULT_TABLE_SELECTOR: &str = "tbody.ant-table-tbody";
pub const DEFAULT_ROW_SELECTOR: &str = "tr.ant-table-row";
pub const DEFAULT_CELL_SELECTOR: &str = "td.ant-table-cell";

/// Cache file path relative to the user's home directory
const CACHE_DIR: &str = ".esmvaltool/cache";
const CACHE_FILE_NAME: &str = "esgf-nodes-status.json";

/// Where to cache, what to scrape and how long to wait
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusConfig {
    pub cache_file: PathBuf,
    pub ttl: Duration,
    pub url: String,
    pub table_selector: String,
    pub row_selector: String,
    pub cell_selector: String,
    pub navigation_timeout: Duration,
    pub render_timeout: Duration,
    /// Browser binary; auto-detected when `None`
    pub chrome_path: Option<PathBuf>,
    pub sandbox: bool,
}

impl StatusConfig {
    /// Defaults with the cache file at `cache_file`
    pub fn new(cache_file: impl Into<PathBuf>) -> Self {
        Self {
            cache_file: cache_file.into(),
            ttl: DEFAULT_CACHE_TTL,
            url: ESGF_NODES_STATUS_URL.to_string(),
            table_selector: DEFAULT_TABLE_SELECTOR.to_string(),
            row_selector: DEFAULT_ROW_SELECTOR.to_string(),
            cell_selector: DEFAULT_CELL_SELECTOR.to_string(),
            navigation_timeout: DEFAULT_NAVIGATION_TIMEOUT,
            render_timeout: DEFAULT_RENDER_TIMEOUT,
            chrome_path: None,
            sandbox: true,
        }
    }

    /// Defaults with the cache under `<home>/.esmvaltool/cache`
    pub fn from_home() -> Result<Self, StatusError> {
        let home = dirs::home_dir().ok_or(StatusError::HomeNotFound)?;
        Ok(Self::new(default_cache_file(&home)))
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_render_timeout(mut self, timeout: Duration) -> Self {
        self.render_timeout = timeout;
        self
    }

    pub fn with_navigation_timeout(mut self, timeout: Duration) -> Self {
        self.navigation_timeout = timeout;
        self
    }

    pub fn with_chrome_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.chrome_path = Some(path.into());
        self
    }

    /// Disable the Chrome sandbox (needed when running as root in containers)
    pub fn without_sandbox(mut self) -> Self {
        self.sandbox = false;
        self
    }
}

/// `<home>/.esmvaltool/cache/esgf-nodes-status.json`
pub fn default_cache_file(home: &Path) -> PathBuf {
    home.join(CACHE_DIR).join(CACHE_FILE_NAME)
}
