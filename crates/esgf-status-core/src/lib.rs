//! esgf-status-core - Core library for esgf-status
//!
//! Reports which ESGF nodes are up, scraped from the ESGF status page with a
//! headless browser and cached on disk for a short TTL.
//!
//! ```no_run
//! use esgf_status_core::{StatusConfig, StatusProvider};
//!
//! let config = StatusConfig::from_home()?;
//! let provider = StatusProvider::from_config(&config)?;
//! for node in provider.get_status()?.available_nodes() {
//!     println!("{node}");
//! }
//! # Ok::<(), esgf_status_core::StatusError>(())
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod models;
pub mod provider;

pub use cache::StatusCache;
pub use config::{StatusConfig, DEFAULT_CACHE_TTL, ESGF_NODES_STATUS_URL};
pub use error::{CacheError, StatusError, StatusFetchError};
pub use fetcher::{ChromeRenderer, FetchNodeStatus, PageRenderer, StatusFetcher};
pub use models::NodeStatus;
pub use provider::StatusProvider;
