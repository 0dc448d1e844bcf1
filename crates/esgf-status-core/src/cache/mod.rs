//! Caching layer for esgf-status-core
//!
//! A single JSON file whose mtime bounds its freshness.

pub mod status_cache;

pub use status_cache::StatusCache;
