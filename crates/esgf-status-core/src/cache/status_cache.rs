//! Node status cache file
//!
//! Stores the last scraped [`NodeStatus`] as a JSON object. The file's mtime is
//! the record's age; there is no timestamp inside the file.

use crate::error::CacheError;
use crate::models::NodeStatus;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, info};

/// TTL-bounded JSON cache for a single [`NodeStatus`] record
#[derive(Debug, Clone)]
pub struct StatusCache {
    path: PathBuf,
    ttl: Duration,
}

impl StatusCache {
    pub fn new(path: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            path: path.into(),
            ttl,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Create the enclosing cache directory.
    ///
    /// Called once by the owning process; `write` does not create it.
    pub fn init(&self) -> Result<(), CacheError> {
        let Some(dir) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) else {
            return Ok(());
        };
        fs::create_dir_all(dir).map_err(|source| CacheError::CreateDir {
            path: dir.to_path_buf(),
            source,
        })?;
        debug!(path = %dir.display(), "Cache directory ready");
        Ok(())
    }

    /// Last modification time of the cache file, `None` if it does not exist
    pub fn modified(&self) -> Option<SystemTime> {
        fs::metadata(&self.path)
            .ok()
            .filter(|meta| meta.is_file())
            .and_then(|meta| meta.modified().ok())
    }

    /// Age of the cache file at `now`
    ///
    /// An mtime in the future (clock skew, copied file) counts as age zero.
    pub fn age_at(&self, now: SystemTime) -> Option<Duration> {
        self.modified()
            .map(|mtime| now.duration_since(mtime).unwrap_or(Duration::ZERO))
    }

    pub fn age(&self) -> Option<Duration> {
        self.age_at(SystemTime::now())
    }

    /// True iff the file exists and is strictly younger than the TTL
    pub fn is_valid(&self) -> bool {
        self.is_valid_at(SystemTime::now())
    }

    pub fn is_valid_at(&self, now: SystemTime) -> bool {
        match self.age_at(now) {
            Some(age) => age < self.ttl,
            None => false,
        }
    }

    /// Read and deserialize the cached mapping
    pub fn load(&self) -> Result<NodeStatus, CacheError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(CacheError::Missing {
                    path: self.path.clone(),
                });
            }
            Err(source) => {
                return Err(CacheError::Read {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        let status: NodeStatus =
            serde_json::from_str(&content).map_err(|source| CacheError::Parse {
                path: self.path.clone(),
                source,
            })?;

        debug!(
            path = %self.path.display(),
            nodes = status.len(),
            "Loaded node status from cache"
        );
        Ok(status)
    }

    /// Replace the cache file with `status`.
    ///
    /// Writes a sibling temp file and renames it over the target, so a reader
    /// never sees a half-written record.
    pub fn write(&self, status: &NodeStatus) -> Result<(), CacheError> {
        let json = serde_json::to_string_pretty(status).map_err(CacheError::Serialize)?;

        let tmp_path = self.tmp_path();
        fs::write(&tmp_path, json).map_err(|source| CacheError::Write {
            path: tmp_path.clone(),
            source,
        })?;

        if let Err(source) = fs::rename(&tmp_path, &self.path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(CacheError::Write {
                path: self.path.clone(),
                source,
            });
        }

        info!(
            path = %self.path.display(),
            nodes = status.len(),
            "Saved node status to cache"
        );
        Ok(())
    }

    /// Delete the cache file; returns whether a file was removed
    pub fn clear(&self) -> Result<bool, CacheError> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                info!(path = %self.path.display(), "Cleared node status cache");
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(CacheError::Remove {
                path: self.path.clone(),
                source,
            }),
        }
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const TTL: Duration = Duration::from_secs(600);

    fn sample() -> NodeStatus {
        [("esgf-data1.llnl.gov", true), ("esgf.nci.org.au", false)]
            .into_iter()
            .collect()
    }

    fn set_age(path: &Path, age: Duration) {
        let file = fs::File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() - age).unwrap();
    }

    #[test]
    fn test_write_then_load_round_trip() {
        let dir = tempdir().unwrap();
        let cache = StatusCache::new(dir.path().join("status.json"), TTL);

        cache.write(&sample()).unwrap();

        assert!(cache.is_valid());
        assert_eq!(cache.load().unwrap(), sample());
    }

    #[test]
    fn test_missing_file_is_invalid() {
        let dir = tempdir().unwrap();
        let cache = StatusCache::new(dir.path().join("status.json"), TTL);

        assert!(!cache.is_valid());
        assert!(cache.age().is_none());
        assert!(matches!(cache.load(), Err(CacheError::Missing { .. })));
    }

    #[test]
    fn test_expires_after_ttl() {
        let dir = tempdir().unwrap();
        let cache = StatusCache::new(dir.path().join("status.json"), TTL);
        cache.write(&sample()).unwrap();

        let mtime = cache.modified().unwrap();
        assert!(cache.is_valid_at(mtime + Duration::from_secs(599)));
        assert!(!cache.is_valid_at(mtime + Duration::from_secs(600)));
        assert!(!cache.is_valid_at(mtime + Duration::from_secs(601)));
    }

    #[test]
    fn test_aged_file_within_ttl_is_valid() {
        let dir = tempdir().unwrap();
        let cache = StatusCache::new(dir.path().join("status.json"), TTL);
        cache.write(&sample()).unwrap();

        set_age(cache.path(), Duration::from_secs(100));
        assert!(cache.is_valid());

        set_age(cache.path(), Duration::from_secs(700));
        assert!(!cache.is_valid());
    }

    #[test]
    fn test_future_mtime_counts_as_fresh() {
        let dir = tempdir().unwrap();
        let cache = StatusCache::new(dir.path().join("status.json"), TTL);
        cache.write(&sample()).unwrap();

        let mtime = cache.modified().unwrap();
        let before_write = mtime - Duration::from_secs(30);
        assert_eq!(cache.age_at(before_write), Some(Duration::ZERO));
        assert!(cache.is_valid_at(before_write));
    }

    #[test]
    fn test_corrupted_file_is_parse_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("status.json");
        fs::write(&path, "{not json").unwrap();
        let cache = StatusCache::new(&path, TTL);

        let err = cache.load().unwrap_err();
        assert!(matches!(err, CacheError::Parse { .. }));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_invalid_utf8_is_recoverable() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("status.json");
        fs::write(&path, [0x7b, 0xff, 0xfe, 0x7d]).unwrap();
        let cache = StatusCache::new(&path, TTL);

        let err = cache.load().unwrap_err();
        match &err {
            CacheError::Read { source, .. } => {
                assert_eq!(source.kind(), io::ErrorKind::InvalidData)
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_write_does_not_leave_temp_file() {
        let dir = tempdir().unwrap();
        let cache = StatusCache::new(dir.path().join("status.json"), TTL);
        cache.write(&sample()).unwrap();

        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["status.json".to_string()]);
    }

    #[test]
    fn test_write_overwrites_previous_record() {
        let dir = tempdir().unwrap();
        let cache = StatusCache::new(dir.path().join("status.json"), TTL);
        cache.write(&sample()).unwrap();

        let fresh: NodeStatus = [("esgf-node.ornl.gov", true)].into_iter().collect();
        cache.write(&fresh).unwrap();

        assert_eq!(cache.load().unwrap(), fresh);
    }

    #[test]
    fn test_write_without_init_fails_when_dir_missing() {
        let dir = tempdir().unwrap();
        let cache = StatusCache::new(dir.path().join("nested/cache/status.json"), TTL);

        let err = cache.write(&sample()).unwrap_err();
        assert!(matches!(err, CacheError::Write { .. }));

        cache.init().unwrap();
        cache.write(&sample()).unwrap();
        assert_eq!(cache.load().unwrap(), sample());
    }

    #[test]
    fn test_clear() {
        let dir = tempdir().unwrap();
        let cache = StatusCache::new(dir.path().join("status.json"), TTL);

        assert!(!cache.clear().unwrap());
        cache.write(&sample()).unwrap();
        assert!(cache.clear().unwrap());
        assert!(!cache.path().exists());
    }
}
