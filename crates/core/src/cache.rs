//! Content-addressed local blob cache.
//!
//! Every downloaded database revision is stored once, under a file named by
//! the SHA-256 hex digest of its bytes. The store is append-only and
//! deduplicating: writing the same bytes twice is a no-op after the first
//! write. Blobs are never deleted by this subsystem.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::errors::CacheError;

/// Compute the SHA-256 hex digest of a byte slice.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Content-addressed blob store scoped by database name.
///
/// Layout: `<root>/<db>/blobs/<sha256-hex>`. Not safe for concurrent
/// multi-process mutation; single-writer-at-a-time usage is assumed.
#[derive(Debug, Clone)]
pub struct ContentCache {
    root: PathBuf,
}

impl ContentCache {
    /// Create a cache rooted at `root`. No directories are created until
    /// first use.
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    /// The blob directory for a database.
    pub fn blob_dir(&self, db: &str) -> PathBuf {
        self.root.join(db).join("blobs")
    }

    /// Ensure the cache directory structure for `db` exists, creating it
    /// on demand. Returns the blob directory.
    pub fn ensure_db_dir(&self, db: &str) -> Result<PathBuf, CacheError> {
        let dir = self.blob_dir(db);
        if !dir.exists() {
            std::fs::create_dir_all(&dir)?;
            debug!(path = %dir.display(), "created cache directory");
        }
        Ok(dir)
    }

    /// Store `bytes` under their SHA-256 digest and return the digest.
    ///
    /// Idempotent: if a blob with the same digest already exists the write
    /// is skipped. The blob is written to a temporary file in the same
    /// directory and renamed into place, so a crash never leaves a
    /// half-written blob under its final name.
    pub fn put(&self, db: &str, bytes: &[u8]) -> Result<String, CacheError> {
        let dir = self.ensure_db_dir(db)?;
        let digest = sha256_hex(bytes);
        let path = dir.join(&digest);

        if path.exists() {
            debug!(digest = %digest, "blob already cached");
            return Ok(digest);
        }

        let tmp = tempfile::NamedTempFile::new_in(&dir)?;
        std::fs::write(tmp.path(), bytes)?;
        tmp.persist(&path).map_err(|e| e.error)?;

        info!(db, digest = %digest, size = bytes.len(), "cached blob");
        Ok(digest)
    }

    /// Retrieve the blob with the given digest.
    pub fn get(&self, db: &str, digest: &str) -> Result<Vec<u8>, CacheError> {
        let path = self.blob_dir(db).join(digest);
        if !path.exists() {
            return Err(CacheError::NotFound(digest.to_string()));
        }
        Ok(std::fs::read(path)?)
    }

    /// Whether a blob with the given digest is cached.
    pub fn contains(&self, db: &str, digest: &str) -> bool {
        self.blob_dir(db).join(digest).exists()
    }

    /// The cache root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_matches_filename() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ContentCache::new(dir.path());

        let digest = cache.put("sales.db", b"hello world").unwrap();
        assert_eq!(digest, sha256_hex(b"hello world"));
        assert!(cache.blob_dir("sales.db").join(&digest).exists());
    }

    #[test]
    fn test_put_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ContentCache::new(dir.path());

        let d1 = cache.put("sales.db", b"same bytes").unwrap();
        let d2 = cache.put("sales.db", b"same bytes").unwrap();
        assert_eq!(d1, d2);

        let entries: Vec<_> = std::fs::read_dir(cache.blob_dir("sales.db"))
            .unwrap()
            .collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_get_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ContentCache::new(dir.path());

        let digest = cache.put("sales.db", b"payload").unwrap();
        let bytes = cache.get("sales.db", &digest).unwrap();
        assert_eq!(bytes, b"payload");
    }

    #[test]
    fn test_get_missing_blob() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ContentCache::new(dir.path());
        cache.ensure_db_dir("sales.db").unwrap();

        let result = cache.get("sales.db", "0000");
        assert!(matches!(result, Err(CacheError::NotFound(d)) if d == "0000"));
    }

    #[test]
    fn test_ensure_db_dir_created_on_demand() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ContentCache::new(dir.path().join("deep").join("cache"));

        assert!(!cache.blob_dir("x.db").exists());
        let created = cache.ensure_db_dir("x.db").unwrap();
        assert!(created.is_dir());
        // Idempotent.
        cache.ensure_db_dir("x.db").unwrap();
    }

    #[test]
    fn test_distinct_content_distinct_entries() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ContentCache::new(dir.path());

        let d1 = cache.put("sales.db", b"one").unwrap();
        let d2 = cache.put("sales.db", b"two").unwrap();
        assert_ne!(d1, d2);
        assert!(cache.contains("sales.db", &d1));
        assert!(cache.contains("sales.db", &d2));
    }
}
