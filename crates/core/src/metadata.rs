//! Per-database metadata model and persistence.
//!
//! A [`Metadata`] record mirrors what the remote knows about a database:
//! its branches, its commits, and the active branch. It is loaded,
//! optionally mutated, and re-persisted on every successful
//! synchronization, never partially written.

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::MetadataError;

// ---------------------------------------------------------------------------
// Model
// ---------------------------------------------------------------------------

/// An immutable record describing one version of a database's content and
/// its lineage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommitInfo {
    /// Parent commit id; empty for a root commit.
    #[serde(default)]
    pub parent: String,
    pub author_name: String,
    pub author_email: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    /// SHA-256 hex digest of the database content at this commit.
    pub digest: String,
}

/// Branch and commit history for one database.
///
/// Invariants, enforced at save time:
/// - every value in `branches` is a key of `commits`
/// - `active_branch`, if non-empty, is a key of `branches`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Metadata {
    #[serde(default)]
    pub active_branch: String,
    #[serde(default)]
    pub branches: HashMap<String, String>,
    #[serde(default)]
    pub commits: HashMap<String, CommitInfo>,
}

impl Metadata {
    /// Check the structural invariants, returning a description of the
    /// first violation found.
    pub fn validate(&self) -> Result<(), MetadataError> {
        for (branch, commit_id) in &self.branches {
            if !self.commits.contains_key(commit_id) {
                return Err(MetadataError::InvariantViolation(format!(
                    "branch '{}' points at unknown commit {}",
                    branch, commit_id
                )));
            }
        }
        if !self.active_branch.is_empty() && !self.branches.contains_key(&self.active_branch) {
            return Err(MetadataError::InvariantViolation(format!(
                "active branch '{}' is not a known branch",
                self.active_branch
            )));
        }
        Ok(())
    }

    /// The commit id the active branch points at, if any.
    pub fn head(&self) -> Option<&str> {
        self.branches.get(&self.active_branch).map(|s| s.as_str())
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Persistence for per-database [`Metadata`] records.
///
/// Records live at `<root>/<db>/metadata.json`. Saves are atomic with
/// respect to process crash: the record is written to a temporary file in
/// the same directory and renamed into place, so readers never observe a
/// half-written record. Not safe for concurrent multi-process mutation.
#[derive(Debug, Clone)]
pub struct MetadataStore {
    root: PathBuf,
}

impl MetadataStore {
    /// Create a store rooted at `root`.
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    /// Path of the metadata record for a database.
    pub fn record_path(&self, db: &str) -> PathBuf {
        self.root.join(db).join("metadata.json")
    }

    /// Load the metadata record for `db`.
    ///
    /// A missing record is not an error: a fresh zero-value [`Metadata`] is
    /// returned. A malformed record is treated the same way, but the parse
    /// failure is logged so the recovery is observable.
    pub fn load(&self, db: &str) -> Metadata {
        let path = self.record_path(db);
        let contents = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(_) => {
                debug!(db, "no metadata record, starting fresh");
                return Metadata::default();
            }
        };
        match serde_json::from_str(&contents) {
            Ok(meta) => meta,
            Err(e) => {
                warn!(db, error = %e, "metadata record is malformed, treating as no history");
                Metadata::default()
            }
        }
    }

    /// Persist the metadata record for `db`.
    ///
    /// The record is validated first; a [`MetadataError::InvariantViolation`]
    /// means nothing was written.
    pub fn save(&self, db: &str, meta: &Metadata) -> Result<(), MetadataError> {
        meta.validate()?;

        let path = self.record_path(db);
        let dir = path
            .parent()
            .expect("record path always has a parent directory");
        std::fs::create_dir_all(dir)?;

        let contents = serde_json::to_vec_pretty(meta)
            .map_err(|e| MetadataError::EncodeError(e.to_string()))?;

        let tmp = tempfile::NamedTempFile::new_in(dir)?;
        std::fs::write(tmp.path(), &contents)?;
        tmp.persist(&path).map_err(|e| e.error)?;

        info!(
            db,
            branches = meta.branches.len(),
            commits = meta.commits.len(),
            "saved metadata record"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn commit(digest: &str) -> CommitInfo {
        CommitInfo {
            parent: String::new(),
            author_name: "Alice".into(),
            author_email: "alice@example.com".into(),
            message: "initial".into(),
            timestamp: Utc::now(),
            digest: digest.into(),
        }
    }

    fn valid_meta() -> Metadata {
        let mut meta = Metadata::default();
        meta.commits.insert("c1".into(), commit("d1"));
        meta.branches.insert("master".into(), "c1".into());
        meta.active_branch = "master".into();
        meta
    }

    #[test]
    fn test_load_missing_returns_default() {
        let dir = tempfile::tempdir().unwrap();
        let store = MetadataStore::new(dir.path());
        let meta = store.load("ghost.db");
        assert_eq!(meta, Metadata::default());
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = MetadataStore::new(dir.path());

        let meta = valid_meta();
        store.save("sales.db", &meta).unwrap();
        let loaded = store.load("sales.db");
        assert_eq!(loaded, meta);
        assert_eq!(loaded.head(), Some("c1"));
    }

    #[test]
    fn test_save_rejects_dangling_branch() {
        let dir = tempfile::tempdir().unwrap();
        let store = MetadataStore::new(dir.path());

        let mut meta = valid_meta();
        meta.branches.insert("dev".into(), "nope".into());
        let result = store.save("sales.db", &meta);
        assert!(matches!(result, Err(MetadataError::InvariantViolation(_))));
        // Nothing was written.
        assert!(!store.record_path("sales.db").exists());
    }

    #[test]
    fn test_save_rejects_unknown_active_branch() {
        let dir = tempfile::tempdir().unwrap();
        let store = MetadataStore::new(dir.path());

        let mut meta = valid_meta();
        meta.active_branch = "missing".into();
        assert!(matches!(
            store.save("sales.db", &meta),
            Err(MetadataError::InvariantViolation(_))
        ));
    }

    #[test]
    fn test_empty_active_branch_is_allowed() {
        let mut meta = valid_meta();
        meta.active_branch = String::new();
        assert!(meta.validate().is_ok());
    }

    #[test]
    fn test_load_malformed_record_returns_default() {
        let dir = tempfile::tempdir().unwrap();
        let store = MetadataStore::new(dir.path());

        let path = store.record_path("sales.db");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"{ not json").unwrap();

        let meta = store.load("sales.db");
        assert_eq!(meta, Metadata::default());
    }

    #[test]
    fn test_save_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = MetadataStore::new(dir.path());
        store.save("sales.db", &valid_meta()).unwrap();

        let entries: Vec<_> = std::fs::read_dir(dir.path().join("sales.db"))
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("metadata.json")]);
    }
}
