//! Local tracking pointers and the per-database sync state machine.
//!
//! The tracking record remembers which branch and commit the working copy
//! was last synchronized against. It seeds the base reference of the next
//! push and drives the state machine:
//!
//! `Untracked -> (pull|push) -> Tracked -> (pull matching the recorded
//! head) -> Synced`; observing a different head than recorded moves a
//! Tracked/Synced database to `Diverged`; a forced push moves `Diverged`
//! back to `Synced`. A failed push changes nothing.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::MetadataError;

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

/// Synchronization state of a local working copy relative to the remote.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    /// Never pulled or pushed.
    #[default]
    Untracked,
    /// Synchronized at least once.
    Tracked,
    /// Local head matches the last observed remote head.
    Synced,
    /// Remote history has moved past the locally recorded head.
    Diverged,
}

impl std::fmt::Display for SyncState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Untracked => write!(f, "untracked"),
            Self::Tracked => write!(f, "tracked"),
            Self::Synced => write!(f, "synced"),
            Self::Diverged => write!(f, "diverged"),
        }
    }
}

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// Per-database tracking pointers, persisted across invocations.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrackingRecord {
    /// Branch the working copy was last synchronized against.
    #[serde(default)]
    pub branch: Option<String>,
    /// Commit id the working copy was last synchronized against.
    #[serde(default)]
    pub commit: Option<String>,
    /// Current state-machine state.
    #[serde(default)]
    pub state: SyncState,
}

impl TrackingRecord {
    /// Apply a successful pull that resolved to `head`.
    pub fn observe_pull(&mut self, branch: Option<&str>, head: Option<&str>) {
        self.state = match (self.state, head, self.commit.as_deref()) {
            (SyncState::Untracked, _, _) => SyncState::Tracked,
            (_, Some(h), Some(c)) if h == c => SyncState::Synced,
            (_, Some(_), _) => SyncState::Diverged,
            // Remote did not declare a head; all we know is that we synced.
            (state, None, _) => state.max_tracked(),
        };
        if let Some(b) = branch {
            self.branch = Some(b.to_string());
        }
        if let Some(h) = head {
            self.commit = Some(h.to_string());
        }
        debug!(state = %self.state, "tracking updated after pull");
    }

    /// Apply a successful push that created `commit_id`.
    ///
    /// A push only succeeds when the remote accepted our base (fast-forward)
    /// or the force flag overrode its history, so the new commit is the
    /// remote head afterwards.
    pub fn observe_push(&mut self, branch: &str, commit_id: &str) {
        self.state = match self.state {
            SyncState::Untracked => SyncState::Tracked,
            SyncState::Tracked | SyncState::Synced | SyncState::Diverged => SyncState::Synced,
        };
        self.branch = Some(branch.to_string());
        self.commit = Some(commit_id.to_string());
        debug!(state = %self.state, commit_id, "tracking updated after push");
    }
}

impl SyncState {
    fn max_tracked(self) -> Self {
        match self {
            Self::Untracked => Self::Tracked,
            other => other,
        }
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Persistence for [`TrackingRecord`]s, `<root>/<db>/tracking.json`.
///
/// Same atomic write-temp-then-rename discipline as the metadata store;
/// same single-writer assumption.
#[derive(Debug, Clone)]
pub struct TrackingStore {
    root: PathBuf,
}

impl TrackingStore {
    /// Create a store rooted at `root`.
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    /// Path of the tracking record for a database.
    pub fn record_path(&self, db: &str) -> PathBuf {
        self.root.join(db).join("tracking.json")
    }

    /// Load the tracking record for `db`; missing or malformed records
    /// yield the zero-value default (malformed ones are logged).
    pub fn load(&self, db: &str) -> TrackingRecord {
        let path = self.record_path(db);
        let contents = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(_) => return TrackingRecord::default(),
        };
        match serde_json::from_str(&contents) {
            Ok(rec) => rec,
            Err(e) => {
                tracing::warn!(db, error = %e, "tracking record is malformed, resetting");
                TrackingRecord::default()
            }
        }
    }

    /// Persist the tracking record for `db`.
    pub fn save(&self, db: &str, rec: &TrackingRecord) -> Result<(), MetadataError> {
        let path = self.record_path(db);
        let dir = path
            .parent()
            .expect("record path always has a parent directory");
        std::fs::create_dir_all(dir)?;

        let contents = serde_json::to_vec_pretty(rec)
            .map_err(|e| MetadataError::EncodeError(e.to_string()))?;

        let tmp = tempfile::NamedTempFile::new_in(dir)?;
        std::fs::write(tmp.path(), &contents)?;
        tmp.persist(&path).map_err(|e| e.error)?;

        info!(db, state = %rec.state, "saved tracking record");
        Ok(())
    }
}
