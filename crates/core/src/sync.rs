//! Pull/push synchronization orchestration.
//!
//! [`SyncClient`] ties the pieces together: pre-flight validation, selector
//! resolution, the remote service, the content cache, and the metadata and
//! tracking stores. Ordering rules it enforces:
//!
//! 1. No network I/O before validation passes.
//! 2. On pull, the selector is checked against remote metadata before any
//!    content is transferred.
//! 3. Local state is persisted only after the network operation durably
//!    succeeds, content before metadata. A crash in between leaves the
//!    working copy consistent and re-running pull reconciles the rest.

use std::path::Path;
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::cache::ContentCache;
use crate::errors::SyncError;
use crate::metadata::MetadataStore;
use crate::policy::{PolicyGuard, PushRequest};
use crate::remote::{RemoteService, UploadRequest};
use crate::selector::Selector;
use crate::tracking::{SyncState, TrackingStore};

/// Fallback destination branch for a first push with no tracked branch.
const DEFAULT_BRANCH: &str = "master";

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// How a pull's target was resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedVia {
    /// An explicitly requested branch.
    Branch(String),
    /// An explicitly requested commit id.
    Commit(String),
    /// The remote's default head; the server-declared commit id, if any.
    Default(Option<String>),
}

/// Observational report of a successful pull.
#[derive(Debug, Clone)]
pub struct PullOutcome {
    pub db: String,
    pub resolved: ResolvedVia,
    pub bytes: usize,
    pub digest: String,
}

/// Observational report of a successful push.
#[derive(Debug, Clone)]
pub struct PushOutcome {
    pub db: String,
    pub branch: String,
    pub commit_id: String,
    pub licence: Option<String>,
    pub bytes: usize,
    pub message: String,
    pub state: SyncState,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Synchronization client for one remote service.
///
/// All collaborators are injected at construction so tests can substitute
/// a fake remote without touching shared globals.
pub struct SyncClient<R: RemoteService> {
    remote: R,
    cache: ContentCache,
    metadata: MetadataStore,
    tracking: TrackingStore,
}

impl<R: RemoteService> SyncClient<R> {
    /// Create a client with all local stores rooted at `cache_root`.
    pub fn new<P: Into<std::path::PathBuf>>(remote: R, cache_root: P) -> Self {
        let root = cache_root.into();
        info!(root = %root.display(), "initializing sync client");
        Self {
            remote,
            cache: ContentCache::new(&root),
            metadata: MetadataStore::new(&root),
            tracking: TrackingStore::new(&root),
        }
    }

    /// The metadata store (for local inspection).
    pub fn metadata(&self) -> &MetadataStore {
        &self.metadata
    }

    /// The tracking store (for local inspection).
    pub fn tracking(&self) -> &TrackingStore {
        &self.tracking
    }

    /// The content cache.
    pub fn cache(&self) -> &ContentCache {
        &self.cache
    }

    // -----------------------------------------------------------------------
    // Pull
    // -----------------------------------------------------------------------

    /// Download a database revision into `working_path`.
    ///
    /// `branch` and `commit` are mutually exclusive; both empty means the
    /// remote's default head. Validation and selector resolution run before
    /// any network access.
    pub async fn pull(
        &self,
        db: &str,
        working_path: &Path,
        branch: Option<&str>,
        commit: Option<&str>,
    ) -> Result<PullOutcome, SyncError> {
        let selector = PolicyGuard::check_pull(branch, commit)?;

        // Metadata first: an invalid selector must not cost a content
        // transfer.
        let mut meta = self.remote.fetch_metadata(db).await?;
        match &selector {
            Selector::Branch(b) if !meta.branches.contains_key(b) => {
                return Err(SyncError::NotFound(format!(
                    "the requested branch '{}' doesn't exist",
                    b
                )));
            }
            Selector::Commit(c) if !meta.commits.contains_key(c) => {
                return Err(SyncError::NotFound(format!(
                    "the requested commit {} doesn't exist",
                    c
                )));
            }
            _ => {}
        }

        let dl = self.remote.download(db, &selector).await?;

        // Content first, durably: blob into the cache, then the working
        // copy via temp-file-and-rename.
        let digest = self.cache.put(db, &dl.bytes)?;
        write_file_atomic(working_path, &dl.bytes)?;
        debug!(db, digest = %digest, path = %working_path.display(), "working copy written");

        // The modification time is cosmetic: a malformed header must not
        // discard a completed download, so the error is held until all
        // state is persisted.
        let mtime_result = match dl.content_disposition.as_deref() {
            Some(header) => crate::remote::parse_modification_date(header),
            None => Ok(None),
        };
        if let Ok(Some(mtime)) = &mtime_result {
            set_file_mtime(working_path, *mtime)?;
        }

        // Only now is metadata updated; a crash before this point leaves
        // content present and metadata stale, which a re-run reconciles.
        if let Some(ref server_branch) = dl.branch {
            meta.active_branch = server_branch.clone();
        }
        self.metadata.save(db, &meta)?;

        let head = match &selector {
            Selector::Branch(b) => meta.branches.get(b).cloned(),
            Selector::Commit(c) => Some(c.clone()),
            Selector::Unspecified => dl.commit_id.clone(),
        };
        let mut rec = self.tracking.load(db);
        rec.observe_pull(
            dl.branch.as_deref().or(selector.branch()),
            head.as_deref(),
        );
        self.tracking.save(db, &rec)?;

        if let Err(e) = mtime_result {
            warn!(db, error = %e, "download kept, but the declared modification time was unusable");
            return Err(e);
        }

        let resolved = match selector {
            Selector::Branch(b) => ResolvedVia::Branch(b),
            Selector::Commit(c) => ResolvedVia::Commit(c),
            Selector::Unspecified => ResolvedVia::Default(dl.commit_id),
        };
        info!(db, bytes = dl.bytes.len(), "pull complete");
        Ok(PullOutcome {
            db: db.to_string(),
            resolved,
            bytes: dl.bytes.len(),
            digest,
        })
    }

    // -----------------------------------------------------------------------
    // Push
    // -----------------------------------------------------------------------

    /// Upload the working copy as a new commit.
    ///
    /// Pre-flight validation runs before any network call. The local commit
    /// pointer and metadata are refreshed only after the remote accepted
    /// the upload.
    pub async fn push(&self, req: &PushRequest) -> Result<PushOutcome, SyncError> {
        PolicyGuard::check_push(req)?;

        let bytes = std::fs::read(&req.file)?;
        let last_modified = file_mtime(&req.file)?;

        // Previously recorded pointers seed the base reference; explicit
        // arguments override them.
        let rec = self.tracking.load(&req.db);
        let branch = req
            .branch
            .clone()
            .filter(|b| !b.is_empty())
            .or_else(|| rec.branch.clone())
            .unwrap_or_else(|| DEFAULT_BRANCH.to_string());
        let base_commit = req
            .base_commit
            .clone()
            .filter(|c| !c.is_empty())
            .or_else(|| rec.commit.clone())
            .unwrap_or_default();
        debug!(db = %req.db, branch = %branch, base = %base_commit, "resolved push base");

        let upload = UploadRequest {
            bytes: bytes.clone(),
            branch: branch.clone(),
            message: req.message.clone(),
            author_name: req.author_name.clone(),
            author_email: req.author_email.clone(),
            last_modified,
            base_commit,
            public: req.public,
            force: req.force,
            licence: req.licence.clone(),
        };
        let receipt = self.remote.upload(&req.db, &upload).await?;

        // Remote accepted: advance the local commit pointer first (the
        // acknowledged fact), then refresh metadata from the authoritative
        // side.
        let mut rec = rec;
        rec.observe_push(&branch, &receipt.commit_id);
        self.tracking.save(&req.db, &rec)?;

        let meta = self.remote.fetch_metadata(&req.db).await?;
        self.metadata.save(&req.db, &meta)?;

        info!(db = %req.db, commit_id = %receipt.commit_id, "push complete");
        Ok(PushOutcome {
            db: req.db.clone(),
            branch,
            commit_id: receipt.commit_id,
            licence: req.licence.clone(),
            bytes: bytes.len(),
            message: req.message.clone(),
            state: rec.state,
        })
    }
}

// ---------------------------------------------------------------------------
// File helpers
// ---------------------------------------------------------------------------

/// Write `bytes` to `path` via a temporary file in the same directory and
/// an atomic rename, so a crash never leaves a partially-written file under
/// the final name.
fn write_file_atomic(path: &Path, bytes: &[u8]) -> Result<(), SyncError> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let tmp = tempfile::NamedTempFile::new_in(dir)?;
    std::fs::write(tmp.path(), bytes)?;
    tmp.persist(path).map_err(|e| SyncError::IoError(e.error))?;
    Ok(())
}

fn set_file_mtime(path: &Path, mtime: DateTime<Utc>) -> Result<(), SyncError> {
    let file = std::fs::File::options().write(true).open(path)?;
    file.set_modified(SystemTime::from(mtime))?;
    Ok(())
}

fn file_mtime(path: &Path) -> Result<DateTime<Utc>, SyncError> {
    let modified = std::fs::metadata(path)?.modified()?;
    Ok(DateTime::<Utc>::from(modified))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
