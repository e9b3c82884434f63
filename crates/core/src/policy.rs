//! Pre-flight request validation.
//!
//! [`PolicyGuard`] enforces the rules that must hold before any network
//! I/O happens: selector exclusivity for pulls, and required fields plus a
//! readable working copy for pushes. Failures here are always surfaced
//! verbatim and never cost a network round trip.

use std::path::PathBuf;

use tracing::debug;

use crate::config::AppConfig;
use crate::errors::SyncError;
use crate::selector::Selector;

// ---------------------------------------------------------------------------
// Push request
// ---------------------------------------------------------------------------

/// Everything needed to upload one working copy as a new commit.
#[derive(Debug, Clone)]
pub struct PushRequest {
    /// Name the database is stored under on the remote.
    pub db: String,
    /// Path of the working-copy file to upload.
    pub file: PathBuf,
    /// Explicit destination branch; overrides the tracked branch.
    pub branch: Option<String>,
    /// Explicit base commit id; overrides the tracked commit.
    pub base_commit: Option<String>,
    /// Commit message (required).
    pub message: String,
    /// Author name (required; seeded from config).
    pub author_name: String,
    /// Author email (required; seeded from config).
    pub author_email: String,
    /// Optional licence id for the database.
    pub licence: Option<String>,
    /// Whether the database should be publicly visible.
    pub public: bool,
    /// Overwrite remote history on a non-fast-forward push.
    pub force: bool,
}

impl PushRequest {
    /// Build a request for `file`, seeding the author identity from
    /// configuration. Explicit `author`/`email` arguments override the
    /// configured values; the database name defaults to the file's
    /// basename.
    pub fn new(
        config: &AppConfig,
        file: PathBuf,
        name: Option<String>,
        author: Option<String>,
        email: Option<String>,
    ) -> Self {
        let db = name.unwrap_or_else(|| {
            file.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        });
        Self {
            db,
            file,
            branch: None,
            base_commit: None,
            message: String::new(),
            author_name: author.unwrap_or_else(|| config.author.name.clone()),
            author_email: email.unwrap_or_else(|| config.author.email.clone()),
            licence: None,
            public: false,
            force: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Guard
// ---------------------------------------------------------------------------

/// Stateless pre-flight validator.
pub struct PolicyGuard;

impl PolicyGuard {
    /// Validate a pull's selector arguments. Mutual exclusivity of branch
    /// and commit is enforced here, before any network access.
    pub fn check_pull(
        branch: Option<&str>,
        commit: Option<&str>,
    ) -> Result<Selector, SyncError> {
        Ok(Selector::resolve(branch, commit)?)
    }

    /// Validate a push request. Checks required fields and that the
    /// working copy exists and is readable.
    pub fn check_push(req: &PushRequest) -> Result<(), SyncError> {
        if req.author_name.is_empty() {
            return Err(SyncError::Validation {
                field: "author".into(),
                detail: "author name is required (set it in the config file or pass it explicitly)".into(),
            });
        }
        if req.author_email.is_empty() {
            return Err(SyncError::Validation {
                field: "email".into(),
                detail: "author email is required (set it in the config file or pass it explicitly)".into(),
            });
        }
        if req.message.is_empty() {
            return Err(SyncError::Validation {
                field: "message".into(),
                detail: "commit message is required".into(),
            });
        }
        if req.db.is_empty() {
            return Err(SyncError::Validation {
                field: "database".into(),
                detail: "database name must not be empty".into(),
            });
        }
        // Both set is an invalid base reference, same rule as pulls.
        if req.branch.as_deref().is_some_and(|s| !s.is_empty())
            && req.base_commit.as_deref().is_some_and(|s| !s.is_empty())
        {
            Selector::resolve(req.branch.as_deref(), req.base_commit.as_deref())?;
        }
        let meta = std::fs::metadata(&req.file).map_err(|_| SyncError::Validation {
            field: "file".into(),
            detail: format!("database file '{}' does not exist", req.file.display()),
        })?;
        if !meta.is_file() {
            return Err(SyncError::Validation {
                field: "file".into(),
                detail: format!("'{}' is not a regular file", req.file.display()),
            });
        }

        debug!(db = %req.db, "push request passed pre-flight validation");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SelectorError;

    fn config() -> AppConfig {
        toml::from_str(
            r#"
[remote]
owner = "alice"
[author]
name = "Alice Example"
email = "alice@example.com"
"#,
        )
        .unwrap()
    }

    fn valid_request(dir: &std::path::Path) -> PushRequest {
        let file = dir.join("sales.db");
        std::fs::write(&file, b"database bytes").unwrap();
        let mut req = PushRequest::new(&config(), file, None, None, None);
        req.message = "weekly numbers".into();
        req
    }

    #[test]
    fn test_check_pull_rejects_both() {
        let result = PolicyGuard::check_pull(Some("master"), Some("abc"));
        assert!(matches!(
            result,
            Err(SyncError::Selector(SelectorError::BranchAndCommit))
        ));
    }

    #[test]
    fn test_valid_push_request_passes() {
        let dir = tempfile::tempdir().unwrap();
        let req = valid_request(dir.path());
        assert!(PolicyGuard::check_push(&req).is_ok());
        assert_eq!(req.db, "sales.db");
        assert_eq!(req.author_name, "Alice Example");
    }

    #[test]
    fn test_empty_message_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut req = valid_request(dir.path());
        req.message = String::new();
        assert!(matches!(
            PolicyGuard::check_push(&req),
            Err(SyncError::Validation { field, .. }) if field == "message"
        ));
    }

    #[test]
    fn test_missing_author_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut req = valid_request(dir.path());
        req.author_name = String::new();
        assert!(matches!(
            PolicyGuard::check_push(&req),
            Err(SyncError::Validation { field, .. }) if field == "author"
        ));
    }

    #[test]
    fn test_missing_email_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut req = valid_request(dir.path());
        req.author_email = String::new();
        assert!(matches!(
            PolicyGuard::check_push(&req),
            Err(SyncError::Validation { field, .. }) if field == "email"
        ));
    }

    #[test]
    fn test_missing_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut req = valid_request(dir.path());
        req.file = dir.path().join("nope.db");
        assert!(matches!(
            PolicyGuard::check_push(&req),
            Err(SyncError::Validation { field, .. }) if field == "file"
        ));
    }

    #[test]
    fn test_explicit_base_refs_must_be_exclusive() {
        let dir = tempfile::tempdir().unwrap();
        let mut req = valid_request(dir.path());
        req.branch = Some("master".into());
        req.base_commit = Some("abc".into());
        assert!(matches!(
            PolicyGuard::check_push(&req),
            Err(SyncError::Selector(SelectorError::BranchAndCommit))
        ));
    }

    #[test]
    fn test_author_override_wins_over_config() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("x.db");
        std::fs::write(&file, b"x").unwrap();
        let req = PushRequest::new(
            &config(),
            file,
            Some("renamed.db".into()),
            Some("Bob".into()),
            None,
        );
        assert_eq!(req.db, "renamed.db");
        assert_eq!(req.author_name, "Bob");
        assert_eq!(req.author_email, "alice@example.com");
    }
}
