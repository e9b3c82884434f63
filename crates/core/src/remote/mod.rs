//! Abstraction over the remote history service.
//!
//! [`RemoteService`] is the seam between the synchronization logic and the
//! HTTP transport: tests substitute an in-memory fake without touching any
//! globals, while production code uses [`http::HttpRemote`].

pub mod http;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::SyncError;
use crate::metadata::Metadata;
use crate::selector::Selector;

pub use http::HttpRemote;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// A downloaded database revision plus the headers the server declared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    /// Raw database bytes.
    pub bytes: Vec<u8>,
    /// Branch name declared by the server, if any.
    pub branch: Option<String>,
    /// Commit id declared by the server, if any.
    pub commit_id: Option<String>,
    /// Raw `Content-Disposition` header value, if present. Parsed after
    /// the content is durably on disk (see [`parse_modification_date`]).
    pub content_disposition: Option<String>,
}

/// Everything the remote needs to record one new commit.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// Working-copy bytes.
    pub bytes: Vec<u8>,
    /// Destination branch.
    pub branch: String,
    /// Commit message.
    pub message: String,
    /// Author name.
    pub author_name: String,
    /// Author email.
    pub author_email: String,
    /// Working-copy modification time.
    pub last_modified: DateTime<Utc>,
    /// Base commit id the upload extends; empty for a first push.
    pub base_commit: String,
    /// Whether the database should be publicly visible.
    pub public: bool,
    /// Overwrite remote history on a non-fast-forward push.
    pub force: bool,
    /// Optional licence id.
    pub licence: Option<String>,
}

/// Server acknowledgement of a successful upload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PushReceipt {
    /// Id of the newly created commit.
    pub commit_id: String,
}

// ---------------------------------------------------------------------------
// Service trait
// ---------------------------------------------------------------------------

/// The remote history service, one logical operation at a time.
pub trait RemoteService {
    /// Fetch the branch/commit metadata for a database, without content.
    fn fetch_metadata(
        &self,
        db: &str,
    ) -> impl std::future::Future<Output = Result<Metadata, SyncError>> + Send;

    /// Download the database content for the given selector.
    fn download(
        &self,
        db: &str,
        selector: &Selector,
    ) -> impl std::future::Future<Output = Result<Download, SyncError>> + Send;

    /// Upload a new revision of the database.
    fn upload(
        &self,
        db: &str,
        req: &UploadRequest,
    ) -> impl std::future::Future<Output = Result<PushReceipt, SyncError>> + Send;
}

// ---------------------------------------------------------------------------
// Header parsing
// ---------------------------------------------------------------------------

/// Extract the `modification-date` parameter from a `Content-Disposition`
/// header value.
///
/// The header is parsed as named `key=value` parameters separated by `;`,
/// not by field position. Returns `Ok(None)` when the parameter is simply
/// absent; any unexpected shape (a parameter without `=`, bad quoting, or
/// a timestamp that is not RFC3339) is a [`SyncError::Protocol`].
pub fn parse_modification_date(header: &str) -> Result<Option<DateTime<Utc>>, SyncError> {
    for part in header.split(';').map(str::trim) {
        if part.is_empty() {
            continue;
        }
        let Some((key, value)) = part.split_once('=') else {
            // The leading disposition type ("attachment") is a bare token.
            if part.chars().any(|c| c.is_whitespace()) {
                return Err(SyncError::Protocol(format!(
                    "malformed Content-Disposition segment '{}'",
                    part
                )));
            }
            continue;
        };
        if key.trim() != "modification-date" {
            continue;
        }
        let value = value.trim();
        let unquoted = if value.starts_with('"') {
            value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .ok_or_else(|| {
                    SyncError::Protocol(format!(
                        "unbalanced quotes in modification-date '{}'",
                        value
                    ))
                })?
        } else {
            value
        };
        let parsed = DateTime::parse_from_rfc3339(unquoted).map_err(|e| {
            SyncError::Protocol(format!(
                "modification-date '{}' is not RFC3339: {}",
                unquoted, e
            ))
        })?;
        return Ok(Some(parsed.with_timezone(&Utc)));
    }
    Ok(None)
}
