//! HTTP implementation of [`RemoteService`] over reqwest.

use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use tracing::{debug, info, instrument};

use crate::config::RemoteConfig;
use crate::errors::SyncError;
use crate::metadata::Metadata;
use crate::selector::Selector;

use super::{Download, PushReceipt, RemoteService, UploadRequest};

/// Asynchronous client for the remote history service.
#[derive(Clone)]
pub struct HttpRemote {
    http: reqwest::Client,
    base_url: String,
    owner: String,
    api_key: Option<String>,
}

impl HttpRemote {
    /// Build a client from the remote section of the configuration.
    pub fn new(config: &RemoteConfig) -> Self {
        let base_url = config.url.trim_end_matches('/').to_string();
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("dbsync/0.1"));
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .expect("failed to build reqwest client");
        info!(base_url = %base_url, owner = %config.owner, "created remote client");
        Self {
            http,
            base_url,
            owner: config.owner.clone(),
            api_key: config.api_key.clone(),
        }
    }

    fn db_url(&self, db: &str) -> String {
        format!("{}/{}/{}", self.base_url, self.owner, db)
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => req.bearer_auth(key),
            None => req,
        }
    }

    fn header_value(resp: &reqwest::Response, name: &str) -> Option<String> {
        resp.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
    }
}

impl RemoteService for HttpRemote {
    #[instrument(skip(self))]
    async fn fetch_metadata(&self, db: &str) -> Result<Metadata, SyncError> {
        let url = format!("{}/metadata/{}/{}", self.base_url, self.owner, db);
        let resp = self.authorize(self.http.get(&url)).send().await?;

        let status = resp.status();
        if status.as_u16() == 404 {
            return Err(SyncError::NotFound(format!(
                "database '{}' isn't known on the remote",
                db
            )));
        }
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(SyncError::Remote {
                status: status.as_u16(),
                message,
            });
        }

        let meta: Metadata = resp
            .json()
            .await
            .map_err(|e| SyncError::Protocol(format!("malformed metadata response: {}", e)))?;
        debug!(
            branches = meta.branches.len(),
            commits = meta.commits.len(),
            "fetched remote metadata"
        );
        Ok(meta)
    }

    #[instrument(skip(self))]
    async fn download(&self, db: &str, selector: &Selector) -> Result<Download, SyncError> {
        let mut req = self.authorize(self.http.get(self.db_url(db)));
        match selector {
            Selector::Branch(b) => req = req.query(&[("branch", b.as_str())]),
            Selector::Commit(c) => req = req.query(&[("commit", c.as_str())]),
            Selector::Unspecified => {}
        }
        let resp = req.send().await?;

        let status = resp.status();
        if status.as_u16() == 404 {
            return Err(SyncError::NotFound(match selector {
                Selector::Branch(b) => {
                    format!("database '{}' with branch '{}' isn't known on the remote", db, b)
                }
                Selector::Commit(c) => {
                    format!("database '{}' not found with commit {}", db, c)
                }
                Selector::Unspecified => format!("database '{}' not found on the remote", db),
            }));
        }
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(SyncError::Remote {
                status: status.as_u16(),
                message,
            });
        }

        let branch = Self::header_value(&resp, "Branch");
        let commit_id = Self::header_value(&resp, "Commit-Id");
        let content_disposition = Self::header_value(&resp, "Content-Disposition");
        let bytes = resp.bytes().await?.to_vec();

        debug!(size = bytes.len(), ?branch, ?commit_id, "downloaded database");
        Ok(Download {
            bytes,
            branch,
            commit_id,
            content_disposition,
        })
    }

    #[instrument(skip(self, req), fields(branch = %req.branch, size = req.bytes.len()))]
    async fn upload(&self, db: &str, req: &UploadRequest) -> Result<PushReceipt, SyncError> {
        let part = reqwest::multipart::Part::bytes(req.bytes.clone())
            .file_name(db.to_string())
            .mime_str("application/octet-stream")
            .map_err(|e| SyncError::Protocol(format!("invalid upload mime type: {}", e)))?;
        let form = reqwest::multipart::Form::new().part("file1", part);

        let mut query: Vec<(&str, String)> = vec![
            ("branch", req.branch.clone()),
            ("commitmsg", req.message.clone()),
            ("lastmodified", req.last_modified.to_rfc3339()),
            ("commit", req.base_commit.clone()),
            ("author", req.author_name.clone()),
            ("email", req.author_email.clone()),
            ("public", req.public.to_string()),
            ("force", req.force.to_string()),
        ];
        if let Some(ref licence) = req.licence {
            query.push(("licence", licence.clone()));
        }

        let resp = self
            .authorize(self.http.post(self.db_url(db)))
            .query(&query)
            .multipart(form)
            .send()
            .await?;

        let status = resp.status();
        if status.as_u16() == 409 {
            return Err(SyncError::Conflict {
                branch: req.branch.clone(),
            });
        }
        if status.as_u16() != 201 {
            let message = resp.text().await.unwrap_or_default();
            return Err(SyncError::Remote {
                status: status.as_u16(),
                message,
            });
        }

        let body = resp.text().await?;
        let receipt: PushReceipt = serde_json::from_str(&body)
            .map_err(|e| SyncError::Protocol(format!("malformed upload response: {}", e)))?;
        if receipt.commit_id.is_empty() {
            return Err(SyncError::Protocol(
                "upload response is missing a commit id".into(),
            ));
        }
        info!(commit_id = %receipt.commit_id, "upload accepted");
        Ok(receipt)
    }
}
