//! S3 operations translated onto a [`ContentBackend`]
//!
//! Every handler is a short linear sequence of backend calls. PUT and DELETE
//! read the current content hash first and hand it back to the backend as the
//! optimistic-concurrency token; a stale token surfaces as a backend error and
//! is never retried.

use crate::backend::{
    Content, ContentBackend, DeleteContent, DirEntry, EntryKind, FileContent, PutContent,
};
use crate::error::{GatewayError, GatewayResult};
use crate::utils::{parse_bucket, quote_etag};
use crate::xml::{ListBucketResult, ListEntry};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Branch targeted by delete commits unless configured otherwise
pub const DEFAULT_DELETE_BRANCH: &str = "main";

/// Default request body limit (10 MiB)
pub const DEFAULT_MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

/// Request-independent gateway settings
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Whether the backend client was given an auth token
    pub token_configured: bool,
    pub delete_branch: String,
    pub max_body_size: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            token_configured: false,
            delete_branch: DEFAULT_DELETE_BRANCH.to_string(),
            max_body_size: DEFAULT_MAX_BODY_SIZE,
        }
    }
}

/// Result of a GET on an object key
#[derive(Debug)]
pub enum GetObjectOutput {
    /// Key named a single file
    Object(FileContent),
    /// Key named a directory and was answered as a listing
    Listing(ListBucketResult),
}

/// Body of `GET /`
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Liveness {
    pub token: &'static str,
}

/// Body of `GET /health`
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct HealthReport {
    pub status: &'static str,
    pub github_connection: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub github_error: Option<String>,
}

/// S3 front end over a content backend
pub struct Gateway {
    backend: Arc<dyn ContentBackend>,
    config: GatewayConfig,
}

impl Gateway {
    pub fn new(backend: Arc<dyn ContentBackend>, config: GatewayConfig) -> Self {
        info!(
            "Initializing gateway (delete branch: {}, body limit: {} bytes)",
            config.delete_branch, config.max_body_size
        );
        Gateway { backend, config }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    fn token_state(&self) -> &'static str {
        if self.config.token_configured {
            "defined"
        } else {
            "undefined"
        }
    }

    pub fn liveness(&self) -> Liveness {
        Liveness {
            token: self.token_state(),
        }
    }

    /// Probe the backend; always reports healthy, with the connection state
    pub async fn health(&self) -> HealthReport {
        match self.backend.authenticated_user().await {
            Ok(login) => {
                debug!(login = %login, "Backend connection verified");
                HealthReport {
                    status: "healthy",
                    github_connection: "connected",
                    token: Some(self.token_state()),
                    github_error: None,
                }
            }
            Err(e) => HealthReport {
                status: "healthy",
                github_connection: "disconnected",
                token: None,
                github_error: Some(e.to_string()),
            },
        }
    }

    /// Read an object, or list it when the key names a directory
    pub async fn get_object(&self, bucket: &str, key: &str) -> GatewayResult<GetObjectOutput> {
        let started = Instant::now();
        let repo = parse_bucket(bucket)?;
        info!(owner = %repo.owner, repo = %repo.repo, path = key, "Start processing GET request");

        match self.backend.get_content(&repo, key).await? {
            Content::Directory(entries) => {
                let contents = file_entries(&entries, None);
                info!(
                    owner = %repo.owner,
                    repo = %repo.repo,
                    prefix = key,
                    file_count = contents.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "LIST request processed successfully"
                );
                Ok(GetObjectOutput::Listing(ListBucketResult::new(bucket, None, contents)))
            }
            Content::File(file) => {
                info!(
                    owner = %repo.owner,
                    repo = %repo.repo,
                    size = file.data.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "GET request processed successfully"
                );
                Ok(GetObjectOutput::Object(file))
            }
        }
    }

    /// List files directly under `prefix`
    ///
    /// `LastModified` is stamped with the current time; the backend listing
    /// carries no modification timestamps.
    pub async fn list_bucket(&self, bucket: &str, prefix: &str) -> GatewayResult<ListBucketResult> {
        let started = Instant::now();
        let repo = parse_bucket(bucket)?;
        info!(owner = %repo.owner, repo = %repo.repo, prefix, "Start processing LIST request");

        let entries = match self.backend.get_content(&repo, prefix).await? {
            Content::Directory(entries) => entries,
            Content::File(_) => return Err(GatewayError::NotADirectory(prefix.to_string())),
        };

        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let contents = file_entries(&entries, Some(&now));

        info!(
            owner = %repo.owner,
            repo = %repo.repo,
            prefix,
            file_count = contents.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "LIST request processed successfully"
        );
        Ok(ListBucketResult::new(bucket, Some(prefix.to_string()), contents))
    }

    /// Create or replace an object, returning its quoted ETag
    pub async fn put_object(&self, bucket: &str, key: &str, body: Bytes) -> GatewayResult<String> {
        let repo = parse_bucket(bucket)?;
        info!(
            owner = %repo.owner,
            repo = %repo.repo,
            path = key,
            size = body.len(),
            "Start processing upload request"
        );

        // Any failure here (including not-found) means "create"
        let sha = match self.backend.get_content(&repo, key).await {
            Ok(existing) => existing.sha().map(str::to_string),
            Err(e) => {
                debug!(path = key, error = %e, "No existing object hash, creating");
                None
            }
        };

        let request = PutContent {
            path: key,
            message: format!("Upload {}", key),
            content_base64: STANDARD.encode(&body),
            sha,
        };
        let new_sha = self.backend.put_content(&repo, request).await?;

        info!(
            owner = %repo.owner,
            repo = %repo.repo,
            path = key,
            "Upload request processed successfully"
        );
        Ok(quote_etag(&new_sha))
    }

    /// Delete an object; its current hash must be readable first
    pub async fn delete_object(&self, bucket: &str, key: &str) -> GatewayResult<()> {
        let repo = parse_bucket(bucket)?;
        info!(owner = %repo.owner, repo = %repo.repo, path = key, "Start processing DELETE request");

        let existing = self.backend.get_content(&repo, key).await?;
        // Directories carry no hash; the backend rejects the empty token
        let sha = existing.sha().unwrap_or_default().to_string();

        let request = DeleteContent {
            path: key,
            message: format!("Delete {}", key),
            sha,
            branch: &self.config.delete_branch,
        };
        self.backend.delete_content(&repo, request).await?;

        info!(
            owner = %repo.owner,
            repo = %repo.repo,
            path = key,
            "DELETE request processed successfully"
        );
        Ok(())
    }
}

/// Keep file entries only and shape them as listing rows
fn file_entries(entries: &[DirEntry], last_modified: Option<&str>) -> Vec<ListEntry> {
    entries
        .iter()
        .filter(|entry| entry.kind == EntryKind::File)
        .map(|entry| ListEntry {
            key: entry.path.clone(),
            etag: quote_etag(&entry.sha),
            size: entry.size,
            last_modified: last_modified.map(str::to_string),
        })
        .collect()
}
