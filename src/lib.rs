//! S3-compatible HTTP API backed by GitHub repository contents
//!
//! This crate exposes a small subset of the S3 object API and serves it from
//! files in a Git repository, through the hosting platform's contents API.
//!
//! ## Architecture
//!
//! - **S3 Buckets** → repositories, written `owner@repo` (e.g., `alice@proj`)
//! - **S3 Objects** → files at the key's path inside the repository
//! - **ETags** → the backend's blob SHA, quoted
//! - **Listings** → directory contents, files only, never truncated
//!
//! The [`Gateway`] owns an injected [`ContentBackend`]; [`GitHubClient`] is the
//! production implementation, and tests substitute their own.
//!
//! ## Example
//!
//! ```no_run
//! use git_s3_gateway::{Gateway, GatewayConfig, GitHubClient, GitHubConfig};
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let client = GitHubClient::new(&GitHubConfig {
//!     token: std::env::var("TOKEN_GITHUB").ok(),
//!     ..Default::default()
//! })
//! .unwrap();
//!
//! let gateway = Gateway::new(Arc::new(client), GatewayConfig::default());
//! let etag = gateway
//!     .put_object("alice@proj", "notes/today.txt", "hello".into())
//!     .await
//!     .unwrap();
//! println!("stored with ETag {}", etag);
//! # });
//! ```

mod backend;
mod error;
mod gateway;
mod github;
mod router;
mod utils;
mod xml;

pub use backend::{
    Content, ContentBackend, DeleteContent, DirEntry, EntryKind, FileContent, PutContent, RepoRef,
};
pub use error::{BackendError, BackendResult, GatewayError, GatewayResult};
pub use gateway::{
    Gateway, GatewayConfig, GetObjectOutput, HealthReport, Liveness, DEFAULT_DELETE_BRANCH,
    DEFAULT_MAX_BODY_SIZE,
};
pub use github::{GitHubClient, GitHubConfig, DEFAULT_API_URL};
pub use router::S3_MOUNT;
pub use utils::{parse_bucket, quote_etag, BUCKET_DELIMITER};
pub use xml::{ErrorDocument, ListBucketResult, ListEntry, S3_XMLNS};
