//! Content backend contract
//!
//! The gateway never talks to a hosting platform directly; it goes through
//! [`ContentBackend`], which models the four calls it needs: read a path,
//! create-or-update a file, delete a file, and identify the caller.

use crate::error::BackendResult;
use async_trait::async_trait;
use bytes::Bytes;
use std::fmt;

/// Repository addressed by a bucket
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoRef {
    pub owner: String,
    pub repo: String,
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

/// Kind of a directory entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Dir,
    Symlink,
    Submodule,
    Other,
}

/// One entry of a directory listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// Path relative to the repository root
    pub path: String,
    /// Content hash token
    pub sha: String,
    pub size: u64,
    pub kind: EntryKind,
}

/// A single file with its decoded content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileContent {
    pub path: String,
    pub sha: String,
    pub size: u64,
    pub data: Bytes,
}

/// Result of reading a path: either one file or a directory listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    File(FileContent),
    Directory(Vec<DirEntry>),
}

impl Content {
    /// Content hash of a file; directories have none
    pub fn sha(&self) -> Option<&str> {
        match self {
            Content::File(file) => Some(&file.sha),
            Content::Directory(_) => None,
        }
    }
}

/// Create-or-update request
#[derive(Debug, Clone)]
pub struct PutContent<'a> {
    pub path: &'a str,
    pub message: String,
    /// Base64-encoded file body
    pub content_base64: String,
    /// Hash of the file being replaced; `None` creates a new file
    pub sha: Option<String>,
}

/// Delete request
#[derive(Debug, Clone)]
pub struct DeleteContent<'a> {
    pub path: &'a str,
    pub message: String,
    pub sha: String,
    pub branch: &'a str,
}

/// Remote file store keyed by owner, repository and path
#[async_trait]
pub trait ContentBackend: Send + Sync {
    /// Read a file or list a directory
    async fn get_content(&self, repo: &RepoRef, path: &str) -> BackendResult<Content>;

    /// Create or update a file, returning the new content hash
    async fn put_content(&self, repo: &RepoRef, request: PutContent<'_>) -> BackendResult<String>;

    /// Delete a file
    async fn delete_content(&self, repo: &RepoRef, request: DeleteContent<'_>)
        -> BackendResult<()>;

    /// Login of the identity the backend is authenticated as
    async fn authenticated_user(&self) -> BackendResult<String>;
}
