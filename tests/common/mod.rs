//! Test backends for gateway integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use git_s3_gateway::{
    BackendError, BackendResult, Content, ContentBackend, DeleteContent, DirEntry, EntryKind,
    FileContent, PutContent, RepoRef,
};
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone)]
struct StoredFile {
    data: Bytes,
    sha: String,
}

/// Recorded create-or-update call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutCall {
    pub repo: RepoRef,
    pub path: String,
    pub message: String,
    pub sha: Option<String>,
}

/// Recorded delete call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteCall {
    pub repo: RepoRef,
    pub path: String,
    pub message: String,
    pub sha: String,
    pub branch: String,
}

/// In-memory repository store with GitHub-like hash checks
#[derive(Default)]
pub struct MemoryBackend {
    files: Mutex<BTreeMap<(String, String), StoredFile>>,
    puts: Mutex<Vec<PutCall>>,
    deletes: Mutex<Vec<DeleteCall>>,
}

/// Git-style blob hash (SHA-256 truncated to 40 hex chars)
pub fn blob_sha(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("blob {}\0", data.len()).as_bytes());
    hasher.update(data);
    let digest = hex::encode(hasher.finalize());
    digest[..40].to_string()
}

pub fn repo(owner: &str, name: &str) -> RepoRef {
    RepoRef {
        owner: owner.to_string(),
        repo: name.to_string(),
    }
}

fn repo_key(repo: &RepoRef) -> String {
    repo.to_string()
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a file directly, bypassing the gateway
    pub fn insert(&self, repo: &RepoRef, path: &str, data: &[u8]) -> String {
        let sha = blob_sha(data);
        self.files.lock().insert(
            (repo_key(repo), path.to_string()),
            StoredFile {
                data: Bytes::copy_from_slice(data),
                sha: sha.clone(),
            },
        );
        sha
    }

    pub fn contains(&self, repo: &RepoRef, path: &str) -> bool {
        self.files
            .lock()
            .contains_key(&(repo_key(repo), path.to_string()))
    }

    pub fn puts(&self) -> Vec<PutCall> {
        self.puts.lock().clone()
    }

    pub fn deletes(&self) -> Vec<DeleteCall> {
        self.deletes.lock().clone()
    }
}

#[async_trait]
impl ContentBackend for MemoryBackend {
    async fn get_content(&self, repo: &RepoRef, path: &str) -> BackendResult<Content> {
        let files = self.files.lock();
        let owner = repo_key(repo);

        if let Some(file) = files.get(&(owner.clone(), path.to_string())) {
            return Ok(Content::File(FileContent {
                path: path.to_string(),
                sha: file.sha.clone(),
                size: file.data.len() as u64,
                data: file.data.clone(),
            }));
        }

        let prefix = if path.is_empty() {
            String::new()
        } else {
            format!("{}/", path)
        };

        let mut entries = Vec::new();
        let mut dirs = BTreeSet::new();
        for ((file_repo, file_path), file) in files.iter() {
            if *file_repo != owner {
                continue;
            }
            let Some(rest) = file_path.strip_prefix(&prefix) else {
                continue;
            };
            match rest.split_once('/') {
                Some((dir, _)) => {
                    dirs.insert(format!("{}{}", prefix, dir));
                }
                None => entries.push(DirEntry {
                    path: file_path.clone(),
                    sha: file.sha.clone(),
                    size: file.data.len() as u64,
                    kind: EntryKind::File,
                }),
            }
        }
        for dir in dirs {
            entries.push(DirEntry {
                sha: blob_sha(dir.as_bytes()),
                path: dir,
                size: 0,
                kind: EntryKind::Dir,
            });
        }

        if entries.is_empty() && !path.is_empty() {
            return Err(BackendError::NotFound("Not Found".to_string()));
        }
        Ok(Content::Directory(entries))
    }

    async fn put_content(&self, repo: &RepoRef, request: PutContent<'_>) -> BackendResult<String> {
        use base64::Engine;

        self.puts.lock().push(PutCall {
            repo: repo.clone(),
            path: request.path.to_string(),
            message: request.message.clone(),
            sha: request.sha.clone(),
        });

        let key = (repo_key(repo), request.path.to_string());
        let mut files = self.files.lock();
        let current = files.get(&key).map(|f| f.sha.clone());
        match (current, request.sha.as_deref()) {
            (Some(_), None) => {
                return Err(BackendError::Api {
                    status: 422,
                    message: "Invalid request.\n\n\"sha\" wasn't supplied.".to_string(),
                })
            }
            (Some(current), Some(sha)) if current != sha => {
                return Err(BackendError::Api {
                    status: 409,
                    message: format!("{} does not match {}", request.path, sha),
                })
            }
            _ => {}
        }

        let data = base64::engine::general_purpose::STANDARD
            .decode(&request.content_base64)
            .map_err(|e| BackendError::Decode(e.to_string()))?;
        let sha = blob_sha(&data);
        files.insert(
            key,
            StoredFile {
                data: Bytes::from(data),
                sha: sha.clone(),
            },
        );
        Ok(sha)
    }

    async fn delete_content(
        &self,
        repo: &RepoRef,
        request: DeleteContent<'_>,
    ) -> BackendResult<()> {
        self.deletes.lock().push(DeleteCall {
            repo: repo.clone(),
            path: request.path.to_string(),
            message: request.message.clone(),
            sha: request.sha.clone(),
            branch: request.branch.to_string(),
        });

        let key = (repo_key(repo), request.path.to_string());
        let mut files = self.files.lock();
        let current = files.get(&key).map(|f| f.sha.clone());
        match current {
            None => Err(BackendError::NotFound("Not Found".to_string())),
            Some(current) if current != request.sha => Err(BackendError::Api {
                status: 409,
                message: format!("{} does not match {}", request.path, request.sha),
            }),
            Some(_) => {
                files.remove(&key);
                Ok(())
            }
        }
    }

    async fn authenticated_user(&self) -> BackendResult<String> {
        Ok("octocat".to_string())
    }
}

/// Backend where another writer commits right after every read
///
/// Hash tokens returned by `get_content` are stale by the time the gateway
/// writes with them.
pub struct ConcurrentEditBackend {
    pub inner: MemoryBackend,
}

impl ConcurrentEditBackend {
    pub fn new() -> Self {
        Self {
            inner: MemoryBackend::new(),
        }
    }
}

#[async_trait]
impl ContentBackend for ConcurrentEditBackend {
    async fn get_content(&self, repo: &RepoRef, path: &str) -> BackendResult<Content> {
        let content = self.inner.get_content(repo, path).await?;
        if let Content::File(file) = &content {
            let mut edited = file.data.to_vec();
            edited.extend_from_slice(b" (edited)");
            self.inner.insert(repo, path, &edited);
        }
        Ok(content)
    }

    async fn put_content(&self, repo: &RepoRef, request: PutContent<'_>) -> BackendResult<String> {
        self.inner.put_content(repo, request).await
    }

    async fn delete_content(
        &self,
        repo: &RepoRef,
        request: DeleteContent<'_>,
    ) -> BackendResult<()> {
        self.inner.delete_content(repo, request).await
    }

    async fn authenticated_user(&self) -> BackendResult<String> {
        self.inner.authenticated_user().await
    }
}

/// Backend whose every call fails with the same status
pub struct FailingBackend {
    status: u16,
    message: String,
}

impl FailingBackend {
    pub fn new(status: u16, message: &str) -> Self {
        Self {
            status,
            message: message.to_string(),
        }
    }

    fn error(&self) -> BackendError {
        if self.status == 404 {
            BackendError::NotFound(self.message.clone())
        } else {
            BackendError::Api {
                status: self.status,
                message: self.message.clone(),
            }
        }
    }
}

#[async_trait]
impl ContentBackend for FailingBackend {
    async fn get_content(&self, _repo: &RepoRef, _path: &str) -> BackendResult<Content> {
        Err(self.error())
    }

    async fn put_content(&self, _repo: &RepoRef, _request: PutContent<'_>) -> BackendResult<String> {
        Err(self.error())
    }

    async fn delete_content(
        &self,
        _repo: &RepoRef,
        _request: DeleteContent<'_>,
    ) -> BackendResult<()> {
        Err(self.error())
    }

    async fn authenticated_user(&self) -> BackendResult<String> {
        Err(self.error())
    }
}

/// Backend that panics on reads
pub struct PanickingBackend;

#[async_trait]
impl ContentBackend for PanickingBackend {
    async fn get_content(&self, _repo: &RepoRef, _path: &str) -> BackendResult<Content> {
        panic!("backend exploded");
    }

    async fn put_content(&self, _repo: &RepoRef, _request: PutContent<'_>) -> BackendResult<String> {
        panic!("backend exploded");
    }

    async fn delete_content(
        &self,
        _repo: &RepoRef,
        _request: DeleteContent<'_>,
    ) -> BackendResult<()> {
        panic!("backend exploded");
    }

    async fn authenticated_user(&self) -> BackendResult<String> {
        Ok("octocat".to_string())
    }
}
