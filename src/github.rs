//! GitHub contents API backend
//!
//! Maps [`ContentBackend`] onto the GitHub REST API:
//!
//! - **get** → `GET /repos/{owner}/{repo}/contents/{path}`
//! - **put** → `PUT /repos/{owner}/{repo}/contents/{path}`
//! - **delete** → `DELETE /repos/{owner}/{repo}/contents/{path}`
//! - **identity** → `GET /user`

use crate::backend::{
    Content, ContentBackend, DeleteContent, DirEntry, EntryKind, FileContent, PutContent, RepoRef,
};
use crate::error::{BackendError, BackendResult};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Public GitHub API endpoint
pub const DEFAULT_API_URL: &str = "https://api.github.com";

const API_VERSION: &str = "2022-11-28";
const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Characters escaped in a single URL segment (owner, repo)
const SEGMENT_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Same as the segment set but keeps `/` so nested paths stay nested
const PATH_ENCODE_SET: &AsciiSet = &SEGMENT_ENCODE_SET.remove(b'/');

/// Connection settings for [`GitHubClient`]
#[derive(Debug, Clone)]
pub struct GitHubConfig {
    pub api_url: String,
    pub token: Option<String>,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            token: None,
        }
    }
}

/// [`ContentBackend`] backed by the GitHub REST API
#[derive(Debug, Clone)]
pub struct GitHubClient {
    http: Client,
    api_url: String,
}

impl GitHubClient {
    pub fn new(config: &GitHubConfig) -> BackendResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert("x-github-api-version", HeaderValue::from_static(API_VERSION));

        if let Some(token) = &config.token {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| BackendError::Config(format!("invalid token: {}", e)))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let http = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            http,
            api_url: config.api_url.trim_end_matches('/').to_string(),
        })
    }

    fn contents_url(&self, repo: &RepoRef, path: &str) -> String {
        contents_url(&self.api_url, repo, path)
    }

    /// Fetch raw bytes for files the contents API does not inline
    async fn download(&self, url: &str) -> BackendResult<Bytes> {
        debug!(url, "Downloading raw file content");
        let response = check_status(self.http.get(url).send().await?).await?;
        Ok(response.bytes().await?)
    }
}

#[async_trait]
impl ContentBackend for GitHubClient {
    async fn get_content(&self, repo: &RepoRef, path: &str) -> BackendResult<Content> {
        let url = self.contents_url(repo, path);
        debug!(%repo, path, "GitHub get content");

        let response = check_status(self.http.get(&url).send().await?).await?;
        match response.json::<ContentsPayload>().await? {
            ContentsPayload::Directory(items) => Ok(Content::Directory(
                items.into_iter().map(DirEntry::from).collect(),
            )),
            ContentsPayload::File(item) => {
                let data = match (item.encoding.as_deref(), &item.content) {
                    (Some("base64"), Some(content)) => decode_content(content)?,
                    _ => match &item.download_url {
                        Some(url) => self.download(url).await?,
                        None => Bytes::new(),
                    },
                };
                Ok(Content::File(FileContent {
                    path: item.path,
                    sha: item.sha,
                    size: item.size,
                    data,
                }))
            }
        }
    }

    async fn put_content(&self, repo: &RepoRef, request: PutContent<'_>) -> BackendResult<String> {
        let url = self.contents_url(repo, request.path);
        debug!(%repo, path = request.path, update = request.sha.is_some(), "GitHub put content");

        let body = PutPayload {
            message: &request.message,
            content: &request.content_base64,
            sha: request.sha.as_deref(),
        };
        let response = check_status(self.http.put(&url).json(&body).send().await?).await?;
        let result: PutResult = response.json().await?;

        result
            .content
            .map(|c| c.sha)
            .ok_or_else(|| BackendError::Decode("response carried no content sha".to_string()))
    }

    async fn delete_content(
        &self,
        repo: &RepoRef,
        request: DeleteContent<'_>,
    ) -> BackendResult<()> {
        let url = self.contents_url(repo, request.path);
        debug!(%repo, path = request.path, branch = request.branch, "GitHub delete content");

        let body = DeletePayload {
            message: &request.message,
            sha: &request.sha,
            branch: request.branch,
        };
        check_status(self.http.delete(&url).json(&body).send().await?).await?;
        Ok(())
    }

    async fn authenticated_user(&self) -> BackendResult<String> {
        let url = format!("{}/user", self.api_url);
        let response = check_status(self.http.get(&url).send().await?).await?;
        let user: UserPayload = response.json().await?;
        Ok(user.login)
    }
}

/// Build the contents endpoint URL for a repository path
fn contents_url(api_url: &str, repo: &RepoRef, path: &str) -> String {
    format!(
        "{}/repos/{}/{}/contents/{}",
        api_url,
        utf8_percent_encode(&repo.owner, SEGMENT_ENCODE_SET),
        utf8_percent_encode(&repo.repo, SEGMENT_ENCODE_SET),
        utf8_percent_encode(path, PATH_ENCODE_SET),
    )
}

/// Decode inline file content, which GitHub wraps at 60 columns
fn decode_content(content: &str) -> BackendResult<Bytes> {
    let cleaned: String = content
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    STANDARD
        .decode(cleaned)
        .map(Bytes::from)
        .map_err(|e| BackendError::Decode(e.to_string()))
}

/// Turn a non-success response into a [`BackendError`]
async fn check_status(response: Response) -> BackendResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = match response.json::<ApiErrorPayload>().await {
        Ok(body) => body.message,
        Err(_) => status
            .canonical_reason()
            .unwrap_or("Unknown error")
            .to_string(),
    };
    Err(classify(status, message))
}

fn classify(status: StatusCode, message: String) -> BackendError {
    if status == StatusCode::NOT_FOUND {
        BackendError::NotFound(message)
    } else {
        BackendError::Api {
            status: status.as_u16(),
            message,
        }
    }
}

// Wire payloads

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ContentsPayload {
    Directory(Vec<ItemPayload>),
    File(ItemPayload),
}

#[derive(Debug, Deserialize)]
struct ItemPayload {
    #[serde(rename = "type")]
    kind: String,
    path: String,
    sha: String,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    encoding: Option<String>,
    #[serde(default)]
    download_url: Option<String>,
}

impl From<ItemPayload> for DirEntry {
    fn from(item: ItemPayload) -> Self {
        let kind = match item.kind.as_str() {
            "file" => EntryKind::File,
            "dir" => EntryKind::Dir,
            "symlink" => EntryKind::Symlink,
            "submodule" => EntryKind::Submodule,
            _ => EntryKind::Other,
        };
        DirEntry {
            path: item.path,
            sha: item.sha,
            size: item.size,
            kind,
        }
    }
}

#[derive(Debug, Serialize)]
struct PutPayload<'a> {
    message: &'a str,
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct PutResult {
    content: Option<ShaPayload>,
}

#[derive(Debug, Deserialize)]
struct ShaPayload {
    sha: String,
}

#[derive(Debug, Serialize)]
struct DeletePayload<'a> {
    message: &'a str,
    sha: &'a str,
    branch: &'a str,
}

#[derive(Debug, Deserialize)]
struct UserPayload {
    login: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorPayload {
    message: String,
}
