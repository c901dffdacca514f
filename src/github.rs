//! GitHub REST client for reading the monitored service's source
//!
//! Three lookups: a file's contents at the configured ref, a path search over
//! the recursive tree, and GitHub code search scoped to the repository.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

const GITHUB_API_URL: &str = "https://api.github.com";

#[derive(Debug, Error)]
pub enum GitHubError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("GitHub API error: {status} - {message}")]
    Status { status: StatusCode, message: String },

    #[error("'{0}' is not a file")]
    NotAFile(String),

    #[error("Could not decode '{path}': {reason}")]
    Decode { path: String, reason: String },

    #[error("Invalid repository '{0}', expected owner/name")]
    InvalidRepo(String),
}

/// `owner/name` pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    pub fn parse(s: &str) -> Result<Self, GitHubError> {
        let trimmed = s
            .trim()
            .trim_start_matches("https://github.com/")
            .trim_end_matches(".git")
            .trim_matches('/');
        match trimmed.split_once('/') {
            Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/') => {
                Ok(Self {
                    owner: owner.to_string(),
                    name: name.to_string(),
                })
            }
            _ => Err(GitHubError::InvalidRepo(s.to_string())),
        }
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Paths matching a search pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathMatches {
    pub paths: Vec<String>,
    /// GitHub cut the tree listing short; some paths may be missing
    pub truncated: bool,
}

/// One code search hit
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CodeHit {
    pub path: String,
    pub html_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ContentsResponse {
    File(FileContents),
    #[allow(dead_code)] // Directory listings are only detected, never read
    Listing(Vec<serde_json::Value>),
}

#[derive(Debug, Deserialize)]
struct FileContents {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    encoding: Option<String>,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TreeResponse {
    #[serde(default)]
    tree: Vec<TreeEntry>,
    #[serde(default)]
    truncated: bool,
}

#[derive(Debug, Deserialize)]
struct TreeEntry {
    path: String,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct CodeSearchResponse {
    #[serde(default)]
    items: Vec<CodeHit>,
}

#[derive(Debug, Deserialize)]
struct GitHubErrorBody {
    message: String,
}

/// GitHub API client bound to one repository and ref
#[derive(Debug, Clone)]
pub struct GitHubClient {
    client: Client,
    base_url: String,
    token: Option<String>,
    repo: RepoRef,
    git_ref: String,
}

impl GitHubClient {
    /// Create a client for `repo` (`owner/name`) at `git_ref`.
    pub fn new(token: Option<String>, repo: &str, git_ref: &str) -> Result<Self, GitHubError> {
        let repo = RepoRef::parse(repo)?;

        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static("2022-11-28"),
        );
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("log-sentinel/", env!("CARGO_PKG_VERSION"))),
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: GITHUB_API_URL.to_string(),
            token,
            repo,
            git_ref: git_ref.to_string(),
        })
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn repo(&self) -> &RepoRef {
        &self.repo
    }

    pub fn git_ref(&self) -> &str {
        &self.git_ref
    }

    /// Decoded UTF-8 contents of the file at `path`
    pub async fn get_file(&self, path: &str) -> Result<String, GitHubError> {
        let path = normalize_path(path);
        let mut url = self.repo_url(&["contents"])?;
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.extend(path.split('/').filter(|s| !s.is_empty()));
        }

        let response = self
            .authorized(self.client.get(url))
            .query(&[("ref", self.git_ref.as_str())])
            .send()
            .await?;
        let body: ContentsResponse = Self::check(response).await?.json().await?;

        match body {
            ContentsResponse::File(file) if file.kind == "file" => decode_contents(&path, &file),
            _ => Err(GitHubError::NotAFile(path)),
        }
    }

    /// Blob paths containing `pattern` (case-insensitive)
    pub async fn find_paths(&self, pattern: &str) -> Result<PathMatches, GitHubError> {
        let mut url = self.repo_url(&["git", "trees"])?;
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.push(&self.git_ref);
        }

        let response = self
            .authorized(self.client.get(url))
            .query(&[("recursive", "1")])
            .send()
            .await?;
        let tree: TreeResponse = Self::check(response).await?.json().await?;

        let needle = normalize_path(pattern).to_lowercase();
        let paths = tree
            .tree
            .into_iter()
            .filter(|entry| entry.kind == "blob")
            .map(|entry| entry.path)
            .filter(|path| path.to_lowercase().contains(&needle))
            .collect();

        Ok(PathMatches {
            paths,
            truncated: tree.truncated,
        })
    }

    /// Code search restricted to this repository
    pub async fn search_code(&self, query: &str) -> Result<Vec<CodeHit>, GitHubError> {
        let q = format!("{query} repo:{}", self.repo);
        let response = self
            .authorized(self.client.get(format!("{}/search/code", self.base_url)))
            .query(&[("q", q.as_str()), ("per_page", "30")])
            .send()
            .await?;
        let body: CodeSearchResponse = Self::check(response).await?.json().await?;
        Ok(body.items)
    }

    fn repo_url(&self, tail: &[&str]) -> Result<Url, GitHubError> {
        let mut url = Url::parse(&self.base_url).map_err(|e| GitHubError::Status {
            status: StatusCode::BAD_REQUEST,
            message: format!("invalid base URL: {e}"),
        })?;
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["repos", self.repo.owner.as_str(), self.repo.name.as_str()])
                .extend(tail);
        }
        Ok(url)
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, GitHubError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<GitHubErrorBody>(&body).map_or(body, |b| b.message);
        Err(GitHubError::Status { status, message })
    }
}

/// Strip leading `/` and `./` from a repository path
fn normalize_path(path: &str) -> String {
    let mut p = path.trim();
    loop {
        if let Some(rest) = p.strip_prefix("./") {
            p = rest;
        } else if let Some(rest) = p.strip_prefix('/') {
            p = rest;
        } else {
            break;
        }
    }
    p.to_string()
}

fn decode_contents(path: &str, file: &FileContents) -> Result<String, GitHubError> {
    let decode_error = |reason: String| GitHubError::Decode {
        path: path.to_string(),
        reason,
    };

    let content = file.content.as_deref().unwrap_or_default();
    match file.encoding.as_deref() {
        Some("base64") => {
            let compact: String = content.chars().filter(|c| !c.is_whitespace()).collect();
            let bytes = STANDARD
                .decode(compact)
                .map_err(|e| decode_error(e.to_string()))?;
            String::from_utf8(bytes).map_err(|_| decode_error("file is not UTF-8 text".to_string()))
        }
        Some("none") => Err(decode_error(
            "file is too large for the contents API".to_string(),
        )),
        _ => Ok(content.to_string()),
    }
}
